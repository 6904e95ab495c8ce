//! API key issuance, validation, and revocation.
//!
//! A key is a 32-byte random value prefixed with a known marker and
//! returned to the caller exactly once; only its SHA-256 hash is ever
//! persisted, following the hashing-over-storing-secrets pattern used
//! for bearer token comparison elsewhere in this crate.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::storage::SharedRepository;

pub const KEY_PREFIX: &str = "xa_";
const KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub label: String,
    pub hash: String,
    pub permissions: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyStore {
    pub keys: Vec<ApiKeyRecord>,
}

fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub struct KeyService {
    repo: SharedRepository<ApiKeyStore>,
}

impl KeyService {
    pub fn new(repo: SharedRepository<ApiKeyStore>) -> Self {
        Self { repo }
    }

    /// Generates a new key, persists its hash, and returns the plaintext
    /// key. The plaintext is never stored or logged.
    pub async fn issue(
        &self,
        label: impl Into<String>,
        permissions: Vec<String>,
        ttl: chrono::Duration,
    ) -> std::io::Result<String> {
        let mut raw = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let plaintext = format!("{KEY_PREFIX}{}", hex::encode(raw));

        let now = chrono::Utc::now();
        let record = ApiKeyRecord {
            label: label.into(),
            hash: hash_key(&plaintext),
            permissions,
            created_at: now,
            expires_at: now + ttl,
            revoked: false,
        };

        let mut store = self.repo.load().await?;
        store.keys.push(record);
        self.repo.save(&store).await?;
        Ok(plaintext)
    }

    /// Validates a presented key: the prefix must match, a record with
    /// the same hash must exist, not be revoked, and not be expired.
    /// Hash comparison is constant-time.
    pub async fn validate(&self, presented: &str) -> std::io::Result<Option<ApiKeyRecord>> {
        if !presented.starts_with(KEY_PREFIX) {
            return Ok(None);
        }
        let presented_hash = hash_key(presented);
        let now = chrono::Utc::now();

        let store = self.repo.load().await?;
        for record in &store.keys {
            let matches: bool = record
                .hash
                .as_bytes()
                .ct_eq(presented_hash.as_bytes())
                .into();
            if matches {
                if record.revoked || record.expires_at < now {
                    return Ok(None);
                }
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    pub async fn revoke(&self, presented: &str) -> std::io::Result<bool> {
        let presented_hash = hash_key(presented);
        let mut store = self.repo.load().await?;
        let mut found = false;
        for record in &mut store.keys {
            let matches: bool = record
                .hash
                .as_bytes()
                .ct_eq(presented_hash.as_bytes())
                .into();
            if matches {
                record.revoked = true;
                found = true;
            }
        }
        if found {
            self.repo.save(&store).await?;
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRepository;
    use std::sync::Arc;

    fn service() -> KeyService {
        KeyService::new(Arc::new(InMemoryRepository::<ApiKeyStore>::new()))
    }

    #[tokio::test]
    async fn issued_key_validates() {
        let service = service();
        let key = service
            .issue("ci", vec!["read".to_string()], chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(key.starts_with(KEY_PREFIX));
        let record = service.validate(&key).await.unwrap().unwrap();
        assert_eq!(record.label, "ci");
    }

    #[tokio::test]
    async fn revoked_key_fails_validation() {
        let service = service();
        let key = service
            .issue("ci", vec![], chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(service.revoke(&key).await.unwrap());
        assert!(service.validate(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_key_fails_validation() {
        let service = service();
        let key = service
            .issue("ci", vec![], chrono::Duration::seconds(-1))
            .await
            .unwrap();
        assert!(service.validate(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_key_fails_validation() {
        let service = service();
        assert!(service.validate("xa_deadbeef").await.unwrap().is_none());
        assert!(service.validate("not-even-prefixed").await.unwrap().is_none());
    }
}
