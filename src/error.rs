//! Crate-wide error type and its mapping onto JSON-RPC error codes.
//!
//! Every error surfaced to an HTTP caller is translated into one of the
//! fixed JSON-RPC codes from the A2A envelope (parse, invalid-request,
//! method-not-found, invalid-params, internal, task-not-found,
//! task-invalid-state, skill-not-found, auth-required, auth-forbidden).
//! Errors raised *inside* a running task never escape to HTTP — the
//! executor converts them into a `failed` transition instead (see
//! `tasks::executor`).

use serde::Serialize;
use thiserror::Error;

/// Fixed JSON-RPC 2.0 error codes used throughout the A2A surface.
pub mod code {
    pub const PARSE: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;
    pub const TASK_NOT_FOUND: i32 = -32001;
    pub const TASK_INVALID_STATE: i32 = -32002;
    pub const SKILL_NOT_FOUND: i32 = -32003;
    pub const AUTH_REQUIRED: i32 = -32010;
    pub const AUTH_FORBIDDEN: i32 = -32011;
}

/// The crate-wide error taxonomy.
#[derive(Debug, Error)]
pub enum A2aError {
    #[error("malformed JSON-RPC envelope: {0}")]
    Parse(String),

    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid state transition for task {task_id}: {from} -> {to}")]
    TaskInvalidState {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("unknown skill: {0}")]
    SkillNotFound(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("insufficient permissions: requires {0}")]
    AuthForbidden(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("remote agent unreachable: {0}")]
    Delegation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl A2aError {
    pub fn code(&self) -> i32 {
        match self {
            A2aError::Parse(_) => code::PARSE,
            A2aError::InvalidRequest(_) => code::INVALID_REQUEST,
            A2aError::MethodNotFound(_) => code::METHOD_NOT_FOUND,
            A2aError::InvalidParams(_) => code::INVALID_PARAMS,
            A2aError::TaskNotFound(_) => code::TASK_NOT_FOUND,
            A2aError::TaskInvalidState { .. } => code::TASK_INVALID_STATE,
            A2aError::SkillNotFound(_) => code::SKILL_NOT_FOUND,
            A2aError::AuthRequired => code::AUTH_REQUIRED,
            A2aError::AuthForbidden(_) => code::AUTH_FORBIDDEN,
            A2aError::RateLimited { .. } => code::INTERNAL,
            A2aError::Delegation(_) => code::INTERNAL,
            A2aError::Transport(_) => code::INTERNAL,
            A2aError::Internal(_) => code::INTERNAL,
        }
    }

    pub fn rpc_message(&self) -> String {
        if let A2aError::RateLimited { .. } = self {
            "rate limit exceeded".to_string()
        } else {
            self.to_string()
        }
    }
}

/// The `{code, message, data?}` object embedded in a JSON-RPC error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<&A2aError> for JsonRpcErrorBody {
    fn from(e: &A2aError) -> Self {
        JsonRpcErrorBody {
            code: e.code(),
            message: e.rpc_message(),
            data: None,
        }
    }
}

pub type A2aResult<T> = Result<T, A2aError>;
