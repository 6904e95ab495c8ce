//! Task lifecycle engine: storage, events, and the execution driver.

pub mod events;
pub mod executor;
pub mod store;

pub use events::TaskEvent;
pub use executor::Executor;
pub use store::{Task, TaskStats, TaskStore};
