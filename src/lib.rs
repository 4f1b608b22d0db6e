// Public API for integration tests and potential library usage

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
pub mod words;
pub mod ws;
