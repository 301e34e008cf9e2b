// session-agent/src/lib.rs

pub mod actors;
pub mod api_client;
pub mod session_store;
