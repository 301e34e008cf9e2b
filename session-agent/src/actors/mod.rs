// session-agent/src/actors/mod.rs

pub mod session_actor;
