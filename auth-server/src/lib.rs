// auth-server/src/lib.rs

pub mod api;
pub mod storage;
