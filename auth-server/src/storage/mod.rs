// auth-server/src/storage/mod.rs

pub mod store;

pub use store::{StoreError, UserRow, UserStore};
