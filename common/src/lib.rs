pub mod config;
pub mod initdata;
pub mod messages;
pub mod models;
pub mod utils;

pub use config::*;
pub use initdata::*;
pub use messages::*;
pub use models::identity::Identity;
pub use utils::*;
