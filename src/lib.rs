pub mod config;
pub mod observability;
pub mod health;
pub mod model;
pub mod store;
pub mod handlers;
pub mod error;

pub use handlers::{router, AppState};
