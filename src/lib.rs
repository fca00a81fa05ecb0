pub mod app;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod errors;
pub mod feed;
pub mod handlers;
pub mod import;
pub mod models;
pub mod schedule;
pub mod state;
pub mod stats;
pub mod storage;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
