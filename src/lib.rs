pub mod config;
pub mod drive;
pub mod error;
pub mod save;
pub mod server;

pub use config::AppConfig;
pub use save::{SaveRequest, SaveService, SavedFile};
pub use server::{router, AppState};
