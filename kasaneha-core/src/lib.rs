pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod navigation;
pub mod storage;

pub use api::{ApiClient, API_PREFIX, TOKEN_KEY};
pub use config::KasanehaConfig;
pub use error::{ApiError, StorageError};
pub use navigation::{MemoryNavigator, Navigator, NoopNavigator, LOGIN_PATH};
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
