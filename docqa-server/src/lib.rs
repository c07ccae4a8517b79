//! docqa-server: upload a PDF, then ask questions about it over HTTP.

pub mod config;
pub mod error;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use config::{Args, LogFormat, ServerConfig};
pub use error::ApiError;
pub use server::{AppState, app_router, build_state, run_server};
pub use storage::{FileStorage, UploadPolicy};
