pub mod config;
pub mod event;
pub mod job;
pub mod status;

pub use config::{load_dotenv, MonitorConfig, HISTORY_LIMIT};
pub use event::*;
pub use job::*;
pub use status::StatusCode;
