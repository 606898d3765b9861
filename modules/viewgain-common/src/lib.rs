pub mod config;
pub mod error;
pub mod types;

pub use config::{ReportMode, ReportStyle, Secrets, SourceKind, TrackerConfig};
pub use error::{FetchError, Result, TrackerError};
pub use types::*;
