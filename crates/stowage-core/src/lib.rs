//! stowage-core: shared error taxonomy, record identifiers, configuration

pub mod config;
pub mod error;
pub mod record;

pub use config::StowageConfig;
pub use error::{StowageError, StowageResult};
pub use record::RecordId;
