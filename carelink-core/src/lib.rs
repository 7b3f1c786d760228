//! carelink-core: configuration, validation and domain vocabulary shared by
//! the carelink server and CLI.

pub mod care;
pub mod config;
pub mod error;
pub mod events;
pub mod patch;
pub mod timestamp;
pub mod validation;

pub use care::{Priority, TaskStatus};
pub use config::Config;
pub use error::{CoreError, Result};
pub use validation::ValidationError;
