pub mod config;
pub mod error;
pub mod types;

pub use config::StrataConfig;
pub use error::StrataError;
pub use types::Result;
