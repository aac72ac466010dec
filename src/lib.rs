pub mod config;
pub mod error;
pub mod registration;
pub mod report;
pub mod setup;

pub mod postgres;

pub use config::Config;
pub use error::{Error, Result};
pub use report::Report;
pub use setup::Setup;
