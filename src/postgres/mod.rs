pub mod connection;
pub mod info;
pub mod provision;
pub mod settings;
pub mod sql;
pub mod tables;

pub use connection::{Database, RetryPolicy, MAX_CONNECTION_LIFETIME};
pub use info::ConnectionInfo;
pub use provision::{HELPER_SCHEMA, OUTPUT_PLUGIN, TARGET_SCHEMA};
pub use settings::{WalCheck, WalSnapshot};
pub use tables::{IdentityOutcome, Normalization, TableRef};
