pub mod error;
pub mod schema;
pub mod timestamp;
pub mod transaction;
pub mod vault_id;

pub use error::BasinError;
pub use schema::ColumnDescriptor;
pub use transaction::{Action, Record, Transaction};
pub use vault_id::VaultId;
