//! Bidirectional mapping between source SQL types and the embedded store's
//! column types, plus literal rendering for replayed `INSERT` statements.

mod error;
mod family;
mod literal;
mod schema;

pub use error::TypeMapError;
pub use literal::render_literal;
pub use schema::create_table_statement;
