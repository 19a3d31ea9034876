// Database access layer. Everything that issues SQL lives here; the rest
// of the crate goes through SafeQueries.

pub mod identifiers;
pub mod secure_query;

pub use secure_query::*;
