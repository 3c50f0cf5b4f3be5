//! Repository layer: table-scoped database operations.

mod audit;
mod documents;
mod merit;
mod usage;

pub use audit::*;
pub use documents::*;
pub use merit::*;
pub use usage::*;
