//! Option forest data model and schema ingestion.
//!
//! - [`option`] - option types and nodes
//! - [`forest`] - the merged, arena-backed option tree
//! - [`loader`] - where schema documents come from
//! - [`schema`] - turning documents into a [`Forest`]

pub mod forest;
pub mod loader;
pub mod option;
pub mod schema;

pub use forest::Forest;
pub use loader::{DocumentLoader, FsLoader, MemoryLoader};
pub use option::{NodeId, OptionNode, OptionType};
pub use schema::{ingest, ingest_documents};
