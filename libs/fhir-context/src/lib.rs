//! Definition lookup for FSH profiling
//!
//! The constraint engine consumes already loaded FHIR definitions through the
//! synchronous [`Fishable`] capability. This crate provides that capability over an
//! in-memory [`DefinitionIndex`], a directory loader to fill it, and the type lineage
//! walk used for type matching.
//!
//! ```rust
//! use fsh_context::{DefinitionIndex, FishKind, Fishable};
//! use serde_json::json;
//!
//! let index = DefinitionIndex::from_resources(vec![json!({
//!     "resourceType": "ValueSet",
//!     "id": "colors",
//!     "url": "http://example.org/ValueSet/colors"
//! })])
//! .unwrap();
//!
//! let md = index.fish_for_metadata("colors", &[FishKind::ValueSet]).unwrap();
//! assert_eq!(md.url.as_deref(), Some("http://example.org/ValueSet/colors"));
//! ```

pub mod error;
pub mod fishable;
pub mod index;
pub mod lineage;
pub mod loader;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use fishable::{FishKind, Fishable, Metadata};
pub use index::DefinitionIndex;
pub use lineage::{is_descendant_of, lineage, LineageOptions};
pub use loader::{load_directory, load_directory_into};
