//! Version-agnostic FHIR models
//!
//! Types that work across FHIR R4, R4B, and R5

pub mod data_type;
pub mod element_definition;
pub mod error;
pub mod structure_definition;

// Re-export commonly used types
pub use data_type::*;
pub use element_definition::*;
pub use error::{Error, Result};
pub use structure_definition::*;
