//! FHIR conformance models
//!
//! This crate provides strongly-typed Rust structures for the conformance resources a
//! profiling engine reads and writes.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic models that work across FHIR R4, R4B, and R5
//!
//! # Design Philosophy
//!
//! - **Canonical JSON shape**: `ElementDefinition` emits its properties in the order the
//!   FHIR specification defines, with `_`-prefixed primitive extension siblings kept next
//!   to their primitive
//! - **Typed choice properties**: `fixed[x]`, `pattern[x]` and friends are stored with an
//!   explicit [`DataType`] and only materialize their concrete name on output
//! - **Lossless**: properties the model does not name are carried through unchanged
//!
//! # Example
//!
//! ```rust
//! use fsh_models::common::{StructureDefinition, StructureDefinitionKind};
//! use serde_json::json;
//!
//! let sd_json = json!({
//!     "resourceType": "StructureDefinition",
//!     "id": "Patient",
//!     "url": "http://hl7.org/fhir/StructureDefinition/Patient",
//!     "version": "4.0.1",
//!     "name": "Patient",
//!     "status": "active",
//!     "kind": "resource",
//!     "abstract": false,
//!     "type": "Patient"
//! });
//!
//! let sd: StructureDefinition = serde_json::from_value(sd_json).unwrap();
//! assert_eq!(sd.name, "Patient");
//! assert_eq!(sd.kind, StructureDefinitionKind::Resource);
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
