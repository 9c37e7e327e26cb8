//! FSH element constraint engine
//!
//! This crate applies FSH rules to the elements of a FHIR StructureDefinition:
//! cardinality, flags, type narrowing, value set bindings, fixed and pattern
//! values, slicing and caret values. Constraints only ever narrow what the
//! parent definition allows and are kept consistent across connected elements
//! (the same element seen through its slices). The differential is computed
//! from what changed relative to the parent.
//!
//! # Example
//!
//! ```rust,no_run
//! use fsh_elements::{apply_rules, Diagnostics, Rule, StructureDefinition};
//! use fsh_context::load_directory;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index = load_directory(Path::new("definitions"))?;
//! let parent = StructureDefinition::fish(&index, "Observation")?;
//! let mut profile = parent.derive_profile(
//!     "my-observation",
//!     "MyObservation",
//!     "http://example.org/StructureDefinition/my-observation",
//! );
//!
//! let mut rules: Vec<Rule> = serde_json::from_str(
//!     r#"[{ "kind": "card", "path": "subject", "min": 1 },
//!         { "kind": "only", "path": "value[x]", "types": [{ "type": "string" }] }]"#,
//! )?;
//! let mut diagnostics = Diagnostics::new();
//! apply_rules(&mut profile, &mut rules, &index, &mut diagnostics);
//!
//! let resource = profile.to_resource()?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod connected;
pub mod constraints;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod lookup;
pub mod path;
pub mod primitives;
pub mod rules;
pub mod structure;
pub mod tree;
pub mod unfold;
pub mod value;

pub use apply::apply_rules;
pub use constraints::is_subset;
pub use diagnostics::{Diagnostic, Diagnostics, Severity, SourceInfo, TextLocation};
pub use diff::{apply_diff, calculate_diff, has_own_diff};
pub use error::{Error, ErrorKind, Result};
pub use path::{parse_path, resolve_soft_indexing, PathPart};
pub use rules::{
    AssignmentRule, BindingRule, CardRule, CaretValueRule, ContainsItem, ContainsRule, FlagRule,
    Flags, OnlyRule, OnlyRuleType, Rule,
};
pub use structure::StructureDefinition;
pub use tree::{ElementNode, ElementTree};
pub use value::{FshCanonical, FshCode, FshQuantity, FshRatio, FshReference, FshValue};

pub use fsh_models::{BindingStrength, ElementDefinition, ElementDefinitionType, Max};
