//! Error types for the constraint engine

use fsh_models::{BindingStrength, Max};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure, for callers that only need to know how to report one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The rule itself is invalid for the element; nothing was changed.
    Rejected,
    /// The rule would break a connected, sibling or ancestor element; nothing was changed.
    Propagated,
    /// A type, profile, value set, instance or element could not be resolved.
    NotFound,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot apply cardinality {min}..{max} to {element}: min is greater than max")]
    InvalidCardinality {
        element: String,
        min: u32,
        max: Max,
    },

    #[error("Cannot narrow cardinality of {element} from {current} to {requested}: cardinality may only be narrowed")]
    WideningCardinality {
        element: String,
        current: String,
        requested: String,
    },

    #[error("Cannot set max of {element} to {max}: its slices require at least {sum} repetitions")]
    SliceSumExceedsMax { element: String, sum: u32, max: Max },

    #[error("Cannot set min of slice {slice} to {min}: the minimums of the slices of {sliced} would add up to {sum}, more than its max of {max}")]
    SliceMinExceedsSlicedMax {
        slice: String,
        sliced: String,
        min: u32,
        sum: u32,
        max: Max,
    },

    #[error("Cannot apply cardinality {requested} to {element}: connected element {connected} has incompatible cardinality {existing}")]
    ConnectedCardinality {
        element: String,
        connected: String,
        requested: String,
        existing: String,
    },

    #[error("Cannot find definition for type {type_name}")]
    TypeNotFound { type_name: String },

    #[error("Type {type_name} does not match any of the allowed types of {element}: {allowed}")]
    InvalidType {
        element: String,
        type_name: String,
        allowed: String,
    },

    #[error("Cannot constrain {element} to {type_name}: it specializes the non-abstract type {parent}")]
    NonAbstractParent {
        element: String,
        type_name: String,
        parent: String,
    },

    #[error("Cannot constrain types of {element}: connected element {connected} would have no valid types left")]
    EmptyConnectedTypes { element: String, connected: String },

    #[error("Cannot apply more than one standards status to {element}")]
    MultipleStandardsStatus { element: String },

    #[error("Cannot apply mustSupport to {element}: mustSupport is only allowed in profiles")]
    MustSupportInSpecialization { element: String },

    #[error("Cannot assign a value to {element}: it has {count} types, assignment needs exactly one")]
    NoSingleType { element: String, count: usize },

    #[error("Cannot assign {value_kind} value to {element} of type {type_code}")]
    MismatchedType {
        element: String,
        value_kind: String,
        type_code: String,
    },

    #[error("Value {value} is not a valid {type_code} for {element}")]
    InvalidPrimitiveValue {
        element: String,
        value: String,
        type_code: String,
    },

    #[error("Cannot assign {new} to {element}: it already has the conflicting value {existing}")]
    ValueConflict {
        element: String,
        existing: String,
        new: String,
    },

    #[error("Cannot assign value to {element}: it conflicts with the value already assigned to {child}")]
    ChildValueConflict { element: String, child: String },

    #[error("Cannot bind {element} with strength {requested}: it is already bound with the stricter strength {current}")]
    BindingStrengthDecrease {
        element: String,
        current: BindingStrength,
        requested: BindingStrength,
    },

    #[error("Cannot bind {element}: none of its types ({types}) can be bound to a value set")]
    UnbindableType { element: String, types: String },

    #[error("Value set {value_set} is not a valid URI and is not defined")]
    InvalidUri { value_set: String },

    #[error("Cannot change slicing of {element}: {property} may not be loosened from {current} to {requested}")]
    SlicingLoosened {
        element: String,
        property: String,
        current: String,
        requested: String,
    },

    #[error("Cannot add slice {slice} to {element}: the element is not sliced")]
    SlicingNotDefined { element: String, slice: String },

    #[error("Slice {slice} already exists on {element}")]
    DuplicateSlice { element: String, slice: String },

    #[error("Invalid slice name '{name}'")]
    InvalidSliceName { name: String },

    #[error("Cannot find element {path} in {structure}")]
    ElementNotFound { structure: String, path: String },

    #[error("Cannot find definition {item}")]
    DefinitionNotFound { item: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Cannot set {caret_path} on {target}: {reason}")]
    InvalidCaretValue {
        target: String,
        caret_path: String,
        reason: String,
    },

    #[error("Invalid StructureDefinition: {0}")]
    InvalidStructureDefinition(String),

    #[error("Model error: {0}")]
    Model(#[from] fsh_models::Error),

    #[error("FHIR context error: {0}")]
    Context(#[from] fsh_context::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConnectedCardinality { .. }
            | Error::EmptyConnectedTypes { .. }
            | Error::ChildValueConflict { .. }
            | Error::SliceMinExceedsSlicedMax { .. } => ErrorKind::Propagated,
            Error::TypeNotFound { .. }
            | Error::ElementNotFound { .. }
            | Error::DefinitionNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let not_found = Error::TypeNotFound {
            type_name: "Foo".into(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let propagated = Error::EmptyConnectedTypes {
            element: "Observation.value[x]".into(),
            connected: "Observation.value[x]:valueString".into(),
        };
        assert_eq!(propagated.kind(), ErrorKind::Propagated);

        let rejected = Error::InvalidCardinality {
            element: "Observation.status".into(),
            min: 2,
            max: Max::Bounded(1),
        };
        assert_eq!(rejected.kind(), ErrorKind::Rejected);
        assert_eq!(
            rejected.to_string(),
            "Cannot apply cardinality 2..1 to Observation.status: min is greater than max"
        );
    }
}
