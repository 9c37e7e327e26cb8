//! Constraint operations
//!
//! Each operation narrows one element of a [`StructureDefinition`], identified by
//! id, and keeps the elements connected to it consistent. Operations either
//! succeed completely or fail with an [`Error`](crate::Error) and leave the tree
//! unchanged; recoverable problems are recorded as warnings and the operation
//! proceeds.

mod assignment;
mod binding;
mod cardinality;
mod flags;
mod slicing;
mod types;

pub use assignment::is_subset;

use crate::structure::StructureDefinition;

impl StructureDefinition {
    /// Connected elements that receive constraints propagated from `id`: those
    /// outside any slice, and those in the same slice as `id`.
    pub(crate) fn propagation_targets(&self, id: &str) -> Vec<String> {
        let slice_name = self.find_element(id).and_then(|e| e.slice_name.clone());
        self.elements()
            .connected_elements(id)
            .into_iter()
            .filter(|connected| {
                self.find_element(connected).is_some_and(|e| {
                    e.slice_name.is_none() || e.slice_name == slice_name
                })
            })
            .collect()
    }
}
