#![allow(dead_code)]

use fsh_context::testing::{core_index, example_url};
use fsh_context::DefinitionIndex;
use fsh_elements::StructureDefinition;
use std::sync::OnceLock;

static CORE: OnceLock<DefinitionIndex> = OnceLock::new();

pub fn core() -> &'static DefinitionIndex {
    CORE.get_or_init(core_index)
}

/// The parent definition as loaded, before any rule.
pub fn parent(name: &str) -> StructureDefinition {
    StructureDefinition::fish(core(), name).expect("parent definition must be in the core subset")
}

/// A fresh profile of `name` with id `id`.
pub fn profile_of(name: &str, id: &str) -> StructureDefinition {
    parent(name).derive_profile(id, id, &example_url(id))
}
