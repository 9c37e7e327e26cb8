//! Definition lookup capability
//!
//! The profiling engine never loads packages itself. It asks a [`Fishable`] for a
//! definition by name, id or canonical URL (optionally suffixed with `|version`),
//! restricted to the kinds of artifact it is prepared to accept.

use fsh_models::{StructureDefinition, StructureDefinitionKind, TypeDerivationRule};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The kinds of artifact a lookup may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FishKind {
    Resource,
    Type,
    Profile,
    Extension,
    Logical,
    ValueSet,
    CodeSystem,
    Instance,
}

impl FishKind {
    /// Every kind that is backed by a StructureDefinition.
    pub const STRUCTURES: &'static [FishKind] = &[
        FishKind::Resource,
        FishKind::Type,
        FishKind::Profile,
        FishKind::Extension,
        FishKind::Logical,
    ];

    pub const ALL: &'static [FishKind] = &[
        FishKind::Resource,
        FishKind::Type,
        FishKind::Profile,
        FishKind::Extension,
        FishKind::Logical,
        FishKind::ValueSet,
        FishKind::CodeSystem,
        FishKind::Instance,
    ];

    /// Classify a FHIR JSON resource.
    pub fn classify(resource: &Value) -> FishKind {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some("StructureDefinition") => {
                let derivation = resource.get("derivation").and_then(Value::as_str);
                let kind = resource.get("kind").and_then(Value::as_str);
                let sd_type = resource.get("type").and_then(Value::as_str);
                match (derivation, kind, sd_type) {
                    (Some("constraint"), _, Some("Extension")) => FishKind::Extension,
                    (Some("constraint"), _, _) => FishKind::Profile,
                    (_, Some("logical"), _) => FishKind::Logical,
                    (_, Some("resource"), _) => FishKind::Resource,
                    _ => FishKind::Type,
                }
            }
            Some("ValueSet") => FishKind::ValueSet,
            Some("CodeSystem") => FishKind::CodeSystem,
            _ => FishKind::Instance,
        }
    }
}

impl fmt::Display for FishKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FishKind::Resource => "Resource",
            FishKind::Type => "Type",
            FishKind::Profile => "Profile",
            FishKind::Extension => "Extension",
            FishKind::Logical => "Logical",
            FishKind::ValueSet => "ValueSet",
            FishKind::CodeSystem => "CodeSystem",
            FishKind::Instance => "Instance",
        };
        f.write_str(name)
    }
}

/// Summary of a definition, enough to reason about type lineage without parsing
/// the full resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub version: Option<String>,
    /// `baseDefinition` of a StructureDefinition
    pub parent: Option<String>,
    /// `type` of a StructureDefinition
    pub sd_type: Option<String>,
    pub resource_type: String,
    pub fish_kind: FishKind,
    pub kind: Option<StructureDefinitionKind>,
    pub derivation: Option<TypeDerivationRule>,
    pub is_abstract: bool,
    /// Logical models marked bindable via type characteristics
    pub can_bind: bool,
    pub imposed_profiles: Vec<String>,
}

impl Metadata {
    /// Build metadata for any FHIR JSON resource.
    pub fn from_resource(resource: &Value) -> Metadata {
        let str_field = |name: &str| resource.get(name).and_then(Value::as_str).map(str::to_string);
        let fish_kind = FishKind::classify(resource);
        let id = str_field("id").unwrap_or_default();
        let structure = StructureDefinition::from_value(resource).ok();

        Metadata {
            name: str_field("name").unwrap_or_else(|| id.clone()),
            id,
            url: str_field("url"),
            version: str_field("version"),
            parent: str_field("baseDefinition"),
            sd_type: str_field("type").filter(|_| structure.is_some()),
            resource_type: str_field("resourceType").unwrap_or_default(),
            fish_kind,
            kind: structure.as_ref().map(|sd| sd.kind),
            derivation: structure.as_ref().and_then(|sd| sd.derivation),
            is_abstract: structure.as_ref().is_some_and(|sd| sd.is_abstract),
            can_bind: structure.as_ref().is_some_and(|sd| sd.is_bindable_logical()),
            imposed_profiles: structure
                .as_ref()
                .map(|sd| sd.imposed_profiles())
                .unwrap_or_default(),
        }
    }

    /// True when `canonical` names this definition, with or without a `|version` suffix.
    pub fn matches_canonical(&self, canonical: &str) -> bool {
        let Some(url) = &self.url else {
            return false;
        };
        match canonical.split_once('|') {
            Some((base, version)) => base == url && self.version.as_deref() == Some(version),
            None => canonical == url,
        }
    }

    /// A profile or extension: a constraint on some other type.
    pub fn is_constraint(&self) -> bool {
        self.derivation == Some(TypeDerivationRule::Constraint)
    }

    pub fn is_logical(&self) -> bool {
        self.kind == Some(StructureDefinitionKind::Logical)
    }

    /// The code used for this definition in `ElementDefinition.type.code`.
    ///
    /// Profiles use the type they constrain; logical models are referenced by URL.
    pub fn type_code(&self) -> Option<&str> {
        if self.is_logical() && !self.is_constraint() {
            return self.url.as_deref().or(self.sd_type.as_deref());
        }
        self.sd_type.as_deref()
    }
}

/// Synchronous, read-only lookup against an already loaded definition set.
///
/// An empty `kinds` slice means "any kind". When several kinds are given, earlier
/// kinds are preferred over later ones.
pub trait Fishable {
    fn fish_for_fhir(&self, item: &str, kinds: &[FishKind]) -> Option<Arc<Value>>;

    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata>;

    /// Fetch and parse a StructureDefinition.
    fn fish_for_structure(&self, item: &str, kinds: &[FishKind]) -> Option<StructureDefinition> {
        let resource = self.fish_for_fhir(item, kinds)?;
        match StructureDefinition::from_value(&resource) {
            Ok(sd) => Some(sd),
            Err(e) => {
                tracing::warn!(item, error = %e, "Definition is not a valid StructureDefinition");
                None
            }
        }
    }
}

impl<T: Fishable + ?Sized> Fishable for &T {
    fn fish_for_fhir(&self, item: &str, kinds: &[FishKind]) -> Option<Arc<Value>> {
        (**self).fish_for_fhir(item, kinds)
    }

    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        (**self).fish_for_metadata(item, kinds)
    }
}

impl<T: Fishable + ?Sized> Fishable for Arc<T> {
    fn fish_for_fhir(&self, item: &str, kinds: &[FishKind]) -> Option<Arc<Value>> {
        (**self).fish_for_fhir(item, kinds)
    }

    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        (**self).fish_for_metadata(item, kinds)
    }
}
