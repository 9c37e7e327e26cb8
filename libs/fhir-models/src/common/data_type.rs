//! FHIR data type kinds
//!
//! Choice properties such as `fixed[x]` and `pattern[x]` are keyed by the data type of
//! their payload. [`DataType`] names that type explicitly so the JSON property name
//! (`fixedCoding`, `patternQuantity`, ...) is derived rather than stored.

use phf::phf_map;
use std::fmt;

/// A FHIR data type that can appear as the payload of a choice property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    // Primitive types
    Base64Binary,
    Boolean,
    Canonical,
    Code,
    Date,
    DateTime,
    Decimal,
    Id,
    Instant,
    Integer,
    Integer64,
    Markdown,
    Oid,
    PositiveInt,
    String,
    Time,
    UnsignedInt,
    Uri,
    Url,
    Uuid,
    Xhtml,

    // General purpose and metadata types
    Address,
    Age,
    Annotation,
    Attachment,
    Availability,
    CodeableConcept,
    CodeableReference,
    Coding,
    ContactDetail,
    ContactPoint,
    Contributor,
    Count,
    DataRequirement,
    Distance,
    Dosage,
    Duration,
    Expression,
    ExtendedContactDetail,
    HumanName,
    Identifier,
    Meta,
    Money,
    MonetaryComponent,
    ParameterDefinition,
    Period,
    Quantity,
    Range,
    Ratio,
    RatioRange,
    Reference,
    RelatedArtifact,
    SampledData,
    Signature,
    Timing,
    TriggerDefinition,
    UsageContext,
    VirtualServiceDetail,
}

static DATA_TYPES_BY_CODE: phf::Map<&'static str, DataType> = phf_map! {
    "base64Binary" => DataType::Base64Binary,
    "boolean" => DataType::Boolean,
    "canonical" => DataType::Canonical,
    "code" => DataType::Code,
    "date" => DataType::Date,
    "dateTime" => DataType::DateTime,
    "decimal" => DataType::Decimal,
    "id" => DataType::Id,
    "instant" => DataType::Instant,
    "integer" => DataType::Integer,
    "integer64" => DataType::Integer64,
    "markdown" => DataType::Markdown,
    "oid" => DataType::Oid,
    "positiveInt" => DataType::PositiveInt,
    "string" => DataType::String,
    "time" => DataType::Time,
    "unsignedInt" => DataType::UnsignedInt,
    "uri" => DataType::Uri,
    "url" => DataType::Url,
    "uuid" => DataType::Uuid,
    "xhtml" => DataType::Xhtml,

    "Address" => DataType::Address,
    "Age" => DataType::Age,
    "Annotation" => DataType::Annotation,
    "Attachment" => DataType::Attachment,
    "Availability" => DataType::Availability,
    "CodeableConcept" => DataType::CodeableConcept,
    "CodeableReference" => DataType::CodeableReference,
    "Coding" => DataType::Coding,
    "ContactDetail" => DataType::ContactDetail,
    "ContactPoint" => DataType::ContactPoint,
    "Contributor" => DataType::Contributor,
    "Count" => DataType::Count,
    "DataRequirement" => DataType::DataRequirement,
    "Distance" => DataType::Distance,
    "Dosage" => DataType::Dosage,
    "Duration" => DataType::Duration,
    "Expression" => DataType::Expression,
    "ExtendedContactDetail" => DataType::ExtendedContactDetail,
    "HumanName" => DataType::HumanName,
    "Identifier" => DataType::Identifier,
    "Meta" => DataType::Meta,
    "Money" => DataType::Money,
    "MonetaryComponent" => DataType::MonetaryComponent,
    "ParameterDefinition" => DataType::ParameterDefinition,
    "Period" => DataType::Period,
    "Quantity" => DataType::Quantity,
    "Range" => DataType::Range,
    "Ratio" => DataType::Ratio,
    "RatioRange" => DataType::RatioRange,
    "Reference" => DataType::Reference,
    "RelatedArtifact" => DataType::RelatedArtifact,
    "SampledData" => DataType::SampledData,
    "Signature" => DataType::Signature,
    "Timing" => DataType::Timing,
    "TriggerDefinition" => DataType::TriggerDefinition,
    "UsageContext" => DataType::UsageContext,
    "VirtualServiceDetail" => DataType::VirtualServiceDetail,
};

impl DataType {
    /// Look up a data type by its FHIR type code (`"dateTime"`, `"Coding"`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        DATA_TYPES_BY_CODE.get(code).copied()
    }

    /// Look up a data type from the suffix of a choice property name
    /// (`"DateTime"` in `fixedDateTime`, `"Coding"` in `patternCoding`).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        if let Some(dt) = Self::from_code(suffix) {
            return Some(dt);
        }
        let mut chars = suffix.chars();
        let first = chars.next()?;
        let lowered: String = first.to_lowercase().chain(chars).collect();
        Self::from_code(&lowered).filter(|dt| dt.is_primitive())
    }

    /// The FHIR type code, as used in `ElementDefinition.type.code`.
    pub fn code(&self) -> &'static str {
        match self {
            DataType::Base64Binary => "base64Binary",
            DataType::Boolean => "boolean",
            DataType::Canonical => "canonical",
            DataType::Code => "code",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::Decimal => "decimal",
            DataType::Id => "id",
            DataType::Instant => "instant",
            DataType::Integer => "integer",
            DataType::Integer64 => "integer64",
            DataType::Markdown => "markdown",
            DataType::Oid => "oid",
            DataType::PositiveInt => "positiveInt",
            DataType::String => "string",
            DataType::Time => "time",
            DataType::UnsignedInt => "unsignedInt",
            DataType::Uri => "uri",
            DataType::Url => "url",
            DataType::Uuid => "uuid",
            DataType::Xhtml => "xhtml",
            DataType::Address => "Address",
            DataType::Age => "Age",
            DataType::Annotation => "Annotation",
            DataType::Attachment => "Attachment",
            DataType::Availability => "Availability",
            DataType::CodeableConcept => "CodeableConcept",
            DataType::CodeableReference => "CodeableReference",
            DataType::Coding => "Coding",
            DataType::ContactDetail => "ContactDetail",
            DataType::ContactPoint => "ContactPoint",
            DataType::Contributor => "Contributor",
            DataType::Count => "Count",
            DataType::DataRequirement => "DataRequirement",
            DataType::Distance => "Distance",
            DataType::Dosage => "Dosage",
            DataType::Duration => "Duration",
            DataType::Expression => "Expression",
            DataType::ExtendedContactDetail => "ExtendedContactDetail",
            DataType::HumanName => "HumanName",
            DataType::Identifier => "Identifier",
            DataType::Meta => "Meta",
            DataType::Money => "Money",
            DataType::MonetaryComponent => "MonetaryComponent",
            DataType::ParameterDefinition => "ParameterDefinition",
            DataType::Period => "Period",
            DataType::Quantity => "Quantity",
            DataType::Range => "Range",
            DataType::Ratio => "Ratio",
            DataType::RatioRange => "RatioRange",
            DataType::Reference => "Reference",
            DataType::RelatedArtifact => "RelatedArtifact",
            DataType::SampledData => "SampledData",
            DataType::Signature => "Signature",
            DataType::Timing => "Timing",
            DataType::TriggerDefinition => "TriggerDefinition",
            DataType::UsageContext => "UsageContext",
            DataType::VirtualServiceDetail => "VirtualServiceDetail",
        }
    }

    /// Suffix used when this type materializes a choice property (`dateTime` -> `DateTime`).
    pub fn suffix(&self) -> String {
        let code = self.code();
        let mut chars = code.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Build the concrete property name for a choice property prefix.
    ///
    /// `DataType::Coding.property_name("pattern")` is `"patternCoding"`.
    pub fn property_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.suffix())
    }

    pub fn is_primitive(&self) -> bool {
        self.code()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Split a materialized choice property name (`fixedCoding`) into its data type,
/// given the choice prefix (`fixed`).
pub fn split_choice_property(name: &str, prefix: &str) -> Option<DataType> {
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    DataType::from_suffix(suffix)
}
