use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::rules::Flags;
use crate::structure::StructureDefinition;
use serde_json::{json, Value};

pub const STANDARDS_STATUS_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-standards-status";

impl StructureDefinition {
    /// Turn on flags of an element. Flags that are `false` are left alone; a flag
    /// that is already set is never cleared.
    ///
    /// mustSupport goes to the connected elements outside other slices; isSummary
    /// and isModifier go to every connected element.
    pub fn apply_flags(&mut self, id: &str, flags: &Flags, diagnostics: &mut Diagnostics) -> Result<()> {
        let statuses: Vec<&str> = [
            (flags.trial_use, "trial-use"),
            (flags.normative, "normative"),
            (flags.draft, "draft"),
        ]
        .into_iter()
        .filter_map(|(set, code)| set.then_some(code))
        .collect();
        if statuses.len() > 1 {
            return Err(Error::MultipleStandardsStatus {
                element: id.to_string(),
            });
        }
        if flags.must_support && self.is_specialization() {
            return Err(Error::MustSupportInSpecialization {
                element: id.to_string(),
            });
        }
        self.element(id)?;

        if flags.must_support {
            for target in std::iter::once(id.to_string()).chain(self.propagation_targets(id)) {
                self.element_mut(&target)?.must_support = Some(true);
            }
        }
        if flags.summary || flags.modifier {
            let connected = self.elements().connected_elements(id);
            for target in std::iter::once(id.to_string()).chain(connected) {
                let element = self.element_mut(&target)?;
                if flags.summary {
                    element.is_summary = Some(true);
                }
                if flags.modifier {
                    element.is_modifier = Some(true);
                }
            }
        }
        if let Some(status) = statuses.first() {
            let element = self.element_mut(id)?;
            let extensions = element.extension.get_or_insert_with(Vec::new);
            let status_extension = json!({
                "url": STANDARDS_STATUS_EXTENSION,
                "valueCode": status,
            });
            match extensions
                .iter_mut()
                .find(|ext| ext.get("url").and_then(Value::as_str) == Some(STANDARDS_STATUS_EXTENSION))
            {
                Some(existing) => {
                    if existing != &status_extension {
                        diagnostics.debug(id, format!("Replaced standards status of {} with {}", id, status));
                    }
                    *existing = status_extension;
                }
                None => extensions.push(status_extension),
            }
        }
        Ok(())
    }
}
