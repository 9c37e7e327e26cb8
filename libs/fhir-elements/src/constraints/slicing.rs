use crate::error::{Error, Result};
use crate::structure::StructureDefinition;
use fsh_models::{
    ElementDefinitionDiscriminator, ElementDefinitionSlicing, ElementDefinitionType, SlicingRules,
};

impl StructureDefinition {
    /// Declare slicing on an element, or merge into the slicing it already has.
    ///
    /// Existing slicing may be tightened (unordered to ordered, open to closed or
    /// openAtEnd) but never loosened. A discriminator already present is not
    /// added twice, so repeating the call changes nothing.
    pub fn slice_it(
        &mut self,
        id: &str,
        discriminator: ElementDefinitionDiscriminator,
        ordered: bool,
        rules: SlicingRules,
    ) -> Result<()> {
        let element = self.element_mut(id)?;
        let Some(slicing) = element.slicing.as_mut() else {
            element.slicing = Some(ElementDefinitionSlicing {
                discriminator: Some(vec![discriminator]),
                description: None,
                ordered: Some(ordered),
                rules,
            });
            return Ok(());
        };

        if slicing.ordered == Some(true) && !ordered {
            return Err(Error::SlicingLoosened {
                element: id.to_string(),
                property: "ordered".into(),
                current: "true".into(),
                requested: "false".into(),
            });
        }
        let loosened = match slicing.rules {
            SlicingRules::Closed => rules != SlicingRules::Closed,
            SlicingRules::OpenAtEnd => rules == SlicingRules::Open,
            SlicingRules::Open => false,
        };
        if loosened {
            return Err(Error::SlicingLoosened {
                element: id.to_string(),
                property: "rules".into(),
                current: rules_name(slicing.rules).into(),
                requested: rules_name(rules).into(),
            });
        }

        if ordered {
            slicing.ordered = Some(true);
        }
        slicing.rules = rules;
        let discriminators = slicing.discriminator.get_or_insert_with(Vec::new);
        if !discriminators.contains(&discriminator) {
            discriminators.push(discriminator);
        }
        Ok(())
    }

    /// Add a slice (or a reslice, when `id` is itself a slice) named `name`.
    ///
    /// The slice starts as a copy of the sliced element without its slicing,
    /// optionally narrowed to `slice_type`. Returns the id of the new slice.
    pub fn add_slice(
        &mut self,
        id: &str,
        name: &str,
        slice_type: Option<ElementDefinitionType>,
    ) -> Result<String> {
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '.' | ':' | '/'))
        {
            return Err(Error::InvalidSliceName {
                name: name.to_string(),
            });
        }

        let element = self.element(id)?;
        let (slice_id, slice_name) = match &element.slice_name {
            Some(parent) => (format!("{}/{}", id, name), format!("{}/{}", parent, name)),
            None if element.slicing.is_some() => (format!("{}:{}", id, name), name.to_string()),
            None => {
                return Err(Error::SlicingNotDefined {
                    element: id.to_string(),
                    slice: name.to_string(),
                })
            }
        };
        if self.elements().contains(&slice_id) {
            return Err(Error::DuplicateSlice {
                element: id.to_string(),
                slice: name.to_string(),
            });
        }

        let closed_single_choice = element.is_choice_type()
            && element.types().len() == 1
            && element
                .slicing
                .as_ref()
                .is_some_and(|s| s.rules == SlicingRules::Closed);

        let mut slice = element.clone();
        slice.id = slice_id.clone();
        slice.slicing = None;
        if let Some(slice_type) = slice_type {
            slice.types = Some(vec![slice_type]);
        }
        let mut baseline = slice.clone();
        baseline.slice_name = None;
        baseline.min = None;
        baseline.max = None;

        slice.slice_name = Some(slice_name);
        if !closed_single_choice {
            slice.min = Some(0);
        }

        let position = self
            .elements()
            .family_end(id)
            .ok_or_else(|| self.not_found(id))?;
        let mut node = crate::tree::ElementNode::new(slice);
        node.set_baseline(baseline);
        self.elements_mut().insert_at(position, vec![node])?;
        tracing::debug!(element = id, slice = %slice_id, "Added slice");
        Ok(slice_id)
    }
}

fn rules_name(rules: SlicingRules) -> &'static str {
    match rules {
        SlicingRules::Closed => "closed",
        SlicingRules::Open => "open",
        SlicingRules::OpenAtEnd => "openAtEnd",
    }
}
