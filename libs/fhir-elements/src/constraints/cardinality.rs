use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::structure::StructureDefinition;
use crate::tree::sliced_element_id;
use fsh_models::Max;

impl StructureDefinition {
    /// Narrow the cardinality of an element. `None` keeps the current bound.
    ///
    /// The element's slices, the sibling slices of a slice and the connected
    /// elements are checked before anything changes; the whole change is rolled
    /// back when any of them rejects it.
    pub fn constrain_cardinality(
        &mut self,
        id: &str,
        min: Option<u32>,
        max: Option<Max>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        self.transaction(diagnostics, |sd, diagnostics| {
            sd.narrow_cardinality(id, min, max, diagnostics)
        })
    }

    fn narrow_cardinality(
        &mut self,
        id: &str,
        min: Option<u32>,
        max: Option<Max>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let element = self.element(id)?;
        let current_min = element.min.unwrap_or(0);
        let current_max = element.max.unwrap_or(Max::Unbounded);
        let new_min = min.unwrap_or(current_min);
        let new_max = max.unwrap_or(current_max);
        let requested = format!("{}..{}", new_min, new_max);

        if !new_max.allows(new_min) {
            return Err(Error::InvalidCardinality {
                element: id.to_string(),
                min: new_min,
                max: new_max,
            });
        }
        if new_min < current_min || new_max > current_max {
            return Err(Error::WideningCardinality {
                element: id.to_string(),
                current: element.cardinality_string(),
                requested,
            });
        }
        let slice_name = element.slice_name.clone();

        // Slices of this element must fit into the new maximum.
        let slices = self.elements().direct_slices(id);
        let slice_sum: u32 = slices
            .iter()
            .filter_map(|s| self.find_element(s))
            .map(|s| s.min.unwrap_or(0))
            .sum();
        if !new_max.allows(slice_sum) {
            return Err(Error::SliceSumExceedsMax {
                element: id.to_string(),
                sum: slice_sum,
                max: new_max,
            });
        }

        // A slice shares the maximum of the element it slices with its siblings.
        let mut raise_sliced_min = None;
        if slice_name.is_some() {
            if let Some(sliced_id) = sliced_element_id(id) {
                let sliced = self.element(sliced_id)?;
                let sliced_max = sliced.max.unwrap_or(Max::Unbounded);
                let sum: u32 = self
                    .elements()
                    .direct_slices(sliced_id)
                    .iter()
                    .filter(|s| s.as_str() != id)
                    .filter_map(|s| self.find_element(s))
                    .map(|s| s.min.unwrap_or(0))
                    .sum::<u32>()
                    + new_min;
                if !sliced_max.allows(sum) {
                    return Err(Error::SliceMinExceedsSlicedMax {
                        slice: id.to_string(),
                        sliced: sliced_id.to_string(),
                        min: new_min,
                        sum,
                        max: sliced_max,
                    });
                }
                if sum > sliced.min.unwrap_or(0) {
                    raise_sliced_min = Some((sliced_id.to_string(), sum));
                }
            }
        }

        // Connected elements narrow in lock-step and must stay satisfiable.
        let mut connected_updates = Vec::new();
        for connected_id in self.propagation_targets(id) {
            let connected = self.element(&connected_id)?;
            let connected_min = connected.min.unwrap_or(0).max(new_min);
            let connected_max = connected.max.unwrap_or(Max::Unbounded).min(new_max);
            if !connected_max.allows(connected_min) {
                return Err(Error::ConnectedCardinality {
                    element: id.to_string(),
                    connected: connected_id,
                    requested,
                    existing: connected.cardinality_string(),
                });
            }
            connected_updates.push((connected_id, connected_min, connected_max));
        }

        let element = self.element_mut(id)?;
        if min.is_some() {
            element.min = Some(new_min);
        }
        if max.is_some() {
            element.max = Some(new_max);
        }

        for slice_id in slices {
            let slice = self.element_mut(&slice_id)?;
            if slice.max.is_some_and(|m| m > new_max) {
                slice.max = Some(new_max);
                diagnostics.warn(
                    &slice_id,
                    format!(
                        "Reduced the max of slice {} to {} to fit the max of {}",
                        slice_id, new_max, id
                    ),
                );
            }
        }

        for (connected_id, connected_min, connected_max) in connected_updates {
            let connected = self.element_mut(&connected_id)?;
            if connected.min.unwrap_or(0) != connected_min {
                connected.min = Some(connected_min);
            }
            if connected.max.unwrap_or(Max::Unbounded) != connected_max {
                connected.max = Some(connected_max);
            }
        }

        if let Some((sliced_id, sum)) = raise_sliced_min {
            diagnostics.debug(
                &sliced_id,
                format!("Raised the min of {} to {} to cover the minimums of its slices", sliced_id, sum),
            );
            self.narrow_cardinality(&sliced_id, Some(sum), None, diagnostics)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Diagnostics;
    use crate::error::Error;
    use crate::structure::StructureDefinition;
    use fsh_context::testing::{core_index, example_url};
    use fsh_models::{DiscriminatorType, ElementDefinitionDiscriminator, Max, SlicingRules};
    use pretty_assertions::assert_eq;

    fn observation() -> StructureDefinition {
        let index = core_index();
        StructureDefinition::fish(&index, "Observation")
            .unwrap()
            .derive_profile("p", "P", &example_url("p"))
    }

    fn sliced_components(sd: &mut StructureDefinition, names: &[&str]) {
        sd.slice_it(
            "Observation.component",
            ElementDefinitionDiscriminator {
                discriminator_type: DiscriminatorType::Pattern,
                path: "code".into(),
            },
            false,
            SlicingRules::Open,
        )
        .unwrap();
        for name in names {
            sd.add_slice("Observation.component", name, None).unwrap();
        }
    }

    fn card(sd: &StructureDefinition, id: &str) -> (Option<u32>, Option<Max>) {
        let element = sd.find_element(id).unwrap();
        (element.min, element.max)
    }

    #[test]
    fn narrows_and_rejects_widening() {
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();

        sd.constrain_cardinality("Observation.subject", Some(1), Some(Max::Bounded(1)), &mut diagnostics)
            .unwrap();
        assert_eq!(card(&sd, "Observation.subject"), (Some(1), Some(Max::Bounded(1))));

        let err = sd
            .constrain_cardinality("Observation.subject", Some(0), Some(Max::Bounded(1)), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::WideningCardinality { .. }));
        assert_eq!(card(&sd, "Observation.subject"), (Some(1), Some(Max::Bounded(1))));
    }

    #[test]
    fn rejects_min_above_max() {
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        let err = sd
            .constrain_cardinality("Observation.category", Some(3), Some(Max::Bounded(2)), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCardinality { min: 3, .. }));
    }

    #[test]
    fn unspecified_bounds_keep_current_values() {
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.constrain_cardinality("Observation.category", None, Some(Max::Bounded(2)), &mut diagnostics)
            .unwrap();
        assert_eq!(card(&sd, "Observation.category"), (Some(0), Some(Max::Bounded(2))));
        let diff = sd.differential();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].min, None);
    }

    #[test]
    fn slice_minimums_must_fit_the_sliced_max() {
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sd.constrain_cardinality("Observation.component", None, Some(Max::Bounded(3)), &mut diagnostics)
            .unwrap();
        sliced_components(&mut sd, &["a", "b", "c"]);

        sd.constrain_cardinality("Observation.component:a", Some(1), None, &mut diagnostics).unwrap();
        sd.constrain_cardinality("Observation.component:b", Some(1), None, &mut diagnostics).unwrap();
        assert_eq!(card(&sd, "Observation.component").0, Some(2));

        let err = sd
            .constrain_cardinality("Observation.component:c", Some(2), None, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::SliceMinExceedsSlicedMax { sum: 4, .. }));
        assert_eq!(card(&sd, "Observation.component:c").0, Some(0));
        assert_eq!(card(&sd, "Observation.component").0, Some(2));
    }

    #[test]
    fn narrowing_the_sliced_element_narrows_its_slices() {
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sliced_components(&mut sd, &["a", "b"]);
        for slice in ["Observation.component:a", "Observation.component:b"] {
            sd.elements_mut().get_mut(slice).unwrap().min = Some(1);
        }

        let err = sd
            .constrain_cardinality("Observation.component", None, Some(Max::Bounded(1)), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::SliceSumExceedsMax { sum: 2, .. }));

        sd.constrain_cardinality("Observation.component", None, Some(Max::Bounded(2)), &mut diagnostics)
            .unwrap();
        assert_eq!(card(&sd, "Observation.component:a").1, Some(Max::Bounded(2)));
        assert_eq!(diagnostics.warnings().count(), 2);
    }

    #[test]
    fn connected_elements_narrow_together() {
        let index = core_index();
        let mut sd = observation();
        let mut diagnostics = Diagnostics::new();
        sliced_components(&mut sd, &["a"]);
        sd.unfold("Observation.component:a", &index, &mut diagnostics).unwrap();

        sd.constrain_cardinality("Observation.component.interpretation", None, Some(Max::Bounded(1)), &mut diagnostics)
            .unwrap();
        assert_eq!(
            card(&sd, "Observation.component:a.interpretation"),
            (Some(0), Some(Max::Bounded(1)))
        );

        sd.constrain_cardinality("Observation.component:a.interpretation", None, Some(Max::Bounded(0)), &mut diagnostics)
            .unwrap();
        let err = sd
            .constrain_cardinality("Observation.component.interpretation", Some(1), None, &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::ConnectedCardinality { .. }));
        assert_eq!(card(&sd, "Observation.component.interpretation").0, Some(0));
    }
}
