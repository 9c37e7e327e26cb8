//! Connected elements
//!
//! A constraint on an element also has to hold for the elements that describe
//! the same instance data from within a slice. For `Observation.component.code`
//! these are `Observation.component:s.code` for every slice `s` of
//! `Observation.component`, and recursively the same element under slices of
//! every ancestor.

use crate::tree::{last_segment, parent_id, ElementTree};

impl ElementTree {
    /// Ids of the elements connected to `id`, in discovery order: own slices
    /// first, then the matching elements under slices of each ancestor.
    pub fn connected_elements(&self, id: &str) -> Vec<String> {
        self.connected_with_suffix(id, "")
    }

    fn connected_with_suffix(&self, id: &str, suffix: &str) -> Vec<String> {
        let mut connected: Vec<String> = self
            .slices(id)
            .into_iter()
            .map(|slice| format!("{}{}", slice, suffix))
            .filter(|candidate| self.contains(candidate))
            .collect();

        if let Some(parent) = parent_id(id) {
            let suffix = format!(".{}{}", last_segment(id), suffix);
            connected.extend(self.connected_with_suffix(parent, &suffix));
        }
        connected
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::ElementTree;
    use fsh_models::ElementDefinition;
    use pretty_assertions::assert_eq;

    fn tree(ids: &[&str]) -> ElementTree {
        let elements = ids
            .iter()
            .map(|id| ElementDefinition::new(*id, crate::tree::path_of(id)))
            .collect();
        ElementTree::from_elements(elements).unwrap()
    }

    #[test]
    fn finds_same_element_under_ancestor_slices() {
        let tree = tree(&[
            "Observation",
            "Observation.component",
            "Observation.component.code",
            "Observation.component.code.coding",
            "Observation.component:a",
            "Observation.component:a.code",
            "Observation.component:a.code.coding",
            "Observation.component:a.code.coding:loinc",
            "Observation.component:b",
            "Observation.component:b.code",
        ]);

        assert_eq!(
            tree.connected_elements("Observation.component.code"),
            vec!["Observation.component:a.code", "Observation.component:b.code"]
        );
        assert_eq!(
            tree.connected_elements("Observation.component.code.coding"),
            vec!["Observation.component:a.code.coding"]
        );
        assert_eq!(
            tree.connected_elements("Observation.component:a.code.coding"),
            vec!["Observation.component:a.code.coding:loinc"]
        );
        assert!(tree.connected_elements("Observation").is_empty());
    }

    #[test]
    fn includes_own_slices() {
        let tree = tree(&[
            "Observation",
            "Observation.value[x]",
            "Observation.value[x]:valueQuantity",
        ]);
        assert_eq!(
            tree.connected_elements("Observation.value[x]"),
            vec!["Observation.value[x]:valueQuantity"]
        );
    }
}
