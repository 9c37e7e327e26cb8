//! Element tree
//!
//! The elements of one StructureDefinition, stored in document (snapshot) order in
//! an arena and indexed by id. Parent, child and slice relationships are derived
//! from the id structure alone: `a.b` is a child of `a`, `a.b:s` is a slice of
//! `a.b`, and `a.b:s/r` is a reslice of `a.b:s`. Because the index is an ordered
//! map, all ids sharing a prefix form one contiguous range:
//!
//! - descendants of `X` are the keys in `X.` .. `X/`
//! - slices of an unnamed element `X` are the keys in `X:` .. `X;`
//! - reslices of a slice `X:s` are the keys in `X:s/` .. `X:s0`
//!
//! Each node carries two generations of its element: the current value and the
//! baseline captured when the node was inherited, grafted or created. The
//! differential is the comparison of the two.

use crate::diff;
use crate::error::{Error, Result};
use fsh_models::ElementDefinition;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    current: ElementDefinition,
    baseline: Option<ElementDefinition>,
}

impl ElementNode {
    /// A node without baseline: its whole content counts as differential.
    pub fn new(element: ElementDefinition) -> Self {
        Self {
            current: element,
            baseline: None,
        }
    }

    /// A node whose baseline is its current content.
    pub fn with_baseline(element: ElementDefinition) -> Self {
        Self {
            baseline: Some(element.clone()),
            current: element,
        }
    }

    pub fn id(&self) -> &str {
        &self.current.id
    }

    pub fn element(&self) -> &ElementDefinition {
        &self.current
    }

    /// Mutable access to the current element. The id must not be changed.
    pub fn element_mut(&mut self) -> &mut ElementDefinition {
        &mut self.current
    }

    pub fn baseline(&self) -> Option<&ElementDefinition> {
        self.baseline.as_ref()
    }

    pub fn capture_baseline(&mut self) {
        self.baseline = Some(self.current.clone());
    }

    pub fn set_baseline(&mut self, baseline: ElementDefinition) {
        self.baseline = Some(baseline);
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    /// True when the element's own properties differ from its baseline.
    pub fn has_own_diff(&self) -> bool {
        diff::has_own_diff(&self.current, self.baseline.as_ref())
    }

    pub fn diff(&self) -> ElementDefinition {
        diff::calculate_diff(&self.current, self.baseline.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementTree {
    /// Arena slots, never removed
    nodes: Vec<ElementNode>,
    /// Slots in document order
    order: Vec<usize>,
    /// Position of each slot in `order`
    rank: Vec<usize>,
    by_id: BTreeMap<String, usize>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from snapshot elements, capturing each element as its baseline.
    pub fn from_elements(elements: Vec<ElementDefinition>) -> Result<Self> {
        let mut tree = Self::new();
        let nodes = elements.into_iter().map(ElementNode::with_baseline).collect();
        tree.insert_at(0, nodes)?;
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ElementNode> {
        self.by_id.get(id).map(|&slot| &self.nodes[slot])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ElementNode> {
        let slot = *self.by_id.get(id)?;
        Some(&mut self.nodes[slot])
    }

    pub fn get(&self, id: &str) -> Option<&ElementDefinition> {
        self.node(id).map(ElementNode::element)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ElementDefinition> {
        self.node_mut(id).map(ElementNode::element_mut)
    }

    pub fn root(&self) -> Option<&ElementDefinition> {
        self.order.first().map(|&slot| self.nodes[slot].element())
    }

    /// Nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = &ElementNode> {
        self.order.iter().map(move |&slot| &self.nodes[slot])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ElementNode> {
        self.nodes.iter_mut()
    }

    /// Current elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.iter().map(ElementNode::element)
    }

    /// Position of `id` in document order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).map(|&slot| self.rank[slot])
    }

    /// Insert nodes at a document position. Ids must be new to the tree.
    pub fn insert_at(&mut self, position: usize, nodes: Vec<ElementNode>) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for node in &nodes {
            if self.contains(node.id()) || !seen.insert(node.id().to_string()) {
                return Err(Error::InvalidStructureDefinition(format!(
                    "duplicate element id '{}'",
                    node.id()
                )));
            }
        }

        let position = position.min(self.order.len());
        let mut slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            let slot = self.nodes.len();
            self.by_id.insert(node.id().to_string(), slot);
            self.nodes.push(node);
            self.rank.push(0);
            slots.push(slot);
        }
        self.order.splice(position..position, slots);
        for (i, &slot) in self.order.iter().enumerate().skip(position) {
            self.rank[slot] = i;
        }
        Ok(())
    }

    /// Position right after `id`, its descendants and all of its slices.
    pub fn family_end(&self, id: &str) -> Option<usize> {
        let start = self.position(id)?;
        let prefixes = [format!("{}.", id), format!("{}:", id), format!("{}/", id)];
        let end = self.order[start + 1..]
            .iter()
            .take_while(|&&slot| {
                let other = self.nodes[slot].id();
                prefixes.iter().any(|p| other.starts_with(p.as_str()))
            })
            .count();
        Some(start + 1 + end)
    }

    fn range_ids(&self, start: String, end: String) -> Vec<(String, usize)> {
        self.by_id
            .range(start..end)
            .map(|(id, &slot)| (id.clone(), slot))
            .collect()
    }

    fn in_document_order(&self, mut entries: Vec<(String, usize)>) -> Vec<String> {
        entries.sort_by_key(|(_, slot)| self.rank[*slot]);
        entries.into_iter().map(|(id, _)| id).collect()
    }

    /// All descendants of `id` (not its slices), in document order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let entries = self.range_ids(format!("{}.", id), format!("{}/", id));
        self.in_document_order(entries)
    }

    /// Children of `id`; with `direct_only`, only those one level deeper (including
    /// slices of direct children).
    pub fn children(&self, id: &str, direct_only: bool) -> Vec<String> {
        let prefix_len = id.len() + 1;
        let entries = self
            .range_ids(format!("{}.", id), format!("{}/", id))
            .into_iter()
            .filter(|(child, _)| !direct_only || !child[prefix_len..].contains('.'))
            .collect();
        self.in_document_order(entries)
    }

    /// Slices of `id`: for an unnamed element every slice and reslice, for a slice
    /// its reslices.
    pub fn slices(&self, id: &str) -> Vec<String> {
        let (start, end) = slice_range(id);
        let prefix_len = start.len();
        let entries = self
            .range_ids(start, end)
            .into_iter()
            .filter(|(slice, _)| !slice[prefix_len..].contains('.'))
            .collect();
        self.in_document_order(entries)
    }

    /// Slices one level below `id` (no reslices).
    pub fn direct_slices(&self, id: &str) -> Vec<String> {
        let (start, end) = slice_range(id);
        let prefix_len = start.len();
        let entries = self
            .range_ids(start, end)
            .into_iter()
            .filter(|(slice, _)| {
                let name = &slice[prefix_len..];
                !name.contains('.') && !name.contains('/')
            })
            .collect();
        self.in_document_order(entries)
    }

    /// True when `id` declares slicing or already has slices.
    pub fn is_sliced(&self, id: &str) -> bool {
        self.get(id).is_some_and(|e| e.slicing.is_some()) || !self.direct_slices(id).is_empty()
    }

    /// Capture the current content of every node as its baseline.
    pub fn capture_baselines(&mut self) {
        for node in &mut self.nodes {
            node.capture_baseline();
        }
    }

    /// True when the element changed, or when it is a slice or sliced element and
    /// anything below it changed.
    pub fn has_diff(&self, id: &str) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.has_own_diff() {
            return true;
        }
        let element = node.element();
        let slice_or_sliced = element.slice_name.is_some() || self.is_sliced(id);
        slice_or_sliced
            && self
                .descendants(id)
                .iter()
                .filter_map(|d| self.node(d))
                .any(ElementNode::has_own_diff)
    }

    /// Differential elements in document order.
    pub fn differential(&self) -> Vec<ElementDefinition> {
        self.iter()
            .filter(|node| self.has_diff(node.id()))
            .map(ElementNode::diff)
            .collect()
    }
}

fn slice_range(id: &str) -> (String, String) {
    if is_slice_id(id) {
        (format!("{}/", id), format!("{}0", id))
    } else {
        (format!("{}:", id), format!("{};", id))
    }
}

/// The last dot-separated segment of an id (`b:s` for `a.b:s`).
pub fn last_segment(id: &str) -> &str {
    id.rsplit_once('.').map_or(id, |(_, last)| last)
}

/// Id of the parent element (`a.b:s` for `a.b:s.c`, `a` for `a.b:s`).
pub fn parent_id(id: &str) -> Option<&str> {
    id.rsplit_once('.').map(|(parent, _)| parent)
}

/// True when the last segment of the id names a slice.
pub fn is_slice_id(id: &str) -> bool {
    last_segment(id).contains(':')
}

/// Id of the element a slice belongs to (`a.b` for `a.b:s`, `a.b:s` for `a.b:s/r`).
pub fn sliced_element_id(id: &str) -> Option<&str> {
    let segment_start = id.rfind('.').map_or(0, |i| i + 1);
    let segment = &id[segment_start..];
    if let Some(i) = segment.rfind('/') {
        return Some(&id[..segment_start + i]);
    }
    segment.find(':').map(|i| &id[..segment_start + i])
}

/// Element path for an id: slice qualifiers removed.
pub fn path_of(id: &str) -> String {
    id.split('.')
        .map(|segment| segment.split(':').next().unwrap_or(segment))
        .collect::<Vec<_>>()
        .join(".")
}
