//! Type lineage resolution
//!
//! A lineage is the chain of definitions from a type or profile up to its root
//! base type: element 0 is the item itself and each following element is the
//! parent of the previous one.

use crate::fishable::{FishKind, Fishable, Metadata};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct LineageOptions {
    /// Append the lineages of profiles imposed through the impose-profile extension.
    pub include_imposed: bool,
}

/// Resolve the ancestry of `item` (a type name, id or canonical URL).
///
/// The walk stops at the first parent that is blank or cannot be resolved, and at
/// the first URL that was already visited. An unresolvable `item` yields an empty
/// lineage.
pub fn lineage<F: Fishable + ?Sized>(
    fisher: &F,
    item: &str,
    options: LineageOptions,
) -> Vec<Metadata> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    collect(fisher, item, options, &mut seen, &mut result);
    result
}

fn collect<F: Fishable + ?Sized>(
    fisher: &F,
    item: &str,
    options: LineageOptions,
    seen: &mut HashSet<String>,
    result: &mut Vec<Metadata>,
) {
    let mut primary = Vec::new();
    let mut next = fisher.fish_for_metadata(item, FishKind::STRUCTURES);

    while let Some(md) = next.take() {
        let key = md.url.clone().unwrap_or_else(|| md.id.clone());
        if !seen.insert(key) {
            tracing::debug!(item, url = ?md.url, "Lineage cycle detected");
            break;
        }
        next = md
            .parent
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .and_then(|p| fisher.fish_for_metadata(p, FishKind::STRUCTURES));
        primary.push(md);
    }

    let imposed: Vec<String> = if options.include_imposed {
        primary
            .iter()
            .flat_map(|md| md.imposed_profiles.iter().cloned())
            .collect()
    } else {
        Vec::new()
    };
    result.extend(primary);

    for profile in imposed {
        collect(fisher, &profile, options, seen, result);
    }
}

/// True when `ancestor` (a type name or URL) appears in the lineage of `item`.
pub fn is_descendant_of<F: Fishable + ?Sized>(fisher: &F, item: &str, ancestor: &str) -> bool {
    lineage(fisher, item, LineageOptions::default())
        .iter()
        .any(|md| md.id == ancestor || md.name == ancestor || md.matches_canonical(ancestor))
}
