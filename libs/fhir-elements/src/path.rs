//! FSH element paths
//!
//! A path such as `component[systolic].code.coding[+].system` is a list of
//! [`PathPart`]s split on the periods outside brackets. Each bracket group is a slice
//! name, the choice marker `x`, a numeric index, or one of the soft indices `+`
//! (next index) and `=` (same index as last time).

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::rules::Rule;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPart {
    pub base: String,
    pub brackets: Vec<String>,
}

/// Classification of one bracket group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket<'a> {
    Choice,
    Index(u32),
    Next,
    Same,
    Slice(&'a str),
}

impl<'a> Bracket<'a> {
    pub fn classify(text: &'a str) -> Bracket<'a> {
        match text {
            "x" => Bracket::Choice,
            "+" => Bracket::Next,
            "=" => Bracket::Same,
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits.parse().map(Bracket::Index).unwrap_or(Bracket::Slice(digits))
            }
            name => Bracket::Slice(name),
        }
    }

    fn is_index(&self) -> bool {
        matches!(self, Bracket::Index(_) | Bracket::Next | Bracket::Same)
    }
}

impl PathPart {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            brackets: Vec::new(),
        }
    }

    /// `value[x]` style choice element.
    pub fn is_choice(&self) -> bool {
        self.brackets.iter().any(|b| b == "x")
    }

    /// Slice names in order (`component[a][b]` is slice `a`, reslice `b`).
    pub fn slice_names(&self) -> Vec<&str> {
        self.brackets
            .iter()
            .filter_map(|b| match Bracket::classify(b) {
                Bracket::Slice(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn index(&self) -> Option<u32> {
        self.brackets.iter().find_map(|b| match Bracket::classify(b) {
            Bracket::Index(i) => Some(i),
            _ => None,
        })
    }

    /// The element name as it appears in an element id (`value[x]` or `code`).
    pub fn element_name(&self) -> String {
        if self.is_choice() {
            format!("{}[x]", self.base)
        } else {
            self.base.clone()
        }
    }

    fn has_index(&self) -> bool {
        self.brackets
            .iter()
            .any(|b| Bracket::classify(b).is_index())
    }
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for bracket in &self.brackets {
            write!(f, "[{}]", bracket)?;
        }
        Ok(())
    }
}

/// Split a path on the periods that are not inside brackets.
///
/// `""` and `"."` both denote the root and parse to no parts.
pub fn parse_path(text: &str) -> Result<Vec<PathPart>> {
    let text = text.trim();
    if text.is_empty() || text == "." {
        return Ok(Vec::new());
    }

    let invalid = |reason: &str| Error::InvalidPath {
        path: text.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    let mut current = PathPart::default();
    let mut bracket: Option<String> = None;
    let mut after_bracket = false;

    for c in text.chars() {
        match (&mut bracket, c) {
            (Some(_), '[') => return Err(invalid("nested '['")),
            (Some(content), ']') => {
                current.brackets.push(std::mem::take(content));
                bracket = None;
                after_bracket = true;
            }
            (Some(content), c) => content.push(c),
            (None, '[') => {
                if current.base.is_empty() {
                    return Err(invalid("bracket without element name"));
                }
                bracket = Some(String::new());
            }
            (None, ']') => return Err(invalid("unmatched ']'")),
            (None, '.') => {
                if current.base.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                parts.push(std::mem::take(&mut current));
                after_bracket = false;
            }
            (None, c) => {
                if after_bracket {
                    return Err(invalid("text after ']' must start a new segment"));
                }
                current.base.push(c);
            }
        }
    }

    if bracket.is_some() {
        return Err(invalid("unclosed '['"));
    }
    if current.base.is_empty() {
        return Err(invalid("empty path segment"));
    }
    parts.push(current);
    Ok(parts)
}

/// Rebuild a path string, dropping `[0]` indices (the first repetition is implied).
pub fn assemble(parts: &[PathPart]) -> String {
    parts
        .iter()
        .map(|part| {
            let mut text = part.base.clone();
            for bracket in &part.brackets {
                if bracket != "0" {
                    text.push('[');
                    text.push_str(bracket);
                    text.push(']');
                }
            }
            text
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn assemble_raw(parts: &[PathPart]) -> String {
    parts
        .iter()
        .map(PathPart::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Running indices of one path context, keyed by the path up to each indexed part.
#[derive(Debug, Default)]
struct IndexMap {
    last: HashMap<String, u32>,
}

impl IndexMap {
    /// Replace the soft and numeric indices of `path` with concrete ones.
    fn resolve(&mut self, path: &str, diagnostics: &mut Diagnostics) -> Result<String> {
        let mut parts = parse_path(path)?;
        if !parts.iter().any(PathPart::has_index) {
            return Ok(path.to_string());
        }

        for i in 0..parts.len() {
            let prefix = assemble_raw(&parts[..i]);
            let part = &mut parts[i];
            let mut key = if prefix.is_empty() {
                part.base.clone()
            } else {
                format!("{}.{}", prefix, part.base)
            };

            for bracket in part.brackets.iter_mut() {
                let index = match Bracket::classify(bracket) {
                    Bracket::Index(i) => i,
                    Bracket::Next => self.last.get(&key).map_or(0, |i| i + 1),
                    Bracket::Same => match self.last.get(&key) {
                        Some(i) => *i,
                        None => {
                            diagnostics.error(
                                path,
                                format!(
                                    "The first index of {} is '=', there is no previous index to repeat; assuming 0",
                                    key
                                ),
                            );
                            0
                        }
                    },
                    Bracket::Choice | Bracket::Slice(_) => {
                        key.push('[');
                        key.push_str(bracket);
                        key.push(']');
                        continue;
                    }
                };
                self.last.insert(key.clone(), index);
                *bracket = index.to_string();
                key.push_str(&format!("[{}]", index));
            }
        }
        Ok(assemble(&parts))
    }
}

/// Resolve soft indices (`+`, `=`) in the paths of a rule batch, in rule order.
///
/// Element paths share one running-index context. Caret paths get an independent
/// context per element path. Paths that cannot be parsed are reported and left as is.
pub fn resolve_soft_indexing(rules: &mut [Rule], diagnostics: &mut Diagnostics) {
    let mut paths = IndexMap::default();
    let mut caret_paths: HashMap<String, IndexMap> = HashMap::new();

    for rule in rules.iter_mut() {
        diagnostics.set_source(Some(rule.source().clone()));

        match paths.resolve(rule.path(), diagnostics) {
            Ok(resolved) => *rule.path_mut() = resolved,
            Err(e) => diagnostics.error(rule.path(), e.to_string()),
        }

        let element_path = rule.path().to_string();
        if let Some(caret_path) = rule.caret_path_mut() {
            let context = caret_paths.entry(element_path.clone()).or_default();
            match context.resolve(caret_path, diagnostics) {
                Ok(resolved) => *caret_path = resolved,
                Err(e) => diagnostics.error(&element_path, e.to_string()),
            }
        }
    }
    diagnostics.set_source(None);
}
