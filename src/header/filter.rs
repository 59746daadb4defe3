//! Content-type filters over array declarations.
//!
//! Some AmiraMesh content types spread one logical object over several
//! declarations. A filter regroups them, for example the columns of an
//! `HxSpreadSheet` into one ordered collection.

use std::collections::HashMap;
use std::fmt;

use super::declaration::ArrayDeclaration;

/// Rewrites the declaration list of one content type.
pub type ContentFilter = fn(&[ArrayDeclaration]) -> Vec<ArrayDeclaration>;

pub const SPREADSHEET: &str = "HxSpreadSheet";
const SHEET_NAME: &str = "Sheet1";

/// Filters keyed by content-type string.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, ContentFilter>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.filters.keys()).finish()
    }
}

impl Default for FilterRegistry {
    /// Registry with the `HxSpreadSheet` column filter.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SPREADSHEET, spreadsheet_columns);
        registry
    }
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self { filters: HashMap::new() }
    }

    /// Register `filter`, returning the one it replaces.
    pub fn register(&mut self, content_type: impl Into<String>, filter: ContentFilter) -> Option<ContentFilter> {
        self.filters.insert(content_type.into(), filter)
    }

    pub fn unregister(&mut self, content_type: &str) -> Option<ContentFilter> {
        self.filters.remove(content_type)
    }

    pub fn get(&self, content_type: &str) -> Option<ContentFilter> {
        self.filters.get(content_type).copied()
    }

    /// Run the filter for `content_type`; unknown types pass through.
    pub fn apply(&self, content_type: Option<&str>, declarations: &[ArrayDeclaration]) -> Vec<ArrayDeclaration> {
        match content_type.and_then(|c| self.get(c)) {
            Some(filter) => {
                tracing::debug!(content_type, count = declarations.len(), "applying content filter");
                filter(declarations)
            }
            None => declarations.to_vec(),
        }
    }
}

/// Split a trailing item counter off `name`: `Col12` gives `("Col", 12)`.
///
/// A counter preceded by `-` or `_` which itself follows a digit belongs to
/// a compound name (`A1_2`) and is not split.
pub fn split_counter(name: &str) -> Option<(&str, usize)> {
    let digits = name.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == name.len() {
        return None;
    }
    let split = name.len() - digits;
    let head = name[..split].as_bytes();
    if let [.., before, sep] = head {
        if (*sep == b'-' || *sep == b'_') && before.is_ascii_digit() {
            return None;
        }
    }
    let counter = name[split..].parse().ok()?;
    Some((&name[..split], counter))
}

/// Group counted columns under a synthetic `Sheet1` collection.
///
/// Applied only when at least two columns carry a counter.
pub fn spreadsheet_columns(declarations: &[ArrayDeclaration]) -> Vec<ArrayDeclaration> {
    let columns: Vec<(usize, usize)> = declarations
        .iter()
        .enumerate()
        .filter(|(_, d)| d.link.is_none())
        .filter_map(|(i, d)| split_counter(&d.name).map(|(_, n)| (i, n)))
        .collect();
    if columns.len() < 2 {
        return declarations.to_vec();
    }
    let len = columns.iter().map(|&(_, n)| n).max().unwrap_or(0) + 1;

    let mut out = Vec::with_capacity(declarations.len() + 1);
    out.push(ArrayDeclaration::collection(SHEET_NAME, len));
    let mut decls = declarations.to_vec();
    for (i, n) in columns {
        decls[i] = decls[i].clone().linked(SHEET_NAME, n);
    }
    out.extend(decls);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_counter() {
        assert_eq!(split_counter("Col12"), Some(("Col", 12)));
        assert_eq!(split_counter("x_3"), Some(("x_", 3)));
        assert_eq!(split_counter("A1_2"), None);
        assert_eq!(split_counter("A1-2"), None);
        assert_eq!(split_counter("Nodes"), None);
        assert_eq!(split_counter("42"), None);
    }

    #[test]
    fn test_spreadsheet_grouping() {
        let decls = vec![
            ArrayDeclaration::new("Col0", vec![5]),
            ArrayDeclaration::new("Col2", vec![5]),
            ArrayDeclaration::new("Labels", vec![5]),
        ];
        let out = FilterRegistry::default().apply(Some(SPREADSHEET), &decls);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].name, "Sheet1");
        assert!(out[0].collection);
        assert_eq!(out[0].dimension, vec![3]);
        assert_eq!(out[2].link.as_ref().map(|l| l.item_id), Some(2));
        assert!(out[3].link.is_none());
    }

    #[test]
    fn test_single_column_untouched() {
        let decls = vec![ArrayDeclaration::new("Col0", vec![5]), ArrayDeclaration::new("Nodes", vec![5])];
        assert_eq!(spreadsheet_columns(&decls), decls);
    }

    #[test]
    fn test_registry() {
        let mut registry = FilterRegistry::empty();
        let decls = vec![ArrayDeclaration::new("Col0", vec![1]), ArrayDeclaration::new("Col1", vec![1])];
        assert_eq!(registry.apply(Some(SPREADSHEET), &decls), decls);
        assert!(registry.register(SPREADSHEET, spreadsheet_columns).is_none());
        assert_eq!(registry.apply(Some(SPREADSHEET), &decls).len(), 3);
        assert!(registry.unregister(SPREADSHEET).is_some());
        assert_eq!(registry.apply(None, &decls), decls);
    }
}
