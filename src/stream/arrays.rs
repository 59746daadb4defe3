//! Array arena.
//!
//! Arrays and group items live in one flat vector and refer to each other by
//! [`ArrayId`]. A stream descriptor holds the id of its owning array, never a
//! pointer, so there is no ownership cycle between arrays and their streams.

use std::collections::{BTreeMap, HashMap};

use crate::scan::InlineValue;
use crate::util::{Error, Result, Shape};

/// Index of an array inside its [`ArrayArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(usize);

impl ArrayId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One declared array, group collection or group item.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayNode {
    pub name: String,
    /// Declared length; `None` for items and inline-only arrays
    pub length: Option<Shape>,
    /// Owning collection for group items
    pub parent: Option<ArrayId>,
    /// 1-based position inside the parent collection
    pub item_id: Option<usize>,
    /// Ordered collection (`Patches`, spreadsheet `Sheet1`)
    pub collection: bool,
    /// Values carried on label lines (`InnerRegion Inside`)
    pub attributes: BTreeMap<String, InlineValue>,
    children: Vec<ArrayId>,
}

impl ArrayNode {
    fn new(name: &str, length: Option<Shape>) -> Self {
        Self {
            name: name.to_string(),
            length,
            parent: None,
            item_id: None,
            collection: false,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Item arrays linked to this collection, in item order.
    pub fn children(&self) -> &[ArrayId] {
        &self.children
    }

    /// Shape streams of this array are laid out over.
    pub fn outer_shape(&self) -> Shape {
        self.length.clone().unwrap_or_else(Shape::scalar)
    }
}

/// Flat storage of every array of one file.
#[derive(Clone, Debug, Default)]
pub struct ArrayArena {
    nodes: Vec<ArrayNode>,
    by_name: HashMap<String, ArrayId>,
    root: BTreeMap<String, InlineValue>,
}

impl ArrayArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new array. Names are unique.
    pub fn insert(&mut self, name: &str, length: Option<Shape>) -> Result<ArrayId> {
        if self.by_name.contains_key(name) {
            return Err(Error::corrupt(format!("array '{}' declared twice", name)));
        }
        let id = ArrayId(self.nodes.len());
        self.nodes.push(ArrayNode::new(name, length));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Existing array by name, or a new one with `length`.
    pub fn get_or_insert(&mut self, name: &str, length: Option<Shape>) -> ArrayId {
        match self.by_name.get(name) {
            Some(&id) => {
                let node = &mut self.nodes[id.0];
                if node.length.is_none() {
                    node.length = length;
                }
                id
            }
            None => {
                let id = ArrayId(self.nodes.len());
                self.nodes.push(ArrayNode::new(name, length));
                self.by_name.insert(name.to_string(), id);
                id
            }
        }
    }

    /// Mark `id` as an ordered collection.
    pub fn mark_collection(&mut self, id: ArrayId) {
        self.nodes[id.0].collection = true;
    }

    /// Link `child` as item `item_id` of `parent`.
    pub fn link(&mut self, child: ArrayId, parent: ArrayId, item_id: usize) -> Result<()> {
        if child == parent {
            return Err(Error::corrupt(format!("array '{}' linked to itself", self.nodes[child.0].name)));
        }
        let node = &mut self.nodes[child.0];
        node.parent = Some(parent);
        node.item_id = Some(item_id);
        let mut siblings = std::mem::take(&mut self.nodes[parent.0].children);
        siblings.push(child);
        siblings.sort_by_key(|c| self.nodes[c.0].item_id);
        self.nodes[parent.0].children = siblings;
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: ArrayId) -> Option<&ArrayNode> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, name: &str) -> Option<ArrayId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArrayId, &ArrayNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ArrayId(i), n))
    }

    /// Values attached to the file rather than to an array.
    pub fn root_attributes(&self) -> &BTreeMap<String, InlineValue> {
        &self.root
    }

    /// Attach an inline value to `owner`, or to the root for `None`.
    pub fn set_attribute(&mut self, owner: Option<ArrayId>, key: &str, value: InlineValue) {
        let map = match owner {
            Some(id) => &mut self.nodes[id.0].attributes,
            None => &mut self.root,
        };
        map.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut arena = ArrayArena::new();
        arena.insert("Nodes", Some(Shape::d1(8))).unwrap();
        assert!(matches!(arena.insert("Nodes", None), Err(Error::StructuralCorruption(_))));
        let id = arena.get_or_insert("Nodes", None);
        assert_eq!(arena.get(id).unwrap().outer_shape(), Shape::d1(8));
    }

    #[test]
    fn test_items_link_by_index() {
        let mut arena = ArrayArena::new();
        let patches = arena.insert("Patches", Some(Shape::d1(2))).unwrap();
        arena.mark_collection(patches);
        let p2 = arena.insert("Patch2", None).unwrap();
        let p1 = arena.insert("Patch1", None).unwrap();
        arena.link(p2, patches, 2).unwrap();
        arena.link(p1, patches, 1).unwrap();

        let node = arena.get(patches).unwrap();
        assert!(node.collection);
        assert_eq!(node.children(), &[p1, p2]);
        assert_eq!(arena.get(p1).unwrap().parent, Some(patches));
        assert!(arena.get(p1).unwrap().outer_shape().is_scalar());
    }

    #[test]
    fn test_attributes() {
        let mut arena = ArrayArena::new();
        let p = arena.insert("Patch1", None).unwrap();
        arena.set_attribute(Some(p), "InnerRegion", InlineValue::Text("Inside".into()));
        arena.set_attribute(None, "NBranchingPoints", InlineValue::Count(0));
        assert_eq!(
            arena.get(p).unwrap().attributes.get("InnerRegion"),
            Some(&InlineValue::Text("Inside".into()))
        );
        assert_eq!(arena.root_attributes().get("NBranchingPoints"), Some(&InlineValue::Count(0)));
    }
}
