//! Array declarations and data definitions handed over by the header grammar.

use std::collections::{BTreeMap, HashSet};

use crate::core::Compression;
use crate::stream::{ArrayArena, StreamDescriptor};
use crate::util::{ElementType, Error, Result, Shape};

/// Array reference used by alias definitions (`Field { float f } Linear(@1)`).
pub const FIELD_ALIAS: &str = "Field";

/// Item link of a declaration belonging to an ordered collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayLink {
    pub parent: String,
    pub item_id: usize,
}

/// `define Nodes 10` / `nNodes 10` / `define Lattice 4 5 6`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayDeclaration {
    pub name: String,
    /// Declared sizes; empty for items without own length
    pub dimension: Vec<usize>,
    pub link: Option<ArrayLink>,
    pub collection: bool,
}

impl ArrayDeclaration {
    pub fn new(name: impl Into<String>, dimension: impl Into<Vec<usize>>) -> Self {
        Self { name: name.into(), dimension: dimension.into(), link: None, collection: false }
    }

    /// Ordered collection with `len` items.
    pub fn collection(name: impl Into<String>, len: usize) -> Self {
        Self { collection: true, ..Self::new(name, vec![len]) }
    }

    pub fn linked(mut self, parent: impl Into<String>, item_id: usize) -> Self {
        self.link = Some(ArrayLink { parent: parent.into(), item_id });
        self
    }

    pub fn shape(&self) -> Option<Shape> {
        (!self.dimension.is_empty()).then(|| Shape::from_slice(&self.dimension))
    }
}

/// `Nodes { float[3] Coordinates } @1(HxByteRLE,1234)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDefinition {
    /// Owning array, or [`FIELD_ALIAS`]
    pub array: String,
    pub name: String,
    pub type_tag: String,
    pub elem_count: usize,
    pub compression: Option<String>,
    pub index: Option<usize>,
    /// Encoded byte count declared after the compression tag
    pub encoded_len: Option<usize>,
    pub interpolation: Option<String>,
}

impl DataDefinition {
    pub fn new(
        array: impl Into<String>,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        elem_count: usize,
        index: usize,
    ) -> Self {
        Self {
            array: array.into(),
            name: name.into(),
            type_tag: type_tag.into(),
            elem_count,
            compression: None,
            index: Some(index),
            encoded_len: None,
            interpolation: None,
        }
    }

    /// Definition without an `@N` marker; it takes the next stream position.
    pub fn sequential(
        array: impl Into<String>,
        name: impl Into<String>,
        type_tag: impl Into<String>,
        elem_count: usize,
    ) -> Self {
        Self { index: None, ..Self::new(array, name, type_tag, elem_count, 0) }
    }

    pub fn compressed(mut self, tag: impl Into<String>, encoded_len: Option<usize>) -> Self {
        self.compression = Some(tag.into());
        self.encoded_len = encoded_len;
        self
    }

    pub fn interpolated(mut self, method: impl Into<String>) -> Self {
        self.interpolation = Some(method.into());
        self
    }

    pub fn is_alias(&self) -> bool {
        self.array == FIELD_ALIAS
    }
}

/// Build the array arena and stream descriptors from header records.
///
/// Alias definitions merge into the descriptor with the same index.
pub fn build_streams(
    declarations: &[ArrayDeclaration],
    definitions: &[DataDefinition],
) -> Result<(ArrayArena, Vec<StreamDescriptor>)> {
    let mut arena = ArrayArena::new();
    for decl in declarations {
        let id = arena.insert(&decl.name, decl.shape())?;
        if decl.collection {
            arena.mark_collection(id);
        }
    }
    for decl in declarations {
        if let Some(link) = &decl.link {
            let parent = arena
                .find(&link.parent)
                .ok_or_else(|| Error::corrupt(format!("'{}' linked to unknown array '{}'", decl.name, link.parent)))?;
            let child = arena.find(&decl.name).ok_or_else(|| Error::other("declaration vanished"))?;
            arena.link(child, parent, link.item_id)?;
        }
    }

    let mut streams: BTreeMap<usize, StreamDescriptor> = BTreeMap::new();
    let mut names: HashSet<(String, String)> = HashSet::new();

    // definitions without a marker take the slot after the highest index so far
    let mut highest = 0;
    let mut indexed: Vec<(usize, &DataDefinition)> = Vec::with_capacity(definitions.len());
    for def in definitions {
        let index = match def.index {
            Some(0) => {
                return Err(Error::corrupt(format!("'{} {}' uses reserved index @0", def.array, def.name)));
            }
            Some(i) => i,
            None => highest + 1,
        };
        highest = highest.max(index);
        indexed.push((index, def));
    }

    let (aliases, primaries): (Vec<_>, Vec<_>) = indexed.into_iter().partition(|(_, d)| d.is_alias());

    for (index, def) in primaries.into_iter().chain(aliases) {
        if def.elem_count == 0 {
            return Err(Error::corrupt(format!("'{} {}' declares zero elements", def.array, def.name)));
        }
        let elem_type = ElementType::from_tag(&def.type_tag)?;
        let compression = Compression::from_tag(def.compression.as_deref())?;

        if def.is_alias() {
            if let Some(existing) = streams.remove(&index) {
                if existing.elem_type() != elem_type || existing.elem_count() != def.elem_count {
                    return Err(Error::corrupt(format!(
                        "alias '{}' of @{} is {}[{}], stream is {}[{}]",
                        def.name,
                        index,
                        elem_type,
                        def.elem_count,
                        existing.elem_type(),
                        existing.elem_count()
                    )));
                }
                let merged = existing.with_alias(Some(def.name.clone()), def.interpolation.clone());
                streams.insert(index, merged);
                continue;
            }
        } else if streams.contains_key(&index) {
            return Err(Error::corrupt(format!("duplicate data descriptor @{}", index)));
        }

        if !names.insert((def.array.clone(), def.name.clone())) {
            return Err(Error::corrupt(format!("stream '{}' declared twice in '{}'", def.name, def.array)));
        }
        let array = match arena.find(&def.array) {
            Some(id) => id,
            None if def.is_alias() => arena.get_or_insert(FIELD_ALIAS, None),
            None => return Err(Error::corrupt(format!("'{}' refers to undeclared array", def.array))),
        };
        let outer_shape = arena.get(array).map(|n| n.outer_shape()).unwrap_or_else(Shape::scalar);

        let mut desc = StreamDescriptor::new(&def.name, array, &def.array, index, elem_type, def.elem_count, outer_shape)
            .with_compression(compression, def.encoded_len);
        desc.decoded_len()?;
        if def.is_alias() {
            desc = desc.with_alias(Some(def.name.clone()), def.interpolation.clone());
        } else if def.interpolation.is_some() {
            desc = desc.with_alias(None, def.interpolation.clone());
        }
        streams.insert(index, desc);
    }

    Ok((arena, streams.into_values().collect()))
}
