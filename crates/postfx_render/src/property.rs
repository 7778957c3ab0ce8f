//! Shader property identifiers
//!
//! Uniform and global-texture names are resolved to numeric ids once, into
//! read-only tables built on first use. After that, lookups never allocate
//! and need no synchronization.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::id::fnv1a;

/// Name of the filter-buffer global texture
pub const FILTER_TEXTURE: &str = "_FilterTexture";
/// Name of the view-space normals global texture
pub const NORMALS_TEXTURE: &str = "_NormalsTexture";

/// Names every core pass may publish or sample
const CORE_PROPERTIES: &[&str] = &[FILTER_TEXTURE, NORMALS_TEXTURE, "_BlitTexture", "_BlitScaleBias"];

lazy_static! {
    static ref CORE_TABLE: PropertyTable = PropertyTable::new(CORE_PROPERTIES);
}

/// Numeric id of a shader-visible property
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u32);

impl PropertyId {
    /// Resolve a property name.
    ///
    /// Names in the core table are answered from the table; any other name
    /// hashes to the same id it would have had in a table.
    pub fn of(name: &str) -> Self {
        CORE_TABLE.get(name).unwrap_or_else(|| Self::hash(name))
    }

    fn hash(name: &str) -> Self {
        let h = fnv1a(name);
        Self((h ^ (h >> 32)) as u32)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({:#010x})", self.0)
    }
}

/// Immutable name → id lookup table
#[derive(Debug, Clone)]
pub struct PropertyTable {
    ids: HashMap<&'static str, PropertyId>,
}

impl PropertyTable {
    /// Build a table for a fixed set of names
    pub fn new(names: &[&'static str]) -> Self {
        let ids = names.iter().map(|&name| (name, PropertyId::hash(name))).collect();
        Self { ids }
    }

    /// Look up a name
    pub fn get(&self, name: &str) -> Option<PropertyId> {
        self.ids.get(name).copied()
    }

    /// Look up a name known to be in the table, resolving it if it is not
    pub fn id(&self, name: &str) -> PropertyId {
        self.get(name).unwrap_or_else(|| PropertyId::hash(name))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
