//! Handle identifiers
//!
//! Backends hand out [`Id`]s for the textures and materials they create. An
//! id packs a slot index with a generation so a host that recycles slots can
//! tell a stale handle from a live one.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Slot index plus generation, packed into 64 bits
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    /// Lower 32 bits: index, upper 32 bits: generation
    bits: u64,
}

impl Id {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            bits: (generation as u64) << 32 | index as u64,
        }
    }

    /// The id no backend ever returns
    #[inline]
    pub const fn null() -> Self {
        Self { bits: u64::MAX }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.bits == u64::MAX
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.bits as u32
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        (self.bits >> 32) as u32
    }

    /// Same slot, next generation
    pub const fn next_generation(&self) -> Self {
        Self::new(self.index(), self.generation().wrapping_add(1))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Id(null)")
        } else {
            write!(f, "Id({}v{})", self.index(), self.generation())
        }
    }
}

/// FNV-1a over the UTF-8 bytes of `name`
pub(crate) fn fnv1a(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Hands out fresh slot indices at generation zero
pub struct IdGenerator {
    next: AtomicU32,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    pub fn next(&self) -> Id {
        Id::new(self.next.fetch_add(1, Ordering::Relaxed), 0)
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_generation_pack() {
        let id = Id::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert!(!id.is_null());
        assert!(Id::null().is_null());
    }

    #[test]
    fn test_next_generation_keeps_slot() {
        let id = Id::new(3, 0);
        let reused = id.next_generation();
        assert_eq!(reused.index(), 3);
        assert_ne!(reused, id);
    }

    #[test]
    fn test_generator_is_sequential() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next().index(), 0);
        assert_eq!(ids.next().index(), 1);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(fnv1a("_BlurTexture"), fnv1a("_FilterTexture"));
    }
}
