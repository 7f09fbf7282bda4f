//! Hierarchical classification paths packed into one integer.
//!
//! Layout of the 64-bit word, most significant first:
//!
//! ```text
//!  63..43  42..35  34..27  26..19  18..11  10..3   2..0
//!  zero    lvl 0   lvl 1   lvl 2   lvl 3   lvl 4   depth
//! ```
//!
//! Unused levels are zero, so numeric order is lexicographic path order with
//! every prefix sorting before its extensions, and truncation is a mask.

use std::fmt;

use thiserror::Error;

/// Deepest classification path that can be packed.
pub const MAX_DEPTH: u8 = 5;

const DEPTH_BITS: u32 = 3;
const DEPTH_MASK: u64 = (1 << DEPTH_BITS) - 1;
const SLOT_BITS: u32 = 8;
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;
const USED_BITS: u32 = DEPTH_BITS + SLOT_BITS * MAX_DEPTH as u32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypePathError {
    #[error("type path depth {depth} exceeds the maximum of 5")]
    TooDeep { depth: usize },

    #[error("selector {value} at level {level} exceeds 255")]
    SelectorOutOfRange { level: usize, value: u32 },
}

#[inline(always)]
const fn slot_shift(level: u8) -> u32 {
    DEPTH_BITS + SLOT_BITS * (MAX_DEPTH - 1 - level) as u32
}

/// Fixed-width encoding of a walk from the classification root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PackedType(u64);

impl PackedType {
    /// The empty path.
    pub const ROOT: PackedType = PackedType(0);

    pub fn pack(path: &[u32]) -> Result<Self, TypePathError> {
        if path.len() > MAX_DEPTH as usize {
            return Err(TypePathError::TooDeep { depth: path.len() });
        }
        let mut t = Self::ROOT;
        for (level, &value) in path.iter().enumerate() {
            let v = u8::try_from(value)
                .map_err(|_| TypePathError::SelectorOutOfRange { level, value })?;
            t = t.push(v)?;
        }
        Ok(t)
    }

    pub fn from_selectors(path: &[u8]) -> Result<Self, TypePathError> {
        path.iter().try_fold(Self::ROOT, |t, &v| t.push(v))
    }

    /// Raw word as stored in memory-resident tables.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Accepts only words produced by this codec.
    pub fn from_raw(raw: u64) -> Option<Self> {
        let depth = (raw & DEPTH_MASK) as u8;
        if depth > MAX_DEPTH || raw >> USED_BITS != 0 {
            return None;
        }
        let t = PackedType(raw);
        (t.truncate(depth) == t).then_some(t)
    }

    #[inline]
    pub const fn depth(self) -> u8 {
        (self.0 & DEPTH_MASK) as u8
    }

    /// Selector at `level`, if the path is that deep.
    #[inline]
    pub fn unpack(self, level: u8) -> Option<u8> {
        (level < self.depth()).then(|| ((self.0 >> slot_shift(level)) & SLOT_MASK) as u8)
    }

    /// First `level` selectors. Identity when `level >= depth`.
    pub fn truncate(self, level: u8) -> Self {
        let depth = self.depth();
        if level >= depth {
            return self;
        }
        let mut v = self.0 & !DEPTH_MASK;
        for l in level..depth {
            v &= !(SLOT_MASK << slot_shift(l));
        }
        PackedType(v | level as u64)
    }

    pub fn push(self, v: u8) -> Result<Self, TypePathError> {
        let depth = self.depth();
        if depth >= MAX_DEPTH {
            return Err(TypePathError::TooDeep {
                depth: depth as usize + 1,
            });
        }
        let slots = (self.0 & !DEPTH_MASK) | ((v as u64) << slot_shift(depth));
        Ok(PackedType(slots | (depth + 1) as u64))
    }

    /// Drops the last selector. The root stays the root.
    #[inline]
    pub fn pop(self) -> Self {
        self.truncate(self.depth().saturating_sub(1))
    }

    /// Last selector, if any.
    #[inline]
    pub fn last(self) -> Option<u8> {
        self.depth().checked_sub(1).and_then(|l| self.unpack(l))
    }

    pub fn selectors(self) -> impl Iterator<Item = u8> {
        (0..self.depth()).filter_map(move |l| self.unpack(l))
    }

    #[inline]
    pub fn is_prefix_of(self, other: PackedType) -> bool {
        self.depth() <= other.depth() && other.truncate(self.depth()) == self
    }
}

impl fmt::Debug for PackedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedType{self}")
    }
}

impl fmt::Display for PackedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.selectors().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{s}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_selectors() {
        assert_eq!(PackedType::ROOT.depth(), 0);
        assert_eq!(PackedType::ROOT.unpack(0), None);
        assert_eq!(PackedType::ROOT.pop(), PackedType::ROOT);
        assert_eq!(PackedType::pack(&[]).unwrap(), PackedType::ROOT);
    }

    #[test]
    fn pack_rejects_deep_paths_and_wide_selectors() {
        assert_eq!(
            PackedType::pack(&[1, 2, 3, 4, 5, 6]),
            Err(TypePathError::TooDeep { depth: 6 })
        );
        assert_eq!(
            PackedType::pack(&[1, 256]),
            Err(TypePathError::SelectorOutOfRange {
                level: 1,
                value: 256
            })
        );
        let full = PackedType::pack(&[255, 255, 255, 255, 255]).unwrap();
        assert!(matches!(full.push(0), Err(TypePathError::TooDeep { .. })));
    }

    #[test]
    fn zero_selectors_are_distinct_from_shorter_paths() {
        let a = PackedType::pack(&[0]).unwrap();
        let b = PackedType::pack(&[0, 0]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, PackedType::ROOT);
        assert_eq!(b.truncate(1), a);
    }

    #[test]
    fn order_is_lexicographic() {
        let p = |s: &[u32]| PackedType::pack(s).unwrap();
        assert!(p(&[1]) < p(&[1, 0]));
        assert!(p(&[1, 0]) < p(&[1, 1]));
        assert!(p(&[1, 255, 3]) < p(&[2]));
        assert!(PackedType::ROOT < p(&[0]));
    }

    #[test]
    fn push_pop_are_inverse() {
        let t = PackedType::pack(&[3, 7]).unwrap();
        let pushed = t.push(9).unwrap();
        assert_eq!(pushed.last(), Some(9));
        assert_eq!(pushed.pop(), t);
        assert!(t.is_prefix_of(pushed));
        assert!(!pushed.is_prefix_of(t));
    }

    #[test]
    fn from_raw_rejects_foreign_words() {
        let t = PackedType::pack(&[4, 2]).unwrap();
        assert_eq!(PackedType::from_raw(t.raw()), Some(t));
        // depth 1 but a level-1 selector present
        assert_eq!(PackedType::from_raw(t.raw() & !DEPTH_MASK | 1), None);
        assert_eq!(PackedType::from_raw(7), None);
        assert_eq!(PackedType::from_raw(1 << 60), None);
    }

    #[test]
    fn displays_selector_path() {
        assert_eq!(PackedType::pack(&[1, 20]).unwrap().to_string(), "[1,20]");
    }
}
