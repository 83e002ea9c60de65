use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Identifier of an operand inside a [`crate::ir::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperandIndex(pub u32);

impl OperandIndex {
    /// Sentinel stored in optional input slots that carry no operand.
    pub const UNDEFINED: OperandIndex = OperandIndex(u32::MAX);

    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperandIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            write!(f, "%undef")
        } else {
            write!(f, "%{}", self.0)
        }
    }
}

/// Identifier of an operation inside a [`crate::ir::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationIndex(pub u32);

impl OperationIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpSequenceIndex(pub u32);

/// Ordered operand list of an operation or a graph boundary.
pub type OperandIndexSequence = SmallVec<[OperandIndex; 4]>;

/// Iterates `indices` without the [`OperandIndex::UNDEFINED`] sentinel.
pub fn defined(indices: &[OperandIndex]) -> impl Iterator<Item = OperandIndex> + '_ {
    indices.iter().copied().filter(|index| !index.is_undefined())
}

/// Returns `indices` with repeated entries removed, keeping first occurrences.
pub fn deduplicated(indices: &[OperandIndex]) -> OperandIndexSequence {
    let mut unique = OperandIndexSequence::new();
    for index in indices {
        if !unique.contains(index) {
            unique.push(*index);
        }
    }
    unique
}
