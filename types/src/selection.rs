//! Selection identifiers and selection masks.
//!
//! A mesh carries at most [`MAX_SELECTIONS`] named vertex selections. Each one
//! is addressed by a [`SelectionId`] and a group of them by a [`SelectionSet`],
//! a fixed-capacity bitset where bit `i` set means selection `i` is a member.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard capacity of the selection registry. One bit per selection in a `u32`.
pub const MAX_SELECTIONS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("selection id {0} is out of range (max {max})", max = MAX_SELECTIONS - 1)]
pub struct InvalidSelectionId(pub u32);

/// Index of a selection, guaranteed to be in `0..MAX_SELECTIONS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SelectionId(u8);

impl SelectionId {
    pub const FIRST: SelectionId = SelectionId(0);
    pub const LAST: SelectionId = SelectionId((MAX_SELECTIONS - 1) as u8);

    pub fn new(index: u32) -> Result<Self, InvalidSelectionId> {
        if (index as usize) < MAX_SELECTIONS {
            Ok(Self(index as u8))
        } else {
            Err(InvalidSelectionId(index))
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0 as u32
    }

    /// The id directly below this one, or `None` for id 0.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl TryFrom<u32> for SelectionId {
    type Error = InvalidSelectionId;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SelectionId> for u32 {
    fn from(id: SelectionId) -> Self {
        id.value()
    }
}

impl fmt::Display for SelectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of selections packed into 32 bits.
///
/// The empty set is a valid "target nothing" value: commands addressed to it
/// are skipped rather than treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(u32);

impl SelectionSet {
    pub const EMPTY: SelectionSet = SelectionSet(0);
    pub const ALL: SelectionSet = SelectionSet(u32::MAX);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The set containing exactly `id`.
    #[must_use]
    pub const fn single(id: SelectionId) -> Self {
        Self(1 << id.0)
    }

    /// The set of the first `count` ids (`0..count`).
    #[must_use]
    pub fn first_n(count: usize) -> Self {
        match count {
            0 => Self::EMPTY,
            n if n >= MAX_SELECTIONS => Self::ALL,
            n => Self((1u32 << n) - 1),
        }
    }

    #[must_use]
    pub const fn contains(self, id: SelectionId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    pub fn insert(&mut self, id: SelectionId) {
        self.0 |= 1 << id.0;
    }

    pub fn remove(&mut self, id: SelectionId) {
        self.0 &= !(1 << id.0);
    }

    /// Flip membership of `id`, returning whether it is now a member.
    pub fn toggle(&mut self, id: SelectionId) -> bool {
        self.0 ^= 1 << id.0;
        self.contains(id)
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Member ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = SelectionId> {
        (0..MAX_SELECTIONS as u8)
            .map(SelectionId)
            .filter(move |id| self.contains(*id))
    }
}

impl BitOr for SelectionSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for SelectionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SelectionSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl BitAndAssign for SelectionSet {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl From<SelectionId> for SelectionSet {
    fn from(id: SelectionId) -> Self {
        Self::single(id)
    }
}

impl FromIterator<SelectionId> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = SelectionId>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}
