//! Demand accounting.
//!
//! A [`Demand`] is a subscriber's standing permission for how many more items
//! it will accept. Demand is additive: every `request` folds into the running
//! total rather than replacing it.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// How many more items a subscriber will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Demand {
    /// A finite, non-negative number of items
    Finite(usize),
    /// No upper bound
    Unbounded,
}

impl Demand {
    /// No demand at all.
    pub const NONE: Demand = Demand::Finite(0);

    /// Finite demand for `n` items.
    pub fn max(n: usize) -> Self {
        Demand::Finite(n)
    }

    /// Unbounded demand.
    pub fn unlimited() -> Self {
        Demand::Unbounded
    }

    /// Returns true if this demand permits no delivery.
    pub fn is_zero(&self) -> bool {
        matches!(self, Demand::Finite(0))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Demand::Unbounded)
    }

    /// The finite count, or `None` when unbounded.
    pub fn as_finite(&self) -> Option<usize> {
        match self {
            Demand::Finite(n) => Some(*n),
            Demand::Unbounded => None,
        }
    }

    /// Number of items that may be delivered right now out of `available`.
    ///
    /// Unbounded demand yields everything that is available.
    pub fn min_len(&self, available: usize) -> usize {
        match self {
            Demand::Finite(n) => (*n).min(available),
            Demand::Unbounded => available,
        }
    }

    /// Subtract `count` delivered items, or `None` if `count` exceeds a
    /// finite demand.
    pub fn checked_sub(self, count: usize) -> Option<Demand> {
        match self {
            Demand::Finite(n) => n.checked_sub(count).map(Demand::Finite),
            Demand::Unbounded => Some(Demand::Unbounded),
        }
    }
}

impl Default for Demand {
    fn default() -> Self {
        Demand::NONE
    }
}

impl From<usize> for Demand {
    fn from(n: usize) -> Self {
        Demand::Finite(n)
    }
}

impl Add for Demand {
    type Output = Demand;

    fn add(self, rhs: Demand) -> Demand {
        match (self, rhs) {
            (Demand::Finite(a), Demand::Finite(b)) => Demand::Finite(a.saturating_add(b)),
            _ => Demand::Unbounded,
        }
    }
}

impl Add<usize> for Demand {
    type Output = Demand;

    fn add(self, rhs: usize) -> Demand {
        self + Demand::Finite(rhs)
    }
}

impl AddAssign for Demand {
    fn add_assign(&mut self, rhs: Demand) {
        *self = *self + rhs;
    }
}

/// Removes delivered items from a demand.
///
/// # Panics
///
/// Panics if `rhs` exceeds a finite demand. Callers clamp with
/// [`Demand::min_len`] before subtracting.
impl Sub<usize> for Demand {
    type Output = Demand;

    fn sub(self, rhs: usize) -> Demand {
        match self.checked_sub(rhs) {
            Some(demand) => demand,
            None => panic!("demand underflow: cannot subtract {} from {}", rhs, self),
        }
    }
}

impl SubAssign<usize> for Demand {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demand::Finite(n) => write!(f, "{}", n),
            Demand::Unbounded => write!(f, "unlimited"),
        }
    }
}
