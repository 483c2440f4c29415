use serde::{Deserialize, Serialize};
use std::fmt;

/// Path delay in picoseconds.
///
/// Delays only ever grow along a path, so every addition saturates at
/// [`Delay::MAX`] instead of wrapping. Missing or unreachable delays are
/// expressed as `Option<Delay>`, never as a reserved value.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Delay(pub u32);

impl Delay {
    pub const ZERO: Delay = Delay(0);
    pub const MAX: Delay = Delay(u32::MAX);

    #[inline(always)]
    pub fn new(ps: u32) -> Self {
        Self(ps)
    }

    #[inline(always)]
    pub fn ps(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn saturating_add(self, other: Delay) -> Delay {
        Delay(self.0.saturating_add(other.0))
    }

    #[inline(always)]
    pub fn saturating_sub(self, other: Delay) -> Delay {
        Delay(self.0.saturating_sub(other.0))
    }

    /// `self * factor`, saturating.
    #[inline(always)]
    pub fn saturating_mul(self, factor: u32) -> Delay {
        Delay(self.0.saturating_mul(factor))
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ps", self.0)
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates_at_max() {
        let d = Delay::new(u32::MAX - 1).saturating_add(Delay::new(10));
        assert_eq!(d, Delay::MAX);
    }

    #[test]
    fn add_never_shrinks() {
        let a = Delay::new(7);
        let b = Delay::new(u32::MAX);
        let sum = a.saturating_add(b);
        assert!(sum >= a && sum >= b);
    }

    #[test]
    fn mul_saturates() {
        assert_eq!(Delay::new(3).saturating_mul(4), Delay::new(12));
        assert_eq!(Delay::new(u32::MAX / 2).saturating_mul(3), Delay::MAX);
    }
}
