use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("step must be positive, got {0}")]
    NonPositiveStep(i64),
    #[error("range {0} contains no values")]
    Empty(SweepRange),
}

/// Half-open parameter sweep `[start, stop)` walked with a fixed positive step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepRange {
    pub start: i64,
    pub stop: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

impl SweepRange {
    pub const fn new(start: i64, stop: i64, step: i64) -> Self {
        Self { start, stop, step }
    }

    pub fn validate(&self) -> Result<(), RangeError> {
        if self.step <= 0 {
            return Err(RangeError::NonPositiveStep(self.step));
        }
        if self.start >= self.stop {
            return Err(RangeError::Empty(*self));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        if self.step <= 0 || self.start >= self.stop {
            return 0;
        }
        let span = i128::from(self.stop) - i128::from(self.start) - 1;
        usize::try_from(span / i128::from(self.step) + 1).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in ascending order. An invalid step yields nothing.
    pub fn values(&self) -> impl Iterator<Item = i64> + Clone + use<> {
        let (range, step) = if self.step > 0 {
            (self.start..self.stop, self.step as usize)
        } else {
            (0..0, 1)
        };
        range.step_by(step)
    }
}

impl fmt::Display for SweepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {})", self.start, self.stop, self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_follow_declared_step() {
        let range = SweepRange::new(1, 6, 2);
        assert_eq!(range.values().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn stop_is_exclusive() {
        let range = SweepRange::new(1, 100, 10);
        let values = range.values().collect::<Vec<_>>();
        assert_eq!(values.len(), range.len());
        assert_eq!(values.first(), Some(&1));
        assert_eq!(values.last(), Some(&91));
    }

    #[test]
    fn rejects_bad_ranges() {
        assert_eq!(
            SweepRange::new(1, 10, 0).validate(),
            Err(RangeError::NonPositiveStep(0))
        );
        assert!(matches!(
            SweepRange::new(5, 5, 1).validate(),
            Err(RangeError::Empty(_))
        ));
        assert!(SweepRange::new(3, 1, -1).is_empty());
        assert_eq!(SweepRange::new(3, 1, -1).values().count(), 0);
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let range = SweepRange::new(i64::MIN, i64::MAX, i64::MAX);
        assert_eq!(range.len(), 3);
        assert_eq!(SweepRange::new(i64::MIN, i64::MAX, 1).len(), usize::MAX);
    }

    #[test]
    fn values_can_be_walked_again() {
        let values = SweepRange::new(1, 4, 1).values();
        let pairs = itertools::iproduct!(values.clone(), values).count();
        assert_eq!(pairs, 9);
    }
}
