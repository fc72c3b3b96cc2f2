//! Walk-forward fold scheduling.
//!
//! Folds are positional: a fold's windows are row ranges over the time-ordered input,
//! not calendar durations. Each fold trains on `[offset, offset + train_size)` and tests on
//! the `test_size` rows immediately after, then the offset advances by `step_size`.
//!
//! ```text
//! fold 0: [---- train ----][ test ]
//! fold 1:        [---- train ----][ test ]
//! fold 2:               [---- train ----][ test ]
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};
use walkforward_core::config::validate_window_sizes;
use walkforward_core::{ConfigError, Timestamp};

/// One train/test window pair over row positions. Ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl Fold {
    #[must_use]
    pub fn train_range(&self) -> Range<usize> {
        self.train_start..self.train_end
    }

    #[must_use]
    pub fn test_range(&self) -> Range<usize> {
        self.test_start..self.test_end
    }

    #[must_use]
    pub fn train_len(&self) -> usize {
        self.train_end - self.train_start
    }

    #[must_use]
    pub fn test_len(&self) -> usize {
        self.test_end - self.test_start
    }

    /// True if the test window starts exactly where training ends.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.train_start < self.train_end
            && self.train_end == self.test_start
            && self.test_start < self.test_end
    }
}

/// Metadata recorded for each fold of a walk-forward run, keyed by timestamps.
///
/// `train_end` and `test_end` are the last timestamps inside each window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldRecord {
    pub fold: usize,
    pub train_start: Timestamp,
    pub train_end: Timestamp,
    pub test_start: Timestamp,
    pub test_end: Timestamp,
    pub train_size: usize,
    pub test_size: usize,
}

impl FoldRecord {
    /// Resolves a positional fold against an index.
    ///
    /// Returns `None` if the fold extends past `index`.
    #[must_use]
    pub fn from_fold(fold: &Fold, index: &[Timestamp]) -> Option<Self> {
        if fold.train_len() == 0 || fold.test_len() == 0 || fold.test_end > index.len() {
            return None;
        }
        Some(Self {
            fold: fold.index,
            train_start: index[fold.train_start],
            train_end: index[fold.train_end - 1],
            test_start: index[fold.test_start],
            test_end: index[fold.test_end - 1],
            train_size: fold.train_len(),
            test_size: fold.test_len(),
        })
    }
}

/// A validated fold schedule. Iterating recomputes folds from the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSchedule {
    n_periods: usize,
    train_size: usize,
    test_size: usize,
    step_size: usize,
}

impl FoldSchedule {
    /// Creates a schedule over `n_periods` rows.
    ///
    /// `step_size` of `None` or 0 falls back to `test_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if `train_size` or `test_size` is zero.
    pub fn new(
        n_periods: usize,
        train_size: usize,
        test_size: usize,
        step_size: Option<usize>,
    ) -> Result<Self, ConfigError> {
        validate_window_sizes(train_size, test_size)?;
        let step_size = match step_size {
            Some(step) if step > 0 => step,
            _ => test_size,
        };
        Ok(Self {
            n_periods,
            train_size,
            test_size,
            step_size,
        })
    }

    #[must_use]
    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// Lazily yields folds in index order.
    #[must_use]
    pub fn iter(&self) -> FoldIter {
        FoldIter {
            schedule: *self,
            offset: 0,
            next_index: 0,
        }
    }

    /// Number of folds the schedule yields.
    #[must_use]
    pub fn len(&self) -> usize {
        let window = self.train_size + self.test_size;
        if window > self.n_periods {
            0
        } else {
            (self.n_periods - window) / self.step_size + 1
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for &FoldSchedule {
    type Item = Fold;
    type IntoIter = FoldIter;

    fn into_iter(self) -> FoldIter {
        self.iter()
    }
}

/// Iterator over the folds of a [`FoldSchedule`].
#[derive(Debug, Clone)]
pub struct FoldIter {
    schedule: FoldSchedule,
    offset: usize,
    next_index: usize,
}

impl Iterator for FoldIter {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        let s = &self.schedule;
        let train_end = self.offset.checked_add(s.train_size)?;
        let test_end = train_end.checked_add(s.test_size)?;
        if test_end > s.n_periods {
            return None;
        }

        let fold = Fold {
            index: self.next_index,
            train_start: self.offset,
            train_end,
            test_start: train_end,
            test_end,
        };
        self.offset += s.step_size;
        self.next_index += 1;
        Some(fold)
    }
}

/// Generates all folds for the given parameters.
///
/// # Errors
///
/// Returns an error if `train_size` or `test_size` is zero.
pub fn generate_folds(
    n_periods: usize,
    train_size: usize,
    test_size: usize,
    step_size: Option<usize>,
) -> Result<Vec<Fold>, ConfigError> {
    Ok(FoldSchedule::new(n_periods, train_size, test_size, step_size)?
        .iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fold(index: usize, train: Range<usize>, test: Range<usize>) -> Fold {
        Fold {
            index,
            train_start: train.start,
            train_end: train.end,
            test_start: test.start,
            test_end: test.end,
        }
    }

    // ============================================================
    // Parameter validation
    // ============================================================

    #[test]
    fn zero_train_size_is_config_error() {
        let err = generate_folds(10, 0, 2, None).unwrap_err();
        assert!(err.to_string().contains("train_size"));
    }

    #[test]
    fn zero_test_size_is_config_error() {
        let err = generate_folds(10, 5, 0, None).unwrap_err();
        assert!(err.to_string().contains("test_size"));
    }

    #[test]
    fn missing_step_defaults_to_test_size() {
        let schedule = FoldSchedule::new(100, 10, 7, None).unwrap();
        assert_eq!(schedule.step_size(), 7);
    }

    #[test]
    fn zero_step_defaults_to_test_size() {
        let schedule = FoldSchedule::new(100, 10, 7, Some(0)).unwrap();
        assert_eq!(schedule.step_size(), 7);
    }

    // ============================================================
    // Fold generation
    // ============================================================

    #[test]
    fn ten_periods_train_five_test_two_step_two() {
        let folds = generate_folds(10, 5, 2, Some(2)).unwrap();
        assert_eq!(folds, vec![fold(0, 0..5, 5..7), fold(1, 2..7, 7..9)]);
    }

    #[test]
    fn exact_fit_yields_one_fold_covering_series() {
        let folds = generate_folds(12, 8, 4, Some(4)).unwrap();
        assert_eq!(folds.len(), 1);
        let only = folds[0];
        assert_eq!(only.train_start, 0);
        assert_eq!(only.test_end, 12);
        assert!(only.is_contiguous());
    }

    #[test]
    fn oversized_window_yields_no_folds() {
        let folds = generate_folds(10, 8, 3, None).unwrap();
        assert!(folds.is_empty());
    }

    #[test]
    fn default_step_gives_non_overlapping_test_windows() {
        let folds = generate_folds(100, 30, 10, None).unwrap();
        assert_eq!(folds.len(), 7);
        for pair in folds.windows(2) {
            assert_eq!(pair[0].test_end, pair[1].test_start);
        }
    }

    #[test]
    fn small_step_gives_overlapping_test_windows() {
        let folds = generate_folds(20, 10, 4, Some(2)).unwrap();
        assert!(folds.len() >= 2);
        assert!(folds[1].test_start < folds[0].test_end);
    }

    #[test]
    fn every_fold_is_contiguous_and_in_bounds() {
        for fold in generate_folds(57, 11, 5, Some(3)).unwrap() {
            assert!(fold.is_contiguous());
            assert!(fold.test_end <= 57);
            assert_eq!(fold.train_len(), 11);
            assert_eq!(fold.test_len(), 5);
        }
    }

    #[test]
    fn fold_indices_are_sequential() {
        let folds = generate_folds(50, 10, 5, None).unwrap();
        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.index, i);
        }
    }

    #[test]
    fn len_matches_iteration_count() {
        for (n, train, test, step) in [(10, 5, 2, 2), (10, 8, 3, 1), (100, 7, 3, 4), (9, 4, 5, 1)] {
            let schedule = FoldSchedule::new(n, train, test, Some(step)).unwrap();
            assert_eq!(schedule.len(), schedule.iter().count());
        }
    }

    #[test]
    fn schedule_is_restartable() {
        let schedule = FoldSchedule::new(30, 10, 5, None).unwrap();
        let first: Vec<Fold> = schedule.iter().collect();
        let second: Vec<Fold> = (&schedule).into_iter().collect();
        assert_eq!(first, second);
    }

    // ============================================================
    // FoldRecord
    // ============================================================

    #[test]
    fn fold_record_uses_last_timestamp_in_each_window() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let index: Vec<_> = (0..10).map(|i| base + Duration::hours(3 * i)).collect();
        let record = FoldRecord::from_fold(&fold(1, 2..7, 7..9), &index).unwrap();

        assert_eq!(record.fold, 1);
        assert_eq!(record.train_start, index[2]);
        assert_eq!(record.train_end, index[6]);
        assert_eq!(record.test_start, index[7]);
        assert_eq!(record.test_end, index[8]);
        assert_eq!(record.train_size, 5);
        assert_eq!(record.test_size, 2);
    }

    #[test]
    fn fold_record_none_when_fold_exceeds_index() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let index = vec![base];
        assert!(FoldRecord::from_fold(&fold(0, 0..5, 5..7), &index).is_none());
    }
}
