//! Time-indexed dataset
//!
//! A dataset is a set of named counter columns sharing one regular time grid.
//! Grid point `i` sits at `start + i * frequency`; all columns have exactly
//! `len` cells. A cell counts how often that point was observed (own data) or
//! delivered (received data), so merging two datasets simply adds cells after
//! both grids were widened to their union.

use crate::rp_interface::{ColumnName, Count, Frequency, TimeRange, Timestamp};
use indexmap::IndexMap;
use std::ops::Add;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// Merge between datasets sampled at different steps
    #[error("frequencies do not match: self - {left}, other - {right}")]
    FrequencyMismatch { left: Frequency, right: Frequency },

    /// Same step, but the grids are shifted by a fraction of it
    #[error("grids starting at {left} and {right} are not aligned to a common {frequency} grid")]
    MisalignedGrid {
        left: Timestamp,
        right: Timestamp,
        frequency: Frequency,
    },
}

#[derive(Debug, Clone)]
pub struct Dataset {
    frequency: Frequency,
    /// First grid point. With `len == 0` it only anchors the grid phase.
    start: Timestamp,
    len: usize,
    columns: IndexMap<ColumnName, Vec<Count>>,
}

impl Dataset {
    /// Empty dataset (no grid points, no columns) anchored at `start`
    pub fn new(frequency: Frequency, start: Timestamp) -> Self {
        Self {
            frequency,
            start,
            len: 0,
            columns: IndexMap::new(),
        }
    }

    /// Zero-filled columns covering every grid point of `range`
    pub fn zeros<S: AsRef<str>>(frequency: Frequency, range: TimeRange, columns: &[S]) -> Self {
        let mut dataset = Self::new(frequency, range.start);
        dataset.unfill(range, columns);
        dataset
    }

    /// Columns observed once at every grid point of `range`
    pub fn observed<S: AsRef<str>>(frequency: Frequency, range: TimeRange, columns: &[S]) -> Self {
        let mut dataset = Self::new(frequency, range.start);
        dataset.fill(range, columns);
        dataset
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// First grid point, or the grid anchor when there are no grid points
    pub fn anchor(&self) -> Timestamp {
        self.start
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when there is no defined cell at all
    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.columns.is_empty()
    }

    pub fn earliest(&self) -> Option<Timestamp> {
        (!self.is_empty()).then_some(self.start)
    }

    pub fn latest(&self) -> Option<Timestamp> {
        (!self.is_empty()).then(|| self.timestamp_at(self.len as i64 - 1))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Count]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        (0..self.len as i64).map(move |i| self.timestamp_at(i))
    }

    /// Cell value, 0 for unknown columns and off-grid timestamps
    pub fn value_at(&self, column: &str, at: Timestamp) -> Count {
        let (index, aligned) = self.frequency.steps_between(self.start, at);
        if !aligned || index < 0 || index as usize >= self.len {
            return 0;
        }
        self.columns
            .get(column)
            .map_or(0, |cells| cells[index as usize])
    }

    /// Number of grid points where `column` is nonzero
    pub fn nonzero_count(&self, column: &str) -> usize {
        self.columns
            .get(column)
            .map_or(0, |cells| cells.iter().filter(|&&c| c > 0).count())
    }

    /// Whether `at` lies on this dataset's grid. A dataset without grid
    /// points is judged by its anchor, where its first point will land.
    pub fn is_aligned_with(&self, at: Timestamp) -> bool {
        self.frequency.steps_between(self.start, at).1
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Count>> {
        self.columns.shift_remove(name)
    }

    // ========================================================================
    // Grid manipulation
    // ========================================================================

    /// Widen the grid so it holds every grid-aligned point of `range`.
    /// New cells are zero; existing cells are never dropped.
    pub fn extend(&mut self, range: TimeRange) {
        let Some((lo, hi)) = self.index_bounds(&range) else {
            return;
        };

        if self.len == 0 {
            self.start = self.timestamp_at(lo);
            self.len = (hi - lo + 1) as usize;
            for cells in self.columns.values_mut() {
                *cells = vec![0; self.len];
            }
            return;
        }

        let before = (-lo).max(0) as usize;
        let after = (hi + 1 - self.len as i64).max(0) as usize;
        self.grow(before, after);
    }

    /// Add one observation to `columns` at every grid point in `range`,
    /// extending the grid and creating columns as needed.
    pub fn fill<S: AsRef<str>>(&mut self, range: TimeRange, columns: &[S]) {
        self.update(range, columns, |cell| *cell = cell.saturating_add(1));
    }

    /// Reset `columns` to zero over `range` (grid is still extended).
    pub fn unfill<S: AsRef<str>>(&mut self, range: TimeRange, columns: &[S]) {
        self.update(range, columns, |cell| *cell = 0);
    }

    /// One more period elapsed: append the next grid point and observe every
    /// column there.
    pub fn add_observation(&mut self) {
        let next = self.timestamp_at(self.len as i64);
        let names: Vec<ColumnName> = self.columns.keys().cloned().collect();
        self.fill(TimeRange::point(next), &names);
    }

    // ========================================================================
    // Merge and slicing
    // ========================================================================

    /// Union both grids and add the cells. Commutative; a dataset without
    /// grid points is the identity.
    pub fn merge(&self, other: &Dataset) -> Result<Dataset, DatasetError> {
        if self.frequency != other.frequency {
            return Err(DatasetError::FrequencyMismatch {
                left: self.frequency,
                right: other.frequency,
            });
        }

        if other.len == 0 {
            let mut merged = self.clone();
            for name in other.columns.keys() {
                merged.ensure_column(name);
            }
            return Ok(merged);
        }
        if self.len == 0 {
            return other.merge(self);
        }

        let (offset, aligned) = self.frequency.steps_between(self.start, other.start);
        if !aligned {
            return Err(DatasetError::MisalignedGrid {
                left: self.start,
                right: other.start,
                frequency: self.frequency,
            });
        }

        let mut merged = self.clone();
        merged.extend(TimeRange::closed(
            other.start,
            other.timestamp_at(other.len as i64 - 1),
        ));

        // extending may have moved our start backwards
        let base = (offset + merged.frequency.steps_between(merged.start, self.start).0) as usize;
        for (name, cells) in &other.columns {
            let target = merged.ensure_column(name);
            for (i, value) in cells.iter().enumerate() {
                target[base + i] = target[base + i].saturating_add(*value);
            }
        }

        Ok(merged)
    }

    /// Independent copy restricted to the grid points inside `range`
    pub fn slice(&self, range: &TimeRange) -> Dataset {
        let (lo, hi) = self.raw_bounds(range);
        let lo_clamped = lo.max(0);
        let hi_clamped = hi.min(self.len as i64 - 1);

        if hi_clamped < lo_clamped {
            let mut empty = Dataset::new(self.frequency, self.timestamp_at(lo_clamped));
            for name in self.columns.keys() {
                empty.ensure_column(name);
            }
            return empty;
        }

        let (from, to) = (lo_clamped as usize, hi_clamped as usize + 1);
        Dataset {
            frequency: self.frequency,
            start: self.timestamp_at(lo_clamped),
            len: to - from,
            columns: self
                .columns
                .iter()
                .map(|(name, cells)| (name.clone(), cells[from..to].to_vec()))
                .collect(),
        }
    }

    /// Independent copy holding only the requested columns that exist
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Dataset {
        let mut selected = Dataset::new(self.frequency, self.start);
        selected.len = self.len;
        for name in columns {
            if let Some(cells) = self.columns.get(name.as_ref()) {
                selected
                    .columns
                    .insert(name.as_ref().to_string(), cells.clone());
            }
        }
        selected
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn timestamp_at(&self, index: i64) -> Timestamp {
        self.start + chrono::Duration::milliseconds(index * self.frequency.as_millis())
    }

    /// First and last grid index touched by `range`, possibly outside the
    /// current grid. `hi < lo` means the range holds no grid point.
    fn raw_bounds(&self, range: &TimeRange) -> (i64, i64) {
        let (lo_floor, lo_aligned) = self.frequency.steps_between(self.start, range.start);
        let lo = if lo_aligned { lo_floor } else { lo_floor + 1 };

        let (mut hi, hi_aligned) = self.frequency.steps_between(self.start, range.end);
        if hi_aligned && !range.end_inclusive {
            hi -= 1;
        }
        (lo, hi)
    }

    fn index_bounds(&self, range: &TimeRange) -> Option<(i64, i64)> {
        let (lo, hi) = self.raw_bounds(range);
        (hi >= lo).then_some((lo, hi))
    }

    fn grow(&mut self, before: usize, after: usize) {
        if before == 0 && after == 0 {
            return;
        }
        self.start = self.timestamp_at(-(before as i64));
        self.len += before + after;
        for cells in self.columns.values_mut() {
            let mut widened = vec![0; before];
            widened.append(cells);
            widened.resize(widened.len() + after, 0);
            *cells = widened;
        }
    }

    fn ensure_column(&mut self, name: &str) -> &mut Vec<Count> {
        let len = self.len;
        self.columns
            .entry(name.to_string())
            .or_insert_with(|| vec![0; len])
    }

    fn update<S: AsRef<str>>(&mut self, range: TimeRange, columns: &[S], apply: impl Fn(&mut Count)) {
        self.extend(range);
        let Some((lo, hi)) = self.index_bounds(&range) else {
            for column in columns {
                self.ensure_column(column.as_ref());
            }
            return;
        };
        for column in columns {
            let cells = self.ensure_column(column.as_ref());
            for cell in &mut cells[lo as usize..=hi as usize] {
                apply(cell);
            }
        }
    }
}

impl PartialEq for Dataset {
    /// Cell-by-cell equality; column order and the anchor of a dataset
    /// without grid points are irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.frequency == other.frequency
            && self.len == other.len
            && (self.len == 0 || self.start == other.start)
            && self.columns == other.columns
    }
}

impl Eq for Dataset {}

impl Add<&Dataset> for &Dataset {
    type Output = Result<Dataset, DatasetError>;

    fn add(self, rhs: &Dataset) -> Self::Output {
        self.merge(rhs)
    }
}
