//! Hyperslab selection and bounded-slice iteration for data copies.
//!
//! A [`Selection`] describes which elements of a variable to read or write.
//! [`SliceIter`] walks a variable in fixed-shape slices so that copying a
//! variable never holds more than one slice in memory.
//!
//! # Example
//!
//! ```
//! use rustyhdf5_flatten::selection::{Selection, SliceIter};
//!
//! // Select rows 20..30, columns 40..60 from a 2D variable
//! let sel = Selection::slice(&[20..30, 40..60]);
//! assert_eq!(sel.num_elements(&[100, 100]), 200);
//!
//! // Walk a 5x4 variable in 2x3 slices
//! assert_eq!(SliceIter::new(&[5, 4], &[2, 3]).count(), 6);
//! ```

use std::ops::Range;

/// A selection describing which elements of a variable to access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Select all elements (equivalent to the entire variable).
    All,

    /// A contiguous hyperslab: `count[d]` elements starting at `start[d]`
    /// along each axis.
    Hyperslab { start: Vec<u64>, count: Vec<u64> },
}

impl Selection {
    /// Create a contiguous hyperslab from ranges (one per dimension).
    pub fn slice(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|r| r.start).collect();
        let count = ranges.iter().map(|r| r.end.saturating_sub(r.start)).collect();
        Selection::Hyperslab { start, count }
    }

    /// Number of selected elements for a given variable shape.
    pub fn num_elements(&self, dims: &[u64]) -> u64 {
        match self {
            Selection::All => dims.iter().product(),
            Selection::Hyperslab { count, .. } => count.iter().product(),
        }
    }

    /// The shape of the selected region.
    pub fn output_shape(&self, dims: &[u64]) -> Vec<u64> {
        match self {
            Selection::All => dims.to_vec(),
            Selection::Hyperslab { count, .. } => count.clone(),
        }
    }

    /// Explicit `(start, count)` for this selection over `dims`.
    pub fn bounds(&self, dims: &[u64]) -> (Vec<u64>, Vec<u64>) {
        match self {
            Selection::All => (vec![0; dims.len()], dims.to_vec()),
            Selection::Hyperslab { start, count } => (start.clone(), count.clone()),
        }
    }

    /// Whether the selection fits inside `dims`.
    pub fn fits(&self, dims: &[u64]) -> bool {
        match self {
            Selection::All => true,
            Selection::Hyperslab { start, count } => {
                start.len() == dims.len()
                    && count.len() == dims.len()
                    && start
                        .iter()
                        .zip(count)
                        .zip(dims)
                        .all(|((&s, &c), &d)| s + c <= d)
            }
        }
    }
}

/// Iterator over the hyperslabs that tile a variable in fixed-shape slices.
///
/// The position vector advances along the innermost axis first and carries
/// into the next outer axis on overflow; iteration ends once the outermost
/// axis is exhausted. Edge slices are clipped to the variable shape.
#[derive(Debug, Clone)]
pub struct SliceIter {
    shape: Vec<u64>,
    slice_shape: Vec<u64>,
    position: Vec<u64>,
    done: bool,
}

impl SliceIter {
    /// Create an iterator over `shape` in slices of `slice_shape`.
    ///
    /// Zero entries in `slice_shape` are treated as one; a missing entry
    /// (shorter `slice_shape`) covers the whole axis.
    pub fn new(shape: &[u64], slice_shape: &[u64]) -> Self {
        let slice_shape = shape
            .iter()
            .enumerate()
            .map(|(d, &n)| slice_shape.get(d).copied().unwrap_or(n).max(1))
            .collect();
        Self {
            shape: shape.to_vec(),
            slice_shape,
            position: vec![0; shape.len()],
            done: shape.contains(&0),
        }
    }
}

impl Iterator for SliceIter {
    type Item = Selection;

    fn next(&mut self) -> Option<Selection> {
        if self.done {
            return None;
        }

        let start = self.position.clone();
        let count = start
            .iter()
            .zip(&self.slice_shape)
            .zip(&self.shape)
            .map(|((&s, &step), &n)| step.min(n - s))
            .collect();

        // Advance: innermost axis first, carry outward.
        let mut axis = self.shape.len();
        loop {
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
            self.position[axis] += self.slice_shape[axis];
            if self.position[axis] < self.shape[axis] {
                break;
            }
            self.position[axis] = 0;
        }

        Some(Selection::Hyperslab { start, count })
    }
}

/// Derive a slice shape from a byte budget spread evenly across the rank.
///
/// Each axis gets `floor((budget / element_size) ^ (1 / rank))` elements,
/// clipped to the axis length and never below one.
pub fn default_slice_shape(shape: &[u64], element_size: usize, budget_bytes: u64) -> Vec<u64> {
    let rank = shape.len();
    if rank == 0 {
        return Vec::new();
    }
    let elements = (budget_bytes / element_size.max(1) as u64).max(1);
    let per_axis = integer_root(elements, rank as u32);
    shape.iter().map(|&n| per_axis.min(n).max(1)).collect()
}

/// Largest `r` with `r^k <= n`.
fn integer_root(n: u64, k: u32) -> u64 {
    let mut r = (n as f64).powf(1.0 / k as f64).floor() as u64;
    let pow = |b: u64| (b as u128).checked_pow(k).unwrap_or(u128::MAX);
    while r > 0 && pow(r) > n as u128 {
        r -= 1;
    }
    while let Some(next) = r.checked_add(1) {
        if pow(next) > n as u128 {
            break;
        }
        r = next;
    }
    r.max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
