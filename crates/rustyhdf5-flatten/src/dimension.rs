//! NetCDF-4 dimension representation.
//!
//! Unlimited dimensions report their *current* size, which is what a flat
//! copy has to reproduce before any data has been written to it.

/// A NetCDF-4 dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Name of this dimension.
    pub name: String,
    /// Current size of this dimension.
    pub size: u64,
    /// Whether this dimension is unlimited (extensible).
    pub is_unlimited: bool,
}

impl Dimension {
    /// A fixed-size dimension.
    pub fn fixed(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            is_unlimited: false,
        }
    }

    /// An unlimited dimension with the given current size.
    pub fn unlimited(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            is_unlimited: true,
        }
    }

    /// The size to request when creating a copy of this dimension:
    /// `None` marks it unlimited.
    pub fn creation_size(&self) -> Option<u64> {
        if self.is_unlimited {
            None
        } else {
            Some(self.size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_size_marks_unlimited() {
        assert_eq!(Dimension::fixed("x", 10).creation_size(), Some(10));
        assert_eq!(Dimension::unlimited("time", 4).creation_size(), None);
    }
}
