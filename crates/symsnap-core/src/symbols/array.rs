//! Array layout and index expansion.
//!
//! A declared array is reported in one of three shapes:
//!
//! - **Single**: no dimensions, or the lone dimension `[1]`; the variable is
//!   one leaf, exactly as if it were not an array
//! - **String**: a one-dimensional array of bytes; one leaf named `name[]`
//!   instead of one leaf per character
//! - **Grid**: everything else; one leaf per index tuple in row-major order
//!
//! Before choosing, byte arrays with two or more dimensions have their last
//! dimension folded into the element size. `char names[4][12]` therefore
//! becomes four 12-byte leaves `names[0]` .. `names[3]`.

use std::fmt::Write;

use super::resolver::Dims;
use crate::types::Member;

/// Mixed-radix counter over a dimension list
///
/// The last index moves fastest. [`IndexCounter::increment`] reports a
/// roll-over once every combination has been visited.
///
/// ```rust
/// use symsnap_core::symbols::IndexCounter;
///
/// let mut counter = IndexCounter::new(&[2, 11]);
/// assert_eq!(counter.suffix(), "[0][00]");
/// assert!(!counter.increment());
/// assert_eq!(counter.suffix(), "[0][01]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCounter
{
    dims: Dims,
    index: Dims,
}

impl IndexCounter
{
    pub fn new(dims: &[u64]) -> Self
    {
        Self {
            dims: dims.iter().copied().collect(),
            index: dims.iter().map(|_| 0).collect(),
        }
    }

    /// Advance to the next index tuple; `true` when the counter wrapped to all
    /// zeroes
    pub fn increment(&mut self) -> bool
    {
        for (index, &dim) in self.index.iter_mut().zip(self.dims.iter()).rev() {
            *index += 1;
            if *index < dim {
                return false;
            }
            *index = 0;
        }
        true
    }

    /// Row-major position of the current tuple
    pub fn linear(&self) -> u64
    {
        self.index
            .iter()
            .zip(self.dims.iter())
            .fold(0, |acc, (&index, &dim)| acc * dim + index)
    }

    /// Bracketed indices, each zero-padded to the width of `dim - 1`
    pub fn suffix(&self) -> String
    {
        let mut out = String::new();
        for (&index, &dim) in self.index.iter().zip(self.dims.iter()) {
            let width = digits(dim.saturating_sub(1));
            let _ = write!(out, "[{index:0width$}]");
        }
        out
    }
}

fn digits(value: u64) -> usize
{
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}

/// How an array-typed storage location is split into leaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLayout
{
    Single
    {
        size: u64,
    },
    String
    {
        size: u64,
    },
    Grid
    {
        dims: Dims,
        elem_size: u64,
    },
}

impl ArrayLayout
{
    /// Apply the string heuristic and the expansion policy
    ///
    /// Returns `None` when the bounds describe more bytes than fit in a
    /// `u64`, which only corrupt debug information does.
    pub fn from_dimensions(mut dims: Dims, mut elem_size: u64) -> Option<Self>
    {
        let mut folded = false;
        if elem_size == 1 && dims.len() >= 2 {
            if let Some(last) = dims.pop() {
                elem_size = last;
                folded = true;
            }
        }

        let layout = match dims.as_slice() {
            [] => ArrayLayout::Single { size: elem_size },
            [1] if !folded => ArrayLayout::Single { size: elem_size },
            [dim] if elem_size == 1 || (folded && *dim == 1) => ArrayLayout::String {
                size: dim.checked_mul(elem_size)?,
            },
            _ => ArrayLayout::Grid { dims, elem_size },
        };
        layout.total_size().map(|_| layout)
    }

    /// Bytes covered by the whole array, `None` on overflow
    pub fn total_size(&self) -> Option<u64>
    {
        match self {
            ArrayLayout::Single { size } | ArrayLayout::String { size } => Some(*size),
            ArrayLayout::Grid { dims, elem_size } => dims
                .iter()
                .try_fold(*elem_size, |total, &dim| total.checked_mul(dim)),
        }
    }

    /// The leaves of this layout, named after `name` and placed from `base`
    ///
    /// `None` when the array would reach past the end of the address range.
    pub fn members(&self, name: &str, base: u64) -> Option<Vec<Member>>
    {
        // Every leaf ends at or before `base + total`, so the offsets below
        // cannot overflow once this sum is known to fit.
        base.checked_add(self.total_size()?)?;
        let leaves = match self {
            ArrayLayout::Single { size } => vec![Member::new(name, base, *size)],
            ArrayLayout::String { size } => vec![Member::new(format!("{name}[]"), base, *size)],
            ArrayLayout::Grid { dims, elem_size } => {
                let mut counter = IndexCounter::new(dims);
                let mut leaves = Vec::new();
                loop {
                    let off = base + counter.linear() * elem_size;
                    leaves.push(Member::new(format!("{name}{}", counter.suffix()), off, *elem_size));
                    if counter.increment() {
                        break;
                    }
                }
                leaves
            }
        };
        Some(leaves)
    }
}

#[cfg(test)]
mod tests
{
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn test_counter_rolls_over()
    {
        let mut counter = IndexCounter::new(&[2, 2]);
        let mut seen = vec![(counter.suffix(), counter.linear())];
        while !counter.increment() {
            seen.push((counter.suffix(), counter.linear()));
        }
        let expected = [("[0][0]", 0), ("[0][1]", 1), ("[1][0]", 2), ("[1][1]", 3)];
        let expected: Vec<(String, u64)> = expected.iter().map(|(s, i)| ((*s).to_string(), *i)).collect();
        assert_eq!(seen, expected);
        assert_eq!(counter.suffix(), "[0][0]");
    }

    #[test]
    fn test_suffix_padding_width()
    {
        let mut counter = IndexCounter::new(&[10, 11, 1]);
        assert_eq!(counter.suffix(), "[0][00][0]");
        for _ in 0..12 {
            counter.increment();
        }
        assert_eq!(counter.suffix(), "[1][01][0]");
    }

    #[test]
    fn test_single_dimension_of_one_is_plain()
    {
        assert_eq!(ArrayLayout::from_dimensions(smallvec![1], 4), Some(ArrayLayout::Single { size: 4 }));
        assert_eq!(ArrayLayout::from_dimensions(Dims::new(), 4), Some(ArrayLayout::Single { size: 4 }));
        assert_eq!(ArrayLayout::from_dimensions(smallvec![1], 1), Some(ArrayLayout::Single { size: 1 }));
    }

    #[test]
    fn test_byte_array_is_string()
    {
        let layout = ArrayLayout::from_dimensions(smallvec![16], 1).unwrap();
        assert_eq!(layout, ArrayLayout::String { size: 16 });
        assert_eq!(layout.members("banner", 0x20).unwrap(), vec![Member::new("banner[]", 0x20, 16)]);
    }

    #[test]
    fn test_folded_single_row_is_string()
    {
        let layout = ArrayLayout::from_dimensions(smallvec![1, 12], 1).unwrap();
        assert_eq!(layout.members("label", 0).unwrap(), vec![Member::new("label[]", 0, 12)]);
    }

    #[test]
    fn test_folded_rows_expand_per_row()
    {
        let layout = ArrayLayout::from_dimensions(smallvec![3, 8], 1).unwrap();
        let names: Vec<_> = layout.members("menu", 0).unwrap().into_iter().map(|m| (m.name, m.off, m.size)).collect();
        assert_eq!(
            names,
            vec![
                ("menu[0]".to_string(), 0, 8),
                ("menu[1]".to_string(), 8, 8),
                ("menu[2]".to_string(), 16, 8)
            ]
        );
    }

    #[test]
    fn test_grid_row_major_order()
    {
        let layout = ArrayLayout::from_dimensions(smallvec![2, 3], 4).unwrap();
        assert_eq!(layout.total_size(), Some(24));
        let leaves = layout.members("m", 0).unwrap();
        let names: Vec<_> = leaves.iter().map(|m| m.name.as_str()).collect();
        let offsets: Vec<_> = leaves.iter().map(|m| m.off).collect();
        assert_eq!(names, ["m[0][0]", "m[0][1]", "m[0][2]", "m[1][0]", "m[1][1]", "m[1][2]"]);
        assert_eq!(offsets, [0, 4, 8, 12, 16, 20]);
        assert!(leaves.iter().all(|m| m.size == 4));
    }

    #[test]
    fn test_word_array_is_grid()
    {
        let layout = ArrayLayout::from_dimensions(smallvec![11], 2).unwrap();
        let leaves = layout.members("adc", 0x100).unwrap();
        assert_eq!(leaves.len(), 11);
        assert_eq!(leaves[0].name, "adc[00]");
        assert_eq!(leaves[10], Member::new("adc[10]", 0x114, 2));
    }

    #[test]
    fn test_oversized_bounds_are_rejected()
    {
        assert_eq!(ArrayLayout::from_dimensions(smallvec![u64::MAX, 2], 4), None);
        assert_eq!(ArrayLayout::from_dimensions(smallvec![u64::MAX / 2, 3], 1), None);
        assert_eq!(ArrayLayout::from_dimensions(smallvec![u64::MAX], 2), None);

        let layout = ArrayLayout::from_dimensions(smallvec![4], 2).unwrap();
        assert_eq!(layout.members("tail", u64::MAX - 4), None);
        assert_eq!(layout.members("tail", u64::MAX - 8).map(|leaves| leaves.len()), Some(4));
    }
}
