//! Symbol table records.

use std::fmt;

/// A resolved leaf symbol occupying a contiguous byte range
///
/// Entries are produced by the symbol enumerator after array and structure
/// flattening, so `name` may be compound (`config.gains[03]`). They are never
/// expanded further: an entry is a scalar, a pointer, an opaque composite, or
/// a fixed-length string.
///
/// ## Address Space
///
/// `loc` is an offset into the selected address space, not an ELF address.
/// For a classic AVR part the ELF places SRAM at `0x800000`; a variable at
/// `0x800100` therefore has `loc == 0x100`.
///
/// ## Example
///
/// ```rust
/// use symsnap_core::types::Entry;
///
/// let entry = Entry::new("uptime", 0x100, 4, "main.c:12");
/// assert_eq!(entry.end(), 0x104);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry
{
    /// Flattened symbol name
    pub name: String,
    /// Offset inside the address space
    pub loc: u64,
    /// Byte length, always at least 1
    pub size: u64,
    /// `file:line` of the declaration, empty when unknown
    pub declpos: String,
}

impl Entry
{
    pub fn new(name: impl Into<String>, loc: u64, size: u64, declpos: impl Into<String>) -> Self
    {
        Self {
            name: name.into(),
            loc,
            size,
            declpos: declpos.into(),
        }
    }

    /// First address after this entry
    pub fn end(&self) -> u64
    {
        self.loc.saturating_add(self.size)
    }

    /// Whether `[loc, end)` lies inside `[start, end)`
    pub fn is_within(&self, start: u64, end: u64) -> bool
    {
        self.loc >= start && self.end() <= end
    }
}

impl fmt::Display for Entry
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} @ 0x{:06x} ({} bytes)", self.name, self.loc, self.size)
    }
}

/// One field of a structure, relative to the structure start
///
/// Members are an intermediate record: the enumerator rebases them onto the
/// owning variable's address and turns them into [`Entry`] values named
/// `variable.member`. Array layouts reuse the same record for their leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member
{
    pub name: String,
    pub off: u64,
    pub size: u64,
}

impl Member
{
    /// Name given to synthetic members covering bytes no field describes.
    pub const UNKNOWN: &'static str = "*UNKNOWN*";

    pub fn new(name: impl Into<String>, off: u64, size: u64) -> Self
    {
        Self {
            name: name.into(),
            off,
            size,
        }
    }

    pub(crate) fn unknown(off: u64, size: u64) -> Self
    {
        Self::new(Self::UNKNOWN, off, size)
    }

    pub fn end(&self) -> u64
    {
        self.off.saturating_add(self.size)
    }
}
