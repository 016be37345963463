//! Snapshot annotation.
//!
//! Lays the sorted symbol list over a memory snapshot and produces one line
//! per symbol with its raw bytes and their decoded value. Optionally reports
//! bytes no symbol covers (gaps) and symbols that start inside the previous
//! one (overlaps).

use std::fmt;
use std::io::Write;

use crate::error::SymsnapResult;
use crate::types::{Entry, Member};

/// Default width of the name column
pub const DEFAULT_NAME_WIDTH: usize = 50;

/// Knobs for [`annotate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateOptions
{
    /// Width of the name column
    pub width: usize,
    /// Emit a `*UNKNOWN*` line for bytes between symbols
    pub gaps: bool,
    /// Emit an `*OVERLAP*` line when a symbol starts inside the previous one
    pub overlaps: bool,
}

impl Default for AnnotateOptions
{
    fn default() -> Self
    {
        Self {
            width: DEFAULT_NAME_WIDTH,
            gaps: true,
            overlaps: false,
        }
    }
}

/// A floating point reading of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatValue
{
    Single(f32),
    Double(f64),
}

impl fmt::Display for FloatValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match *self {
            FloatValue::Single(value) => format_float(f, f64::from(value), &value),
            FloatValue::Double(value) => format_float(f, value, &value),
        }
    }
}

/// Plain notation for everyday magnitudes, scientific otherwise
fn format_float<T: fmt::Display + fmt::LowerExp>(f: &mut fmt::Formatter<'_>, magnitude: f64, value: &T) -> fmt::Result
{
    let abs = magnitude.abs();
    if abs.is_finite() && abs != 0.0 && !(1e-4..1e7).contains(&abs) {
        write!(f, "{value:e}")
    } else {
        write!(f, "{value}")
    }
}

/// Interpretations of a byte run
///
/// Runs of 1, 2 or 4 bytes read as a little-endian unsigned integer; runs
/// of 4 or 8 bytes also read as an IEEE-754 float.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedValue
{
    pub uint: Option<u64>,
    pub float: Option<FloatValue>,
}

impl DecodedValue
{
    pub fn decode(bytes: &[u8]) -> Self
    {
        let uint = match *bytes {
            [a] => Some(u64::from(a)),
            [a, b] => Some(u64::from(u16::from_le_bytes([a, b]))),
            [a, b, c, d] => Some(u64::from(u32::from_le_bytes([a, b, c, d]))),
            _ => None,
        };
        let float = match *bytes {
            [a, b, c, d] => Some(FloatValue::Single(f32::from_le_bytes([a, b, c, d]))),
            [a, b, c, d, e, g, h, i] => Some(FloatValue::Double(f64::from_le_bytes([a, b, c, d, e, g, h, i]))),
            _ => None,
        };
        Self { uint, float }
    }

    pub fn is_empty(&self) -> bool
    {
        self.uint.is_none() && self.float.is_none()
    }
}

impl fmt::Display for DecodedValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if let Some(uint) = self.uint {
            write!(f, "= {uint} (0x{uint:x})")?;
            if self.float.is_some() {
                f.write_str(" ")?;
            }
        }
        if let Some(float) = self.float {
            write!(f, "~ {float}")?;
        }
        Ok(())
    }
}

/// One line of the annotated listing
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotatedLine
{
    /// Bytes between the previous symbol and the next one
    Gap
    {
        addr: u64,
        bytes: Vec<u8>,
    },
    /// The next symbol starts `size` bytes before the previous one ended
    Overlap
    {
        addr: u64,
        size: u64,
    },
    Entry
    {
        addr: u64,
        name: String,
        bytes: Vec<u8>,
    },
}

impl AnnotatedLine
{
    /// Render the line with a name column of `width` characters
    pub fn render(&self, width: usize) -> String
    {
        match self {
            AnnotatedLine::Gap { addr, bytes } => render_bytes(*addr, Member::UNKNOWN, bytes, None, width),
            AnnotatedLine::Overlap { addr, size } => {
                format!("{addr:06x} *OVERLAP* {size:>5} bytes with previous entry")
            }
            AnnotatedLine::Entry { addr, name, bytes } => {
                render_bytes(*addr, name, bytes, Some(DecodedValue::decode(bytes)), width)
            }
        }
    }
}

/// Padding and unknown bytes carry no type, so gaps pass no `value`
fn render_bytes(addr: u64, name: &str, bytes: &[u8], value: Option<DecodedValue>, width: usize) -> String
{
    use std::fmt::Write as _;

    let mut line = format!("{addr:06x} {name:<width$} {:>5}", bytes.len());
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        let _ = write!(line, " {value}");
    }
    line.push_str(" :");
    for byte in bytes {
        let _ = write!(line, " {byte:02x}");
    }
    line
}

/// Annotate `data`, whose first byte lives at `base`, with `entries`
///
/// `entries` must be sorted by address. Entries that do not lie entirely
/// inside the buffer are skipped. No gap is reported after the last entry.
pub fn annotate(entries: &[Entry], base: u64, data: &[u8], options: &AnnotateOptions) -> Vec<AnnotatedLine>
{
    let limit = base + data.len() as u64;
    let slice = |start: u64, end: u64| {
        // Callers keep `base <= start <= end <= limit`.
        data[(start - base) as usize..(end - base) as usize].to_vec()
    };

    let mut lines = Vec::new();
    let mut last_end = base;
    for entry in entries.iter().filter(|entry| entry.is_within(base, limit)) {
        if options.gaps && last_end < entry.loc {
            lines.push(AnnotatedLine::Gap {
                addr: last_end,
                bytes: slice(last_end, entry.loc),
            });
        }
        if options.overlaps && last_end > entry.loc + 1 {
            lines.push(AnnotatedLine::Overlap {
                addr: entry.loc,
                size: last_end - entry.loc,
            });
        }
        lines.push(AnnotatedLine::Entry {
            addr: entry.loc,
            name: entry.name.clone(),
            bytes: slice(entry.loc, entry.end()),
        });
        last_end = entry.end();
    }
    lines
}

/// Write annotated lines, one per row
pub fn write_listing<W: Write>(out: &mut W, lines: &[AnnotatedLine], width: usize) -> SymsnapResult<()>
{
    for line in lines {
        writeln!(out, "{}", line.render(width))?;
    }
    Ok(())
}
