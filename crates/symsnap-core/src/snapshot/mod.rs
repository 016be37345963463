//! # Memory snapshots
//!
//! A snapshot is a capture of target memory, either as a raw binary dump
//! placed at a known base address or as an Intel HEX file that carries its
//! own addresses. Both are normalized into one contiguous byte buffer that
//! the annotator walks alongside the sorted symbol list.
//!
//! Captures taken through an AVR programmer usually carry ELF-style data
//! addresses (`0x800100`), while symbol entries are offsets into the data
//! space (`0x100`). [`Snapshot::rebase_into`] bridges the two.

pub mod ihex;

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{SymsnapError, SymsnapResult};
use crate::types::AddressWindow;

/// Largest buffer an Intel HEX file may span, holes included
pub const MAX_SNAPSHOT_SPAN: u64 = 16 * 1024 * 1024;

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat
{
    IntelHex,
    Binary,
}

impl SnapshotFormat
{
    /// Guess the format from a file extension; anything unknown is binary
    pub fn from_path(path: &Path) -> Self
    {
        match path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("hex" | "ihex" | "ihx") => SnapshotFormat::IntelHex,
            _ => SnapshotFormat::Binary,
        }
    }
}

/// Half-open range `[start, start + len)` actually present in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange
{
    pub start: u64,
    pub len: u64,
}

/// Captured memory as one buffer starting at `base`
///
/// `ranges` lists the address ranges the source actually covered; bytes of
/// the buffer outside them were never captured and read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot
{
    ranges: Vec<AddressRange>,
    base: u64,
    data: Vec<u8>,
}

impl Snapshot
{
    /// Raw dump whose first byte lives at `base`
    pub fn from_binary(base: u64, bytes: Vec<u8>) -> SymsnapResult<Self>
    {
        if bytes.is_empty() {
            return Err(SymsnapError::snapshot(0, "snapshot is empty"));
        }
        Ok(Self {
            ranges: vec![AddressRange {
                start: base,
                len: bytes.len() as u64,
            }],
            base,
            data: bytes,
        })
    }

    /// Decode Intel HEX text
    pub fn parse_ihex(text: &str) -> SymsnapResult<Self>
    {
        let segments = ihex::parse(text)?;
        let (Some(first), Some(end)) = (segments.first(), segments.iter().map(ihex::Segment::end).max()) else {
            return Err(SymsnapError::snapshot(0, "no data records"));
        };

        let base = first.start;
        let span = end - base;
        if span > MAX_SNAPSHOT_SPAN {
            return Err(SymsnapError::snapshot(
                0,
                format!("records span 0x{span:x} bytes, more than 0x{MAX_SNAPSHOT_SPAN:x}"),
            ));
        }
        if segments.len() > 1 {
            warn!(segments = segments.len(), "snapshot has holes, uncovered bytes read as zero");
        }

        // Segments are sorted and disjoint, so every offset lies below `span`.
        let mut data = vec![0u8; span as usize];
        let mut ranges = Vec::with_capacity(segments.len());
        for segment in &segments {
            let offset = (segment.start - base) as usize;
            data[offset..offset + segment.bytes.len()].copy_from_slice(&segment.bytes);
            ranges.push(AddressRange {
                start: segment.start,
                len: segment.bytes.len() as u64,
            });
        }

        Ok(Self { ranges, base, data })
    }

    /// Read and decode the snapshot at `path`
    ///
    /// `base` places raw binaries and is ignored for Intel HEX.
    pub fn load(path: impl AsRef<Path>, format: SnapshotFormat, base: u64) -> SymsnapResult<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), ?format, len = bytes.len(), "loading snapshot");
        match format {
            SnapshotFormat::Binary => Self::from_binary(base, bytes),
            SnapshotFormat::IntelHex => {
                let text = String::from_utf8(bytes)
                    .map_err(|err| SymsnapError::snapshot(0, format!("Intel HEX is not text: {err}")))?;
                Self::parse_ihex(&text)
            }
        }
    }

    /// Shift a snapshot captured in ELF address notation so it starts at its
    /// offset inside `window`; a snapshot that does not start in the window
    /// is left alone
    pub fn rebase_into(&mut self, window: &AddressWindow)
    {
        let Some(base) = window.rebase(self.base) else {
            return;
        };
        debug!(from = self.base, to = base, "rebasing snapshot");
        let shift = self.base - base;
        self.base = base;
        for range in &mut self.ranges {
            range.start -= shift;
        }
    }

    pub fn base(&self) -> u64
    {
        self.base
    }

    pub fn data(&self) -> &[u8]
    {
        &self.data
    }

    pub fn ranges(&self) -> &[AddressRange]
    {
        &self.ranges
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use super::*;

    #[test]
    fn test_binary_snapshot()
    {
        let snapshot = Snapshot::from_binary(0x100, vec![1, 2, 3]).unwrap();
        assert_eq!(snapshot.ranges(), &[AddressRange { start: 0x100, len: 3 }]);
        assert!(Snapshot::from_binary(0, Vec::new()).is_err());
    }

    #[test]
    fn test_ihex_with_hole()
    {
        let text = ":020100001122CA\n:0101040033C7\n:00000001FF\n";
        let snapshot = Snapshot::parse_ihex(text).unwrap();
        assert_eq!(snapshot.base(), 0x100);
        assert_eq!(snapshot.data(), &[0x11, 0x22, 0, 0, 0x33]);
        assert_eq!(snapshot.ranges().len(), 2);
    }

    #[test]
    fn test_ihex_without_data_is_a_data_error()
    {
        let err = Snapshot::parse_ihex(":00000001FF\n").unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_ihex_out_of_order_records()
    {
        let snapshot = Snapshot::parse_ihex(":02011000334476\n:020100001122CA\n:00000001FF\n").unwrap();
        assert_eq!(snapshot.base(), 0x100);
        assert_eq!(snapshot.data().len(), 0x12);
        assert_eq!(snapshot.data()[..2], [0x11, 0x22]);
        assert_eq!(snapshot.data()[0x10..], [0x33, 0x44]);
    }

    #[test]
    fn test_ihex_overlapping_record_is_a_data_error()
    {
        let text = ":10000000AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA50\n\
                    :10001000BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB30\n\
                    :01000400AA51\n";
        let err = Snapshot::parse_ihex(text).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_ihex_span_is_capped()
    {
        let text = ":0100000001FE\n:02000004FFFFFC\n:0100000002FD\n";
        let err = Snapshot::parse_ihex(text).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("span"));
    }

    #[test]
    fn test_rebase_into_data_window()
    {
        let window = AddressWindow::new(0x80_0000, 0x81_0000).unwrap();
        let mut snapshot = Snapshot::from_binary(0x80_0100, vec![0; 4]).unwrap();
        snapshot.rebase_into(&window);
        assert_eq!(snapshot.base(), 0x100);
        assert_eq!(snapshot.ranges()[0].start, 0x100);

        let mut plain = Snapshot::from_binary(0x100, vec![0; 4]).unwrap();
        plain.rebase_into(&window);
        assert_eq!(plain.base(), 0x100);
    }

    #[test]
    fn test_format_from_extension()
    {
        assert_eq!(SnapshotFormat::from_path(Path::new("ram.HEX")), SnapshotFormat::IntelHex);
        assert_eq!(SnapshotFormat::from_path(Path::new("ram.ihx")), SnapshotFormat::IntelHex);
        assert_eq!(SnapshotFormat::from_path(Path::new("ram.bin")), SnapshotFormat::Binary);
        assert_eq!(SnapshotFormat::from_path(Path::new("ram")), SnapshotFormat::Binary);
    }

    #[test]
    fn test_load_from_file()
    {
        let mut file = tempfile::Builder::new().suffix(".hex").tempfile().unwrap();
        writeln!(file, ":0200000400807A").unwrap();
        writeln!(file, ":020100001234B7").unwrap();
        writeln!(file, ":00000001FF").unwrap();

        let format = SnapshotFormat::from_path(file.path());
        let snapshot = Snapshot::load(file.path(), format, 0).unwrap();
        assert_eq!(snapshot.base(), 0x80_0100);
        assert_eq!(snapshot.data(), &[0x12, 0x34]);
    }

    #[test]
    fn test_load_missing_file_is_io_error()
    {
        let err = Snapshot::load("/nonexistent/ram.bin", SnapshotFormat::Binary, 0).unwrap_err();
        assert!(matches!(err, SymsnapError::Io(_)));
    }
}
