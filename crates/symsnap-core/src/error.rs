//! # Error Types
//!
//! General error handling for symbol synthesis and snapshot decoding.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for symsnap operations
///
/// Most failures inside the symbol enumerator are absorbed (a node that cannot
/// be resolved is skipped), so the variants here describe the failures that
/// end a run or that an adapter reports to its caller.
///
/// ## Error Categories
///
/// 1. **Input errors**: Io, ObjectParse
/// 2. **Debug information errors**: Dwarf
/// 3. **Snapshot errors**: Snapshot (the "data error" outcome)
/// 4. **Argument errors**: InvalidArgument
#[derive(Error, Debug)]
pub enum SymsnapError
{
    /// The firmware image could not be parsed as an object file
    ///
    /// This happens when the file is truncated, is not an ELF image, or uses
    /// a format `object` does not understand.
    #[error("Failed to parse object file: {0}")]
    ObjectParse(String),

    /// A DWARF section could not be read
    ///
    /// The string carries the operation that was in progress, followed by the
    /// `gimli` error.
    #[error("DWARF error: {0}")]
    Dwarf(String),

    /// The memory snapshot could not be decoded
    ///
    /// `line` is the 1-based line of the snapshot file that failed, or 0 when
    /// the failure is not tied to a line (empty snapshot, unreadable bytes).
    #[error("Invalid snapshot (line {line}): {reason}")]
    Snapshot
    {
        /// Line number in the snapshot file
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Invalid argument passed to a library function
    ///
    /// Examples:
    /// - An address window whose end precedes its start
    /// - An unknown target preset name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for file operations, etc.)
    ///
    /// Used for errors when reading the firmware image or the snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SymsnapError
{
    /// Whether this error belongs to the "data error" class
    ///
    /// The command line reports these with a reserved exit status instead of
    /// the generic failure status.
    pub fn is_data_error(&self) -> bool
    {
        matches!(self, SymsnapError::Snapshot { .. })
    }

    pub(crate) fn snapshot(line: usize, reason: impl Into<String>) -> Self
    {
        SymsnapError::Snapshot {
            line,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for `Result<T, SymsnapError>`
///
/// ```rust
/// use symsnap_core::error::SymsnapResult;
/// fn foo() -> SymsnapResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SymsnapResult<T> = std::result::Result<T, SymsnapError>;

pub(crate) fn map_dwarf_error(context: &str, err: gimli::Error) -> SymsnapError
{
    SymsnapError::Dwarf(format!("{context}: {err}"))
}
