//! Common module for library exports

pub use crate::annotate::{annotate, write_listing, AnnotateOptions, AnnotatedLine};
pub use crate::debug::{DebugTree, DwarfImage, MemoryTree};
pub use crate::error::{SymsnapError, SymsnapResult};
pub use crate::report::{write_map, write_usage, UsageTree};
pub use crate::snapshot::{Snapshot, SnapshotFormat};
pub use crate::symbols::{collect_symbols, EnumerateOptions, SymbolEnumerator};
pub use crate::types::{AddressSpace, AddressWindow, Entry, Member, TargetLayout, TargetPreset};
