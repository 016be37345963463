//! # symsnap-core
//!
//! Symbol table synthesis and memory snapshot annotation for embedded
//! firmware.
//!
//! This crate provides:
//! - Read access to the DWARF debug information of an ELF image
//! - A flat, address-sorted list of leaf variables (arrays and structures
//!   flattened into individual entries)
//! - Intel HEX and raw binary snapshot decoding
//! - An annotated listing of a snapshot, a symbol map, and a memory usage
//!   report
//!
//! ## Address Spaces
//!
//! AVR toolchains map every address space into one flat ELF address range.
//! Entries are reported as offsets into the selected space (data by default,
//! EEPROM on request), see [`types::TargetLayout`].
//!
//! ## Example
//!
//! ```rust
//! use symsnap_core::debug::MemoryTree;
//! use symsnap_core::report::write_map;
//! use symsnap_core::symbols::{collect_symbols, EnumerateOptions};
//!
//! let mut tree = MemoryTree::new();
//! let cu = tree.add_unit(&["main.c"]);
//! let int = tree.base_type(cu, "int", 2);
//! tree.variable(cu, "counter", 0x80_0100, int);
//!
//! let entries = collect_symbols(&tree, &EnumerateOptions::default());
//! let mut out = Vec::new();
//! write_map(&mut out, &entries).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("0x000100\t2\tcounter"));
//! ```

pub mod annotate;
pub mod debug;
pub mod error;
pub mod prelude;
pub mod report;
pub mod snapshot;
pub mod symbols;
pub mod types;

// Re-export commonly used types
pub use error::{SymsnapError, SymsnapResult};
pub use types::{Entry, Member};
