//! # Symbol synthesis
//!
//! Turns the declaration nodes of a [`DebugTree`](crate::debug::DebugTree)
//! into the flat, address-sorted list of leaf entries every output mode is
//! built from.
//!
//! The pipeline is split into pure functions so each stage can be tested on
//! an in-memory tree:
//!
//! 1. [`resolve_type`] follows type references to a sized node
//! 2. [`array_dimensions`] and [`ArrayLayout`] decide how an array is split
//! 3. [`struct_members`] lists the fields of a structure
//! 4. [`SymbolEnumerator`] drives the above per variable and
//!    [`collect_symbols`] sorts and deduplicates the result

pub mod array;
pub mod enumerate;
pub mod members;
pub mod resolver;

pub use array::{ArrayLayout, IndexCounter};
pub use enumerate::{collect_symbols, EnumerateOptions, SymbolEnumerator};
pub use members::{fill_member_gaps, struct_members};
pub use resolver::{array_dimensions, resolve_type, Dims, TypeInfo, TypeKind};
