//! # Types
//!
//! Value records shared by the symbol enumerator, the annotator and the
//! report generators.

pub mod entry;
pub mod layout;

// Re-export all public types
pub use entry::{Entry, Member};
pub use layout::{AddressSpace, AddressWindow, TargetLayout, TargetPreset};
