//! # Debug metadata access
//!
//! The symbol enumerator never talks to `gimli` directly. It reads the debug
//! information through [`DebugTree`], a read-only view of a graph of
//! declaration nodes grouped into compilation units. Two implementations are
//! provided:
//!
//! - [`DwarfImage`]: DWARF sections of an ELF image, read with `gimli`
//! - [`MemoryTree`]: a tree assembled in memory, handy for tests and for
//!   front ends that already hold decoded debug information
//!
//! Attributes come back as a [`NodeAttrs`] record where every attribute the
//! enumerator cares about is an explicit `Option`. An absent attribute is the
//! normal case for optimized builds and is handled at each read site.

pub mod dwarf;
pub mod memory;

use std::fmt;

pub use dwarf::{DieRef, DwarfImage};
pub use memory::{MemoryTree, NodeId};

use crate::error::SymsnapResult;

/// Read-only capability interface over a debug metadata tree
pub trait DebugTree
{
    /// Handle naming one node; cheap to copy
    type Node: Copy + Eq + fmt::Debug;

    /// Number of compilation units
    fn unit_count(&self) -> usize;

    /// Every node of a compilation unit in depth-first order, unit root first
    fn unit_nodes(&self, unit: usize) -> SymsnapResult<Vec<Self::Node>>;

    /// Direct children of `node`
    fn children(&self, node: Self::Node) -> SymsnapResult<Vec<Self::Node>>;

    /// The attributes of `node`
    fn attrs(&self, node: Self::Node) -> SymsnapResult<NodeAttrs<Self::Node>>;

    /// Resolve a `decl_file` index through the file table of the unit that
    /// owns `node`
    fn file_name(&self, node: Self::Node, index: u64) -> Option<String>;
}

/// Node kinds the enumerator distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag
{
    Variable,
    Member,
    Structure,
    Union,
    Array,
    Subrange,
    Pointer,
    Typedef,
    /// `const`, `volatile`, `restrict`, `_Atomic`
    Qualifier,
    BaseType,
    Enumeration,
    Other,
}

/// One operation of a location expression
///
/// Only the two forms needed to describe statically allocated storage are
/// decoded; everything else is reported as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOp
{
    /// `DW_OP_addr`
    Address(u64),
    /// `DW_OP_plus_uconst`
    PlusConstant(u64),
    Other,
}

/// Value of a variable's location attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location
{
    /// A single location expression
    Expr(Vec<LocationOp>),
    /// A location list or another form that is not a plain expression
    Unsupported,
}

impl Location
{
    /// Absolute address of statically allocated storage
    ///
    /// Accepts `DW_OP_addr` followed by any number of `DW_OP_plus_uconst`;
    /// every other shape yields `None`.
    pub fn direct_address(&self) -> Option<u64>
    {
        let Location::Expr(ops) = self else {
            return None;
        };
        let (first, rest) = ops.split_first()?;
        let LocationOp::Address(mut address) = *first else {
            return None;
        };
        for op in rest {
            match *op {
                LocationOp::PlusConstant(value) => address = address.checked_add(value)?,
                _ => return None,
            }
        }
        Some(address)
    }
}

/// Value of a structure member's location attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLocation
{
    /// Byte offset given as a constant
    Constant(u64),
    /// Offset given as an expression
    Expr(Vec<LocationOp>),
}

impl MemberLocation
{
    /// Byte offset from the start of the structure
    ///
    /// Expressions are accepted only if they consist of `DW_OP_plus_uconst`
    /// steps, which are accumulated.
    pub fn offset(&self) -> Option<u64>
    {
        match self {
            MemberLocation::Constant(value) => Some(*value),
            MemberLocation::Expr(ops) => ops.iter().try_fold(0u64, |acc, op| match *op {
                LocationOp::PlusConstant(value) => acc.checked_add(value),
                _ => None,
            }),
        }
    }
}

/// Attributes of one node
///
/// `origin` is the declaration a node completes or duplicates
/// (`DW_AT_abstract_origin` or `DW_AT_specification`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttrs<N>
{
    pub tag: Tag,
    pub name: Option<String>,
    pub byte_size: Option<u64>,
    pub type_ref: Option<N>,
    pub origin: Option<N>,
    pub location: Option<Location>,
    pub member_location: Option<MemberLocation>,
    pub upper_bound: Option<u64>,
    pub count: Option<u64>,
    pub decl_file: Option<u64>,
    pub decl_line: Option<u64>,
}

impl<N> NodeAttrs<N>
{
    /// A record with the given tag and no attributes
    pub fn new(tag: Tag) -> Self
    {
        Self {
            tag,
            name: None,
            byte_size: None,
            type_ref: None,
            origin: None,
            location: None,
            member_location: None,
            upper_bound: None,
            count: None,
            decl_file: None,
            decl_line: None,
        }
    }

    /// Element count of a subrange node
    pub fn dimension(&self) -> Option<u64>
    {
        self.upper_bound
            .and_then(|bound| bound.checked_add(1))
            .or(self.count)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_direct_address_forms()
    {
        let plain = Location::Expr(vec![LocationOp::Address(0x80_0100)]);
        assert_eq!(plain.direct_address(), Some(0x80_0100));

        let offset = Location::Expr(vec![LocationOp::Address(0x80_0100), LocationOp::PlusConstant(4)]);
        assert_eq!(offset.direct_address(), Some(0x80_0104));
    }

    #[test]
    fn test_direct_address_rejects_other_forms()
    {
        assert_eq!(Location::Unsupported.direct_address(), None);
        assert_eq!(Location::Expr(vec![]).direct_address(), None);
        assert_eq!(Location::Expr(vec![LocationOp::PlusConstant(4)]).direct_address(), None);
        assert_eq!(
            Location::Expr(vec![LocationOp::Address(0x100), LocationOp::Other]).direct_address(),
            None
        );
    }

    #[test]
    fn test_member_offset()
    {
        assert_eq!(MemberLocation::Constant(6).offset(), Some(6));
        assert_eq!(
            MemberLocation::Expr(vec![LocationOp::PlusConstant(2), LocationOp::PlusConstant(3)]).offset(),
            Some(5)
        );
        assert_eq!(MemberLocation::Expr(vec![LocationOp::Address(2)]).offset(), None);
    }

    #[test]
    fn test_subrange_dimension()
    {
        let mut attrs: NodeAttrs<()> = NodeAttrs::new(Tag::Subrange);
        assert_eq!(attrs.dimension(), None);
        attrs.count = Some(7);
        assert_eq!(attrs.dimension(), Some(7));
        attrs.upper_bound = Some(11);
        assert_eq!(attrs.dimension(), Some(12));
    }
}
