//! In-memory debug tree.

use super::{DebugTree, Location, LocationOp, MemberLocation, NodeAttrs, Tag};
use crate::error::{SymsnapError, SymsnapResult};

/// Handle of a node in a [`MemoryTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct MemoryNode
{
    unit: usize,
    attrs: NodeAttrs<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct MemoryUnit
{
    root: NodeId,
    files: Vec<String>,
}

/// A debug tree assembled in memory
///
/// File tables follow DWARF 4 numbering: `decl_file` index 1 names the first
/// file passed to [`MemoryTree::add_unit`].
///
/// ## Example
///
/// ```rust
/// use symsnap_core::debug::MemoryTree;
///
/// let mut tree = MemoryTree::new();
/// let cu = tree.add_unit(&["main.c"]);
/// let int = tree.base_type(cu, "int", 2);
/// tree.variable(cu, "counter", 0x80_0100, int);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTree
{
    nodes: Vec<MemoryNode>,
    units: Vec<MemoryUnit>,
}

impl MemoryTree
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Start a compilation unit and return its root node
    pub fn add_unit(&mut self, files: &[&str]) -> NodeId
    {
        let root = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode {
            unit: self.units.len(),
            attrs: NodeAttrs::new(Tag::Other),
            children: Vec::new(),
        });
        self.units.push(MemoryUnit {
            root,
            files: files.iter().map(|file| (*file).to_string()).collect(),
        });
        root
    }

    /// Append a node under `parent`
    pub fn add_node(&mut self, parent: NodeId, attrs: NodeAttrs<NodeId>) -> NodeId
    {
        let id = NodeId(self.nodes.len());
        let unit = self.nodes[parent.0].unit;
        self.nodes.push(MemoryNode {
            unit,
            attrs,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Mutable access to a node's attributes
    pub fn attrs_mut(&mut self, node: NodeId) -> &mut NodeAttrs<NodeId>
    {
        &mut self.nodes[node.0].attrs
    }

    pub fn base_type(&mut self, parent: NodeId, name: &str, size: u64) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::BaseType);
        attrs.name = Some(name.to_string());
        attrs.byte_size = Some(size);
        self.add_node(parent, attrs)
    }

    pub fn pointer(&mut self, parent: NodeId, size: u64, target: Option<NodeId>) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Pointer);
        attrs.byte_size = Some(size);
        attrs.type_ref = target;
        self.add_node(parent, attrs)
    }

    pub fn typedef(&mut self, parent: NodeId, name: &str, target: NodeId) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Typedef);
        attrs.name = Some(name.to_string());
        attrs.type_ref = Some(target);
        self.add_node(parent, attrs)
    }

    pub fn qualifier(&mut self, parent: NodeId, target: NodeId) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Qualifier);
        attrs.type_ref = Some(target);
        self.add_node(parent, attrs)
    }

    /// Array of `element` with one subrange child per dimension
    pub fn array(&mut self, parent: NodeId, element: NodeId, dims: &[u64]) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Array);
        attrs.type_ref = Some(element);
        let array = self.add_node(parent, attrs);
        for &dim in dims {
            let mut subrange = NodeAttrs::new(Tag::Subrange);
            subrange.upper_bound = dim.checked_sub(1);
            self.add_node(array, subrange);
        }
        array
    }

    pub fn structure(&mut self, parent: NodeId, name: &str, size: u64) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Structure);
        attrs.name = Some(name.to_string());
        attrs.byte_size = Some(size);
        self.add_node(parent, attrs)
    }

    /// Named structure member at a constant offset
    pub fn member(&mut self, structure: NodeId, name: &str, offset: u64, ty: NodeId) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Member);
        attrs.name = Some(name.to_string());
        attrs.member_location = Some(MemberLocation::Constant(offset));
        attrs.type_ref = Some(ty);
        self.add_node(structure, attrs)
    }

    /// Named variable at a `DW_OP_addr` location
    pub fn variable(&mut self, parent: NodeId, name: &str, address: u64, ty: NodeId) -> NodeId
    {
        let mut attrs = NodeAttrs::new(Tag::Variable);
        attrs.name = Some(name.to_string());
        attrs.location = Some(Location::Expr(vec![LocationOp::Address(address)]));
        attrs.type_ref = Some(ty);
        self.add_node(parent, attrs)
    }

    fn node(&self, node: NodeId) -> SymsnapResult<&MemoryNode>
    {
        self.nodes
            .get(node.0)
            .ok_or_else(|| SymsnapError::InvalidArgument(format!("unknown node {}", node.0)))
    }

    fn collect_dfs(&self, node: NodeId, out: &mut Vec<NodeId>)
    {
        out.push(node);
        for &child in &self.nodes[node.0].children {
            self.collect_dfs(child, out);
        }
    }
}

impl DebugTree for MemoryTree
{
    type Node = NodeId;

    fn unit_count(&self) -> usize
    {
        self.units.len()
    }

    fn unit_nodes(&self, unit: usize) -> SymsnapResult<Vec<NodeId>>
    {
        let unit = self
            .units
            .get(unit)
            .ok_or_else(|| SymsnapError::InvalidArgument(format!("unknown unit {unit}")))?;
        let mut nodes = Vec::new();
        self.collect_dfs(unit.root, &mut nodes);
        Ok(nodes)
    }

    fn children(&self, node: NodeId) -> SymsnapResult<Vec<NodeId>>
    {
        Ok(self.node(node)?.children.clone())
    }

    fn attrs(&self, node: NodeId) -> SymsnapResult<NodeAttrs<NodeId>>
    {
        Ok(self.node(node)?.attrs.clone())
    }

    fn file_name(&self, node: NodeId, index: u64) -> Option<String>
    {
        let unit = self.nodes.get(node.0)?.unit;
        let slot = usize::try_from(index.checked_sub(1)?).ok()?;
        self.units[unit].files.get(slot).cloned()
    }
}
