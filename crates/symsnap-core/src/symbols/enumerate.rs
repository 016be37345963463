//! Global symbol enumeration.
//!
//! Walks every compilation unit of a [`DebugTree`] and turns each statically
//! allocated variable into one or more leaf [`Entry`] values. Array
//! variables are flattened through [`ArrayLayout`]; structure variables are
//! split into their members one level deep.

use tracing::{debug, info, trace, warn};

use super::array::ArrayLayout;
use super::members::struct_members;
use super::resolver::{array_dimensions, resolve_type, TypeKind};
use crate::debug::{DebugTree, NodeAttrs, Tag};
use crate::types::{AddressWindow, Entry, Member, TargetLayout};

const MAX_ORIGIN_DEPTH: usize = 8;

/// Knobs for [`SymbolEnumerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerateOptions
{
    /// ELF addresses to keep; kept addresses are rebased onto its start
    pub window: AddressWindow,
    /// Split structure variables into `var.member` entries
    pub expand_structs: bool,
    /// Cover bytes no member describes with `*UNKNOWN*` members
    pub fill_gaps: bool,
}

impl EnumerateOptions
{
    pub fn new(window: AddressWindow) -> Self
    {
        Self {
            window,
            expand_structs: true,
            fill_gaps: true,
        }
    }
}

impl Default for EnumerateOptions
{
    fn default() -> Self
    {
        let layout = TargetLayout::default();
        Self::new(AddressWindow {
            start: layout.data_start,
            end: layout.eeprom_start,
        })
    }
}

/// Produces leaf entries from a debug tree, one compilation unit at a time
///
/// The enumerator holds no state besides its options: entries are generated
/// lazily and are neither sorted nor deduplicated. Use [`collect_symbols`]
/// for the canonical sorted list.
pub struct SymbolEnumerator<'a, T: DebugTree>
{
    tree: &'a T,
    options: EnumerateOptions,
}

impl<T: DebugTree> Clone for SymbolEnumerator<'_, T>
{
    fn clone(&self) -> Self
    {
        *self
    }
}

impl<T: DebugTree> Copy for SymbolEnumerator<'_, T> {}

impl<'a, T: DebugTree> SymbolEnumerator<'a, T>
{
    pub fn new(tree: &'a T, options: EnumerateOptions) -> Self
    {
        Self { tree, options }
    }

    /// Entries of every compilation unit, in traversal order
    pub fn entries(self) -> impl Iterator<Item = Entry> + 'a
    {
        (0..self.tree.unit_count()).flat_map(move |unit| self.unit_entries(unit))
    }

    /// Entries of one compilation unit; an unreadable unit yields nothing
    pub fn unit_entries(self, unit: usize) -> impl Iterator<Item = Entry> + 'a
    {
        let nodes = match self.tree.unit_nodes(unit) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(unit, error = %err, "skipping unreadable compilation unit");
                Vec::new()
            }
        };
        nodes.into_iter().flat_map(move |node| self.node_entries(node))
    }

    /// Entries contributed by a single node
    ///
    /// Empty unless `node` is a variable with a static address inside the
    /// window and a type whose size can be resolved.
    pub fn node_entries(&self, node: T::Node) -> Vec<Entry>
    {
        let Ok(attrs) = self.tree.attrs(node) else {
            return Vec::new();
        };
        if attrs.tag != Tag::Variable {
            return Vec::new();
        }
        let Some(location) = &attrs.location else {
            return Vec::new();
        };

        let origins = self.origins(&attrs);

        let name = match &attrs.name {
            Some(name) => name.clone(),
            None => {
                if origins.iter().any(|(_, origin)| origin.location.is_some()) {
                    trace!(?node, "origin already carries a location");
                    return Vec::new();
                }
                match origins.iter().find_map(|(_, origin)| origin.name.clone()) {
                    Some(name) => name,
                    None => return Vec::new(),
                }
            }
        };

        let Some(address) = location.direct_address() else {
            debug!(variable = %name, "unsupported location expression");
            return Vec::new();
        };
        let Some(loc) = self.options.window.rebase(address) else {
            trace!(variable = %name, address = %format!("0x{address:x}"), "outside address window");
            return Vec::new();
        };

        let Some(ty) = attrs
            .type_ref
            .or_else(|| origins.iter().find_map(|(_, origin)| origin.type_ref))
        else {
            debug!(variable = %name, "variable has no type");
            return Vec::new();
        };
        let Some(info) = resolve_type(self.tree, ty) else {
            debug!(variable = %name, "variable size unresolved");
            return Vec::new();
        };
        let Some(dims) = array_dimensions(self.tree, ty) else {
            debug!(variable = %name, "array without usable bounds");
            return Vec::new();
        };

        let declpos = self.declpos(node, &attrs, &origins);
        let Some(layout) = ArrayLayout::from_dimensions(dims, info.size) else {
            debug!(variable = %name, "array bounds overflow");
            return Vec::new();
        };

        let leaves = match layout {
            ArrayLayout::Single { size } if self.options.expand_structs && info.kind == TypeKind::Structure => {
                let members = struct_members(self.tree, info.node, size, self.options.fill_gaps);
                if members.is_empty() {
                    layout.members(&name, loc)
                } else {
                    members
                        .into_iter()
                        .map(|member| {
                            let off = loc.checked_add(member.off)?;
                            Some(Member::new(format!("{name}.{}", member.name), off, member.size))
                        })
                        .collect()
                }
            }
            _ => layout.members(&name, loc),
        };
        let Some(leaves) = leaves else {
            debug!(variable = %name, "variable extends past the end of the address range");
            return Vec::new();
        };

        leaves
            .into_iter()
            .filter(|leaf| leaf.size > 0)
            .map(|leaf| Entry::new(leaf.name, leaf.off, leaf.size, declpos.clone()))
            .collect()
    }

    /// The `DW_AT_abstract_origin` / `DW_AT_specification` chain of a node,
    /// nearest first
    ///
    /// Link-time optimized images reach the declaration in two hops: the
    /// out-of-line copy points at the early definition, which points at the
    /// declaration.
    fn origins(&self, attrs: &NodeAttrs<T::Node>) -> Vec<(T::Node, NodeAttrs<T::Node>)>
    {
        let mut chain: Vec<(T::Node, NodeAttrs<T::Node>)> = Vec::new();
        let mut next = attrs.origin;
        while let Some(origin) = next {
            if chain.len() == MAX_ORIGIN_DEPTH {
                debug!(?origin, "origin chain too deep");
                break;
            }
            let Ok(origin_attrs) = self.tree.attrs(origin) else {
                break;
            };
            next = origin_attrs.origin;
            chain.push((origin, origin_attrs));
        }
        chain
    }

    /// `file:line` of the declaration, looking along the origin chain for
    /// whatever the variable itself lacks
    fn declpos(&self, node: T::Node, attrs: &NodeAttrs<T::Node>, origins: &[(T::Node, NodeAttrs<T::Node>)]) -> String
    {
        // A file index is only meaningful in the unit of the node carrying it.
        let file = std::iter::once((node, attrs))
            .chain(origins.iter().map(|(origin, origin_attrs)| (*origin, origin_attrs)))
            .find_map(|(holder, holder_attrs)| holder_attrs.decl_file.map(|index| (holder, index)))
            .and_then(|(holder, index)| self.tree.file_name(holder, index));
        let line = attrs
            .decl_line
            .or_else(|| origins.iter().find_map(|(_, origin)| origin.decl_line));

        match (file, line) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file,
            (None, _) => String::new(),
        }
    }
}

/// Every leaf entry of `tree`, sorted by `(loc, name)` without duplicates
///
/// This is the single list both the annotated listing and the reports are
/// generated from.
pub fn collect_symbols<T: DebugTree>(tree: &T, options: &EnumerateOptions) -> Vec<Entry>
{
    let enumerator = SymbolEnumerator::new(tree, *options);
    let mut entries: Vec<Entry> = enumerator.entries().collect();
    entries.sort_by(|a, b| a.loc.cmp(&b.loc).then_with(|| a.name.cmp(&b.name)));
    entries.dedup_by(|a, b| a.loc == b.loc && a.name == b.name);
    info!(count = entries.len(), units = tree.unit_count(), "collected symbols");
    entries
}
