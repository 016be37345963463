//! Type chain resolution.

use smallvec::SmallVec;
use tracing::trace;

use crate::debug::{DebugTree, Tag};

const MAX_TYPE_REF_DEPTH: usize = 32;

/// Array dimensions, outermost first
pub type Dims = SmallVec<[u64; 4]>;

/// Storage class of the node that ends a type chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind
{
    Scalar,
    Pointer,
    /// An array type that carries its own byte size
    Array,
    Structure,
    Union,
}

impl From<Tag> for TypeKind
{
    fn from(tag: Tag) -> Self
    {
        match tag {
            Tag::Pointer => TypeKind::Pointer,
            Tag::Array => TypeKind::Array,
            Tag::Structure => TypeKind::Structure,
            Tag::Union => TypeKind::Union,
            _ => TypeKind::Scalar,
        }
    }
}

/// Terminal node of a type chain and its byte size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo<N>
{
    pub node: N,
    pub kind: TypeKind,
    pub size: u64,
}

/// Follow type references from `start` until a node carries a byte size
///
/// For an array the element's size is returned; the caller multiplies by the
/// dimensions found with [`array_dimensions`]. Returns `None` for incomplete
/// types, unreadable nodes, and chains longer than the depth limit.
pub fn resolve_type<T: DebugTree>(tree: &T, start: T::Node) -> Option<TypeInfo<T::Node>>
{
    let mut node = start;
    for _ in 0..MAX_TYPE_REF_DEPTH {
        let attrs = tree.attrs(node).ok()?;
        if let Some(size) = attrs.byte_size {
            return Some(TypeInfo {
                node,
                kind: attrs.tag.into(),
                size,
            });
        }
        node = attrs.type_ref?;
    }
    trace!(?start, "type chain exceeds depth limit");
    None
}

/// Dimensions of every array met along the type chain before its terminal
/// node, outermost first
///
/// The walk stops at the node carrying a byte size, so an array behind a
/// pointer contributes nothing. Returns `None` when an array has a subrange
/// without a usable bound (flexible or zero-length arrays).
pub fn array_dimensions<T: DebugTree>(tree: &T, start: T::Node) -> Option<Dims>
{
    let mut dims = Dims::new();
    let mut node = start;
    for _ in 0..MAX_TYPE_REF_DEPTH {
        let attrs = tree.attrs(node).ok()?;
        if attrs.byte_size.is_some() {
            return Some(dims);
        }
        if attrs.tag == Tag::Array {
            for child in tree.children(node).ok()? {
                let sub = tree.attrs(child).ok()?;
                if sub.tag != Tag::Subrange {
                    continue;
                }
                match sub.dimension() {
                    Some(dim) if dim > 0 => dims.push(dim),
                    _ => return None,
                }
            }
        }
        node = attrs.type_ref?;
    }
    None
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::debug::{MemoryTree, NodeAttrs};

    #[test]
    fn test_resolve_through_typedef_and_qualifier()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let int = tree.base_type(cu, "unsigned int", 2);
        let volatile = tree.qualifier(cu, int);
        let alias = tree.typedef(cu, "tick_t", volatile);

        let info = resolve_type(&tree, alias).unwrap();
        assert_eq!(info.node, int);
        assert_eq!(info.kind, TypeKind::Scalar);
        assert_eq!(info.size, 2);
    }

    #[test]
    fn test_array_returns_element_size()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let long = tree.base_type(cu, "long", 4);
        let array = tree.array(cu, long, &[2, 3]);

        assert_eq!(resolve_type(&tree, array).unwrap().size, 4);
        assert_eq!(array_dimensions(&tree, array).unwrap().as_slice(), &[2, 3]);
    }

    #[test]
    fn test_pointer_stops_the_walk()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "char", 1);
        let buffer = tree.array(cu, byte, &[10]);
        let ptr = tree.pointer(cu, 2, Some(buffer));

        let info = resolve_type(&tree, ptr).unwrap();
        assert_eq!(info.kind, TypeKind::Pointer);
        assert_eq!(info.size, 2);
        assert!(array_dimensions(&tree, ptr).unwrap().is_empty());
    }

    #[test]
    fn test_nested_array_typedef_collects_all_dims()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "char", 1);
        let name = tree.array(cu, byte, &[12]);
        let name_t = tree.typedef(cu, "name_t", name);
        let names = tree.array(cu, name_t, &[4]);

        assert_eq!(array_dimensions(&tree, names).unwrap().as_slice(), &[4, 12]);
    }

    #[test]
    fn test_incomplete_type_is_none()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let opaque = tree.add_node(cu, NodeAttrs::new(Tag::Structure));
        let alias = tree.typedef(cu, "handle_t", opaque);

        assert_eq!(resolve_type(&tree, alias), None);
    }

    #[test]
    fn test_flexible_array_has_no_dimensions()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "char", 1);
        let flexible = tree.array(cu, byte, &[0]);

        assert_eq!(array_dimensions(&tree, flexible), None);
    }

    #[test]
    fn test_reference_cycle_terminates()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let first = tree.add_node(cu, NodeAttrs::new(Tag::Typedef));
        let second = tree.typedef(cu, "b", first);
        tree.attrs_mut(first).type_ref = Some(second);

        assert_eq!(resolve_type(&tree, first), None);
        assert_eq!(array_dimensions(&tree, first), None);
    }
}
