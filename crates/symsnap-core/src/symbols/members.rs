//! Structure member extraction.

use tracing::debug;

use super::array::ArrayLayout;
use super::resolver::{array_dimensions, resolve_type};
use crate::debug::{DebugTree, Tag};
use crate::types::Member;

/// Leaf members of the structure `structure`, relative to its start
///
/// Every named member is resolved and laid out like a top-level variable:
/// arrays expand, byte arrays become `name[]` leaves, nested structures stay
/// opaque. Members whose type or offset cannot be resolved are dropped.
///
/// With `fill_gaps`, bytes of `[0, total_size)` not described by any member
/// are covered by `*UNKNOWN*` members, which also absorb padding and unnamed
/// members. A structure without any usable member yields an empty list.
pub fn struct_members<T: DebugTree>(tree: &T, structure: T::Node, total_size: u64, fill_gaps: bool) -> Vec<Member>
{
    let children = match tree.children(structure) {
        Ok(children) => children,
        Err(err) => {
            debug!(?structure, error = %err, "cannot list structure members");
            return Vec::new();
        }
    };

    let mut members = Vec::new();
    for child in children {
        let Ok(attrs) = tree.attrs(child) else {
            continue;
        };
        if attrs.tag != Tag::Member {
            continue;
        }
        let Some(name) = attrs.name else {
            continue;
        };
        let off = match &attrs.member_location {
            Some(location) => match location.offset() {
                Some(off) => off,
                None => {
                    debug!(member = %name, "unsupported member location");
                    continue;
                }
            },
            None => 0,
        };
        let Some(ty) = attrs.type_ref else {
            continue;
        };
        let Some(info) = resolve_type(tree, ty) else {
            debug!(member = %name, "member size unresolved");
            continue;
        };
        let Some(dims) = array_dimensions(tree, ty) else {
            continue;
        };
        let Some(leaves) = ArrayLayout::from_dimensions(dims, info.size).and_then(|layout| layout.members(&name, off))
        else {
            debug!(member = %name, "member extent overflows");
            continue;
        };
        members.extend(leaves);
    }

    members.retain(|member| member.size > 0);
    members.sort_by_key(|member| member.off);

    if fill_gaps && !members.is_empty() {
        fill_member_gaps(&mut members, total_size);
    }
    members
}

/// Insert `*UNKNOWN*` members for every uncovered byte range of
/// `[0, total_size)`; `members` must be sorted by offset
///
/// Members may share bytes (bitfields of different declared sizes at one
/// offset, unions); only bytes covered by none of them are filled.
pub fn fill_member_gaps(members: &mut Vec<Member>, total_size: u64)
{
    let mut filled = Vec::with_capacity(members.len() + 2);
    let mut end = 0;
    for member in members.drain(..) {
        if member.off > end {
            filled.push(Member::unknown(end, member.off - end));
        }
        end = end.max(member.end());
        filled.push(member);
    }
    if total_size > end {
        filled.push(Member::unknown(end, total_size - end));
    }
    *members = filled;
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::debug::{MemoryTree, NodeAttrs, NodeId};

    fn assert_tiles(members: &[Member], size: u64)
    {
        let mut cursor = 0;
        for member in members {
            assert_eq!(member.off, cursor, "gap or overlap before {}", member.name);
            cursor = member.end();
        }
        assert_eq!(cursor, size);
    }

    fn sensor_struct(tree: &mut MemoryTree) -> (NodeId, NodeId)
    {
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "uint8_t", 1);
        let word = tree.base_type(cu, "uint16_t", 2);
        let s = tree.structure(cu, "sensor", 10);
        tree.member(s, "id", 0, byte);
        tree.member(s, "raw", 2, word);
        let label = tree.array(cu, byte, &[1, 4]);
        tree.member(s, "label", 4, label);
        (cu, s)
    }

    #[test]
    fn test_members_with_gap_filling()
    {
        let mut tree = MemoryTree::new();
        let (_, s) = sensor_struct(&mut tree);

        let members = struct_members(&tree, s, 10, true);
        assert_eq!(
            members,
            vec![
                Member::new("id", 0, 1),
                Member::new(Member::UNKNOWN, 1, 1),
                Member::new("raw", 2, 2),
                Member::new("label[]", 4, 4),
                Member::new(Member::UNKNOWN, 8, 2),
            ]
        );
        assert_tiles(&members, 10);
    }

    #[test]
    fn test_members_without_gap_filling()
    {
        let mut tree = MemoryTree::new();
        let (_, s) = sensor_struct(&mut tree);

        let names: Vec<_> = struct_members(&tree, s, 10, false).into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["id", "raw", "label[]"]);
    }

    #[test]
    fn test_array_member_expands()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let long = tree.base_type(cu, "int32_t", 4);
        let matrix = tree.array(cu, long, &[2, 3]);
        let s = tree.structure(cu, "cal", 24);
        tree.member(s, "gain", 0, matrix);

        let members = struct_members(&tree, s, 24, true);
        assert_eq!(members.len(), 6);
        assert_eq!(members[0], Member::new("gain[0][0]", 0, 4));
        assert_eq!(members[5], Member::new("gain[1][2]", 20, 4));
        assert_tiles(&members, 24);
    }

    #[test]
    fn test_nested_struct_stays_opaque()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "uint8_t", 1);
        let inner = tree.structure(cu, "inner", 3);
        tree.member(inner, "a", 0, byte);
        let outer = tree.structure(cu, "outer", 4);
        tree.member(outer, "flags", 0, byte);
        tree.member(outer, "inner", 1, inner);

        let members = struct_members(&tree, outer, 4, true);
        assert_eq!(members, vec![Member::new("flags", 0, 1), Member::new("inner", 1, 3)]);
    }

    #[test]
    fn test_unnamed_and_unresolved_members_become_unknown()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let word = tree.base_type(cu, "uint16_t", 2);
        let opaque = tree.add_node(cu, NodeAttrs::new(Tag::Structure));
        let s = tree.structure(cu, "mixed", 6);
        tree.member(s, "head", 0, word);
        let anonymous = tree.member(s, "x", 2, word);
        tree.attrs_mut(anonymous).name = None;
        tree.member(s, "handle", 4, opaque);

        let members = struct_members(&tree, s, 6, true);
        assert_eq!(members, vec![Member::new("head", 0, 2), Member::new(Member::UNKNOWN, 2, 4)]);
    }

    #[test]
    fn test_leading_gap_is_filled()
    {
        let mut members = vec![Member::new("tail", 2, 2)];
        fill_member_gaps(&mut members, 4);
        assert_eq!(members, vec![Member::new(Member::UNKNOWN, 0, 2), Member::new("tail", 2, 2)]);
    }

    #[test]
    fn test_struct_without_members_is_empty()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let s = tree.structure(cu, "empty", 4);
        assert!(struct_members(&tree, s, 4, true).is_empty());
    }

    #[test]
    fn test_shared_offsets_are_not_refilled()
    {
        let mut members = vec![Member::new("flags", 0, 2), Member::new("mode", 0, 1)];
        fill_member_gaps(&mut members, 2);
        assert_eq!(members, vec![Member::new("flags", 0, 2), Member::new("mode", 0, 1)]);

        let mut members = vec![Member::new("flags", 0, 2), Member::new("mode", 0, 1), Member::new("tail", 3, 1)];
        fill_member_gaps(&mut members, 4);
        assert_eq!(
            members,
            vec![
                Member::new("flags", 0, 2),
                Member::new("mode", 0, 1),
                Member::new(Member::UNKNOWN, 2, 1),
                Member::new("tail", 3, 1),
            ]
        );
    }

    #[test]
    fn test_bitfields_sharing_an_offset()
    {
        let mut tree = MemoryTree::new();
        let cu = tree.add_unit(&[]);
        let byte = tree.base_type(cu, "uint8_t", 1);
        let word = tree.base_type(cu, "uint16_t", 2);
        let s = tree.structure(cu, "status", 4);
        tree.member(s, "ready", 0, word);
        tree.member(s, "error", 0, byte);
        tree.member(s, "count", 3, byte);

        let members = struct_members(&tree, s, 4, true);
        let unknown: Vec<&Member> = members.iter().filter(|member| member.name == Member::UNKNOWN).collect();
        assert_eq!(unknown, vec![&Member::new(Member::UNKNOWN, 2, 1)]);
    }
}
