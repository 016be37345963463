//! DWARF-backed debug tree.

use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use gimli::{
    constants, Attribute, AttributeValue, Dwarf, EndianArcSlice, Encoding, Expression, Operation, Reader,
    RunTimeEndian, SectionId, Unit, UnitOffset, UnitSectionOffset,
};
use object::{Object, ObjectSection};
use tracing::{debug, warn};

use super::{DebugTree, Location, LocationOp, MemberLocation, NodeAttrs, Tag};
use crate::error::{map_dwarf_error, SymsnapError, SymsnapResult};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

/// Reference to one DIE: the unit index and the offset inside that unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DieRef
{
    pub unit: usize,
    pub offset: UnitOffset<usize>,
}

/// DWARF sections of an ELF image, parsed into compilation units
///
/// Section data is copied out of the file, so the image does not borrow the
/// input buffer. Units that fail to parse are logged and left out; an image
/// without `.debug_info` simply has no units.
pub struct DwarfImage
{
    dwarf: OwnedDwarf,
    units: Vec<Unit<OwnedReader>>,
}

impl DwarfImage
{
    /// Read and parse the image at `path`
    pub fn open(path: impl AsRef<Path>) -> SymsnapResult<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let image = Self::parse(&bytes)
            .map_err(|err| match err {
                SymsnapError::ObjectParse(reason) => SymsnapError::ObjectParse(format!("{}: {reason}", path.display())),
                other => other,
            })?;
        debug!(path = %path.display(), units = image.units.len(), "loaded debug information");
        Ok(image)
    }

    /// Parse an in-memory object file
    pub fn parse(bytes: &[u8]) -> SymsnapResult<Self>
    {
        let file = object::File::parse(bytes).map_err(|err| SymsnapError::ObjectParse(err.to_string()))?;
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let dwarf = Dwarf::load(|id| Ok::<_, gimli::Error>(section_reader(&file, id, endian)))
            .map_err(|err| map_dwarf_error("loading DWARF sections", err))?;

        let mut units = Vec::new();
        let mut headers = dwarf.units();
        loop {
            match headers.next() {
                Ok(Some(header)) => match dwarf.unit(header) {
                    Ok(unit) => units.push(unit),
                    Err(err) => warn!(error = %err, "skipping unreadable compilation unit"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "stopping at unreadable .debug_info unit header");
                    break;
                }
            }
        }

        Ok(Self { dwarf, units })
    }

    /// Whether any compilation unit was found
    pub fn has_debug_info(&self) -> bool
    {
        !self.units.is_empty()
    }

    fn unit(&self, index: usize) -> SymsnapResult<&Unit<OwnedReader>>
    {
        self.units
            .get(index)
            .ok_or_else(|| SymsnapError::InvalidArgument(format!("unknown compilation unit {index}")))
    }

    fn resolve_ref(&self, unit_index: usize, value: AttributeValue<OwnedReader>) -> Option<DieRef>
    {
        match value {
            AttributeValue::UnitRef(offset) => Some(DieRef {
                unit: unit_index,
                offset,
            }),
            AttributeValue::DebugInfoRef(offset) => {
                let target = UnitSectionOffset::from(offset);
                self.units.iter().enumerate().find_map(|(index, unit)| {
                    target
                        .to_unit_offset(unit)
                        .map(|offset| DieRef { unit: index, offset })
                })
            }
            _ => None,
        }
    }

    fn attr_to_string(&self, unit: &Unit<OwnedReader>, value: AttributeValue<OwnedReader>) -> Option<String>
    {
        let reader = self.dwarf.attr_string(unit, value).ok()?;
        reader.to_string_lossy().ok().map(Cow::into_owned)
    }
}

impl DebugTree for DwarfImage
{
    type Node = DieRef;

    fn unit_count(&self) -> usize
    {
        self.units.len()
    }

    fn unit_nodes(&self, unit_index: usize) -> SymsnapResult<Vec<DieRef>>
    {
        let unit = self.unit(unit_index)?;
        let mut nodes = Vec::new();
        let mut cursor = unit.entries();
        while let Some((_delta, entry)) = cursor
            .next_dfs()
            .map_err(|err| map_dwarf_error("traversing DIE tree", err))?
        {
            nodes.push(DieRef {
                unit: unit_index,
                offset: entry.offset(),
            });
        }
        Ok(nodes)
    }

    fn children(&self, node: DieRef) -> SymsnapResult<Vec<DieRef>>
    {
        let unit = self.unit(node.unit)?;
        let mut tree = unit
            .entries_tree(Some(node.offset))
            .map_err(|err| map_dwarf_error("building DIE subtree", err))?;
        let root = tree.root().map_err(|err| map_dwarf_error("navigating DIE subtree", err))?;
        let mut children = root.children();
        let mut nodes = Vec::new();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating DIE children", err))?
        {
            nodes.push(DieRef {
                unit: node.unit,
                offset: child.entry().offset(),
            });
        }
        Ok(nodes)
    }

    fn attrs(&self, node: DieRef) -> SymsnapResult<NodeAttrs<DieRef>>
    {
        let unit = self.unit(node.unit)?;
        let entry = unit
            .entry(node.offset)
            .map_err(|err| map_dwarf_error("reading DIE", err))?;

        let mut attrs = NodeAttrs::new(map_tag(entry.tag()));
        let mut iter = entry.attrs();
        while let Some(attr) = iter
            .next()
            .map_err(|err| map_dwarf_error("reading DIE attributes", err))?
        {
            match attr.name() {
                constants::DW_AT_name => attrs.name = self.attr_to_string(unit, attr.value()),
                constants::DW_AT_byte_size => attrs.byte_size = attr.udata_value(),
                constants::DW_AT_type => attrs.type_ref = self.resolve_ref(node.unit, attr.value()),
                constants::DW_AT_abstract_origin | constants::DW_AT_specification => {
                    attrs.origin = self.resolve_ref(node.unit, attr.value());
                }
                constants::DW_AT_location => attrs.location = Some(location_of(&attr, unit.encoding())),
                constants::DW_AT_data_member_location => {
                    attrs.member_location = member_location_of(&attr, unit.encoding());
                }
                constants::DW_AT_upper_bound => attrs.upper_bound = attr.udata_value(),
                constants::DW_AT_count => attrs.count = attr.udata_value(),
                constants::DW_AT_decl_file => {
                    attrs.decl_file = match attr.value() {
                        AttributeValue::FileIndex(index) => Some(index),
                        _ => attr.udata_value(),
                    };
                }
                constants::DW_AT_decl_line => attrs.decl_line = attr.udata_value(),
                _ => {}
            }
        }
        Ok(attrs)
    }

    fn file_name(&self, node: DieRef, index: u64) -> Option<String>
    {
        let unit = self.units.get(node.unit)?;
        let program = unit.line_program.as_ref()?;
        let file = program.header().file(index)?;
        self.attr_to_string(unit, file.path_name())
    }
}

fn section_reader(file: &object::File<'_>, id: SectionId, endian: RunTimeEndian) -> OwnedReader
{
    let data = match file.section_by_name(id.name()).map(|section| section.uncompressed_data()) {
        Some(Ok(Cow::Borrowed(bytes))) => Arc::<[u8]>::from(bytes),
        Some(Ok(Cow::Owned(vec))) => Arc::<[u8]>::from(vec),
        Some(Err(err)) => {
            warn!(section = id.name(), error = %err, "failed to read section");
            Arc::<[u8]>::from(Vec::new())
        }
        None => Arc::<[u8]>::from(Vec::new()),
    };
    EndianArcSlice::new(data, endian)
}

fn map_tag(tag: constants::DwTag) -> Tag
{
    match tag {
        constants::DW_TAG_variable => Tag::Variable,
        constants::DW_TAG_member => Tag::Member,
        constants::DW_TAG_structure_type | constants::DW_TAG_class_type => Tag::Structure,
        constants::DW_TAG_union_type => Tag::Union,
        constants::DW_TAG_array_type => Tag::Array,
        constants::DW_TAG_subrange_type => Tag::Subrange,
        constants::DW_TAG_pointer_type
        | constants::DW_TAG_reference_type
        | constants::DW_TAG_rvalue_reference_type
        | constants::DW_TAG_ptr_to_member_type => Tag::Pointer,
        constants::DW_TAG_typedef => Tag::Typedef,
        constants::DW_TAG_const_type
        | constants::DW_TAG_volatile_type
        | constants::DW_TAG_restrict_type
        | constants::DW_TAG_atomic_type => Tag::Qualifier,
        constants::DW_TAG_base_type => Tag::BaseType,
        constants::DW_TAG_enumeration_type => Tag::Enumeration,
        _ => Tag::Other,
    }
}

fn location_of<R: Reader>(attr: &Attribute<R>, encoding: Encoding) -> Location
{
    let Some(expr) = attr.exprloc_value() else {
        return Location::Unsupported;
    };
    match decode_expression(expr, encoding) {
        Ok(ops) => Location::Expr(ops),
        Err(err) => {
            debug!(error = %err, "undecodable location expression");
            Location::Unsupported
        }
    }
}

fn member_location_of<R: Reader>(attr: &Attribute<R>, encoding: Encoding) -> Option<MemberLocation>
{
    if let Some(offset) = attr.udata_value() {
        return Some(MemberLocation::Constant(offset));
    }
    let expr = attr.exprloc_value()?;
    decode_expression(expr, encoding).ok().map(MemberLocation::Expr)
}

/// Decode a location expression into the operations symsnap interprets
pub fn decode_expression<R: Reader>(expr: Expression<R>, encoding: Encoding) -> SymsnapResult<Vec<LocationOp>>
{
    let mut ops = Vec::new();
    let mut iter = expr.operations(encoding);
    while let Some(op) = iter
        .next()
        .map_err(|err| map_dwarf_error("decoding location expression", err))?
    {
        ops.push(match op {
            Operation::Address { address } => LocationOp::Address(address),
            Operation::PlusConstant { value } => LocationOp::PlusConstant(value),
            _ => LocationOp::Other,
        });
    }
    Ok(ops)
}
