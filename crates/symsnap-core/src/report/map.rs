//! Flat symbol map.

use std::io::Write;

use crate::error::SymsnapResult;
use crate::types::Entry;

pub const MAP_HEADER: &str = "OFFSET\tSIZE\tNAME\tDECLPOS";

/// Write every entry as one tab-separated row under [`MAP_HEADER`]
pub fn write_map<W: Write>(out: &mut W, entries: &[Entry]) -> SymsnapResult<()>
{
    writeln!(out, "{MAP_HEADER}")?;
    for entry in entries {
        writeln!(out, "0x{:06x}\t{}\t{}\t{}", entry.loc, entry.size, entry.name, entry.declpos)?;
    }
    Ok(())
}
