//! Intel HEX decoding.

use crate::error::{SymsnapError, SymsnapResult};

const DATA: u8 = 0x00;
const END_OF_FILE: u8 = 0x01;
const EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
const START_SEGMENT_ADDRESS: u8 = 0x03;
const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
const START_LINEAR_ADDRESS: u8 = 0x05;

/// A run of bytes at an absolute address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment
{
    pub start: u64,
    pub bytes: Vec<u8>,
}

impl Segment
{
    pub fn end(&self) -> u64
    {
        self.start + self.bytes.len() as u64
    }
}

/// One decoded record line
#[derive(Debug, Clone, PartialEq, Eq)]
struct Record
{
    kind: u8,
    offset: u16,
    data: Vec<u8>,
}

fn parse_record(line_no: usize, line: &str) -> SymsnapResult<Record>
{
    let Some(digits) = line.strip_prefix(':') else {
        return Err(SymsnapError::snapshot(line_no, "record does not start with ':'"));
    };
    let raw = hex::decode(digits).map_err(|err| SymsnapError::snapshot(line_no, format!("bad hex digits: {err}")))?;
    if raw.len() < 5 {
        return Err(SymsnapError::snapshot(line_no, "record too short"));
    }

    let count = usize::from(raw[0]);
    if raw.len() != count + 5 {
        return Err(SymsnapError::snapshot(
            line_no,
            format!("byte count {count} does not match record length {}", raw.len() - 5),
        ));
    }
    let sum = raw.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != 0 {
        return Err(SymsnapError::snapshot(line_no, "checksum mismatch"));
    }

    Ok(Record {
        kind: raw[3],
        offset: u16::from_be_bytes([raw[1], raw[2]]),
        data: raw[4..4 + count].to_vec(),
    })
}

fn upper_address(line_no: usize, record: &Record, shift: u32) -> SymsnapResult<u64>
{
    match record.data.as_slice() {
        [hi, lo] => Ok(u64::from(u16::from_be_bytes([*hi, *lo])) << shift),
        _ => Err(SymsnapError::snapshot(line_no, "address record must carry two bytes")),
    }
}

/// Decode Intel HEX text into address-ordered segments
///
/// Records may come in any order. Data records that continue one another
/// are merged; two records writing the same address are rejected. Decoding
/// stops at the end-of-file record; text after it is ignored. Start address
/// records are accepted and ignored.
pub fn parse(text: &str) -> SymsnapResult<Vec<Segment>>
{
    // Each run keeps the line of its first record for error reporting.
    let mut runs: Vec<(usize, Segment)> = Vec::new();
    let mut upper = 0u64;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = parse_record(line_no, line)?;
        match record.kind {
            DATA if record.data.is_empty() => {}
            DATA => {
                let start = upper + u64::from(record.offset);
                match runs.last_mut() {
                    Some((_, last)) if last.end() == start => last.bytes.extend_from_slice(&record.data),
                    _ => runs.push((
                        line_no,
                        Segment {
                            start,
                            bytes: record.data,
                        },
                    )),
                }
            }
            END_OF_FILE => break,
            EXTENDED_SEGMENT_ADDRESS => upper = upper_address(line_no, &record, 4)?,
            EXTENDED_LINEAR_ADDRESS => upper = upper_address(line_no, &record, 16)?,
            START_SEGMENT_ADDRESS | START_LINEAR_ADDRESS => {}
            kind => {
                return Err(SymsnapError::snapshot(line_no, format!("unknown record type {kind:02x}")));
            }
        }
    }

    runs.sort_by_key(|(_, segment)| segment.start);
    let mut merged: Vec<(usize, Segment)> = Vec::with_capacity(runs.len());
    for (line_no, segment) in runs {
        match merged.last_mut() {
            Some((last_line, last)) if segment.start < last.end() => {
                return Err(SymsnapError::snapshot(
                    line_no.max(*last_line),
                    format!("data at 0x{:x} overlaps an earlier record", segment.start),
                ));
            }
            Some((_, last)) if segment.start == last.end() => last.bytes.extend_from_slice(&segment.bytes),
            _ => merged.push((line_no, segment)),
        }
    }
    Ok(merged.into_iter().map(|(_, segment)| segment).collect())
}
