//! Target address-space layout.

use std::fmt;
use std::str::FromStr;

use crate::error::{SymsnapError, SymsnapResult};

/// Half-open address range `[start, end)`
///
/// Used to select which variables belong to an address space and to rebase
/// their addresses so the space starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow
{
    pub start: u64,
    pub end: u64,
}

impl AddressWindow
{
    /// Build a window, rejecting an end that precedes the start
    pub fn new(start: u64, end: u64) -> SymsnapResult<Self>
    {
        if end < start {
            return Err(SymsnapError::InvalidArgument(format!(
                "address window end 0x{end:x} precedes start 0x{start:x}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, address: u64) -> bool
    {
        address >= self.start && address < self.end
    }

    /// Offset of `address` from the window start, if it lies inside
    pub fn rebase(&self, address: u64) -> Option<u64>
    {
        self.contains(address).then(|| address - self.start)
    }
}

/// Which address space the symbol table is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressSpace
{
    /// Volatile working memory (registers, I/O and SRAM)
    #[default]
    Data,
    /// Persistent storage
    Eeprom,
}

/// Address-space boundaries of a target, in ELF address notation
///
/// AVR toolchains place every address space in one flat ELF address range:
/// data memory starts at `0x800000` and EEPROM at `0x810000`. The RAM start
/// marks where general purpose SRAM begins inside the data space, below it
/// live the register file and I/O registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLayout
{
    /// Start of the primary (data) address space
    pub data_start: u64,
    /// Start of the secondary (EEPROM) address space; end of the data space
    pub eeprom_start: u64,
    /// End of the EEPROM address space
    pub eeprom_end: u64,
    /// First SRAM offset inside the data space
    pub ram_start: u64,
}

impl TargetLayout
{
    /// Window of ELF addresses belonging to `space`
    pub fn window(&self, space: AddressSpace) -> SymsnapResult<AddressWindow>
    {
        match space {
            AddressSpace::Data => AddressWindow::new(self.data_start, self.eeprom_start),
            AddressSpace::Eeprom => AddressWindow::new(self.eeprom_start, self.eeprom_end),
        }
    }
}

impl Default for TargetLayout
{
    fn default() -> Self
    {
        TargetPreset::default().layout()
    }
}

/// Known parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetPreset
{
    #[default]
    Atmega328p,
    Atmega2560,
    Atmega32u4,
    Attiny85,
}

impl TargetPreset
{
    const AVR_DATA_START: u64 = 0x0080_0000;
    const AVR_EEPROM_START: u64 = 0x0081_0000;
    const AVR_EEPROM_END: u64 = 0x0082_0000;

    pub fn layout(self) -> TargetLayout
    {
        let ram_start = match self {
            TargetPreset::Atmega328p | TargetPreset::Atmega32u4 => 0x100,
            TargetPreset::Atmega2560 => 0x200,
            TargetPreset::Attiny85 => 0x60,
        };
        TargetLayout {
            data_start: Self::AVR_DATA_START,
            eeprom_start: Self::AVR_EEPROM_START,
            eeprom_end: Self::AVR_EEPROM_END,
            ram_start,
        }
    }
}

impl fmt::Display for TargetPreset
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            TargetPreset::Atmega328p => "atmega328p",
            TargetPreset::Atmega2560 => "atmega2560",
            TargetPreset::Atmega32u4 => "atmega32u4",
            TargetPreset::Attiny85 => "attiny85",
        };
        write!(f, "{label}")
    }
}

impl FromStr for TargetPreset
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "atmega328p" | "m328p" | "uno" => Ok(TargetPreset::Atmega328p),
            "atmega2560" | "m2560" | "mega" => Ok(TargetPreset::Atmega2560),
            "atmega32u4" | "m32u4" | "leonardo" => Ok(TargetPreset::Atmega32u4),
            "attiny85" | "t85" => Ok(TargetPreset::Attiny85),
            _ => Err(format!(
                "Unknown target: {s}. Use 'atmega328p', 'atmega2560', 'atmega32u4', or 'attiny85'"
            )),
        }
    }
}
