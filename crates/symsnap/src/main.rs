use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgGroup, Parser, ValueEnum};
use symsnap_core::annotate::{annotate, write_listing, AnnotateOptions, DEFAULT_NAME_WIDTH};
use symsnap_core::debug::DwarfImage;
use symsnap_core::report::{write_map, write_usage};
use symsnap_core::snapshot::{Snapshot, SnapshotFormat};
use symsnap_core::symbols::{collect_symbols, EnumerateOptions};
use symsnap_core::types::{AddressSpace, AddressWindow, TargetLayout, TargetPreset};
use symsnap_core::{Entry, SymsnapError, SymsnapResult};
use symsnap_utils::{info, init_logging, warn, LogLevel};

/// Exit status for malformed input data (sysexits.h `EX_DATAERR`)
const EX_DATAERR: i32 = 65;

/// Rebuild a firmware's variable map from DWARF and lay a memory snapshot over it.
#[derive(Parser, Debug)]
#[command(name = "symsnap")]
#[command(version)]
#[command(about = "Rebuild a firmware's variable map from DWARF and lay a memory snapshot over it", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["dump", "map", "usage"])))]
struct Cli
{
    /// ELF image with DWARF debug information
    elf: PathBuf,

    /// Annotate a memory snapshot (Intel HEX or raw binary)
    #[arg(long, value_name = "FILE")]
    dump: Option<PathBuf>,
    /// Print the flat symbol map
    #[arg(long)]
    map: bool,
    /// Print a memory usage tree in KDirStat cache format
    #[arg(long)]
    usage: bool,

    /// Do not report unknown bytes between symbols or structure members
    #[arg(long)]
    no_gaps: bool,
    /// Report structure variables as one entry instead of one per member
    #[arg(long)]
    no_structs: bool,
    /// Report symbols that start inside the previous one
    #[arg(long)]
    overlaps: bool,
    /// Width of the name column in the annotated listing
    #[arg(long, default_value_t = DEFAULT_NAME_WIDTH)]
    width: usize,

    /// Report EEPROM variables instead of data memory
    #[arg(long)]
    eeprom: bool,
    /// Target part providing the address-space layout
    #[arg(long, default_value_t = TargetPreset::default())]
    target: TargetPreset,
    /// Override the data space start (hex format: 0x800000 or decimal)
    #[arg(long, value_parser = parse_address)]
    data_start: Option<u64>,
    /// Override the EEPROM space start
    #[arg(long, value_parser = parse_address)]
    eeprom_start: Option<u64>,
    /// Override the EEPROM space end
    #[arg(long, value_parser = parse_address)]
    eeprom_end: Option<u64>,
    /// Override the first SRAM offset used by --usage
    #[arg(long, value_parser = parse_address)]
    ram_start: Option<u64>,

    /// Snapshot encoding; guessed from the file extension when omitted
    #[arg(long, value_enum)]
    dump_format: Option<DumpFormat>,
    /// Address of the first byte of a raw binary snapshot
    #[arg(long, value_parser = parse_address, default_value = "0")]
    dump_base: u64,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<LogLevel>,
    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum DumpFormat
{
    /// Intel HEX records
    Ihex,
    /// Raw bytes placed at --dump-base
    Bin,
}

impl From<DumpFormat> for SnapshotFormat
{
    fn from(format: DumpFormat) -> Self
    {
        match format {
            DumpFormat::Ihex => SnapshotFormat::IntelHex,
            DumpFormat::Bin => SnapshotFormat::Binary,
        }
    }
}

/// What the run produces; exactly one is selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode
{
    Dump(PathBuf),
    Map,
    Usage,
}

impl Cli
{
    fn mode(&self) -> Mode
    {
        match &self.dump {
            Some(path) => Mode::Dump(path.clone()),
            None if self.map => Mode::Map,
            None => Mode::Usage,
        }
    }

    /// Preset layout with command line overrides applied
    fn layout(&self) -> TargetLayout
    {
        let mut layout = self.target.layout();
        if let Some(start) = self.data_start {
            layout.data_start = start;
        }
        if let Some(start) = self.eeprom_start {
            layout.eeprom_start = start;
        }
        if let Some(end) = self.eeprom_end {
            layout.eeprom_end = end;
        }
        if let Some(start) = self.ram_start {
            layout.ram_start = start;
        }
        layout
    }

    fn space(&self) -> AddressSpace
    {
        if self.eeprom {
            AddressSpace::Eeprom
        } else {
            AddressSpace::Data
        }
    }
}

/// Parse an address given in hex (`0x` prefix) or decimal
fn parse_address(s: &str) -> Result<u64, String>
{
    let s = s.trim();
    let digits = s.replace('_', "");
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    };
    parsed.map_err(|e| format!("Invalid address '{s}': {e}"))
}

fn main()
{
    let cli = Cli::parse();

    let guard = match init_logging(cli.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        drop(guard);
        process::exit(exit_code(&e));
    }
}

/// Process exit status for a failed run
fn exit_code(error: &SymsnapError) -> i32
{
    if error.is_data_error() { EX_DATAERR } else { 1 }
}

fn run(cli: &Cli) -> SymsnapResult<()>
{
    let layout = cli.layout();
    let space = cli.space();
    let window = layout.window(space)?;
    let mode = cli.mode();
    info!(?mode, ?space, target = %cli.target, "starting");

    // A bad snapshot must fail before anything is written.
    let snapshot = match &mode {
        Mode::Dump(path) => Some(load_snapshot(cli, path, &window)?),
        Mode::Map | Mode::Usage => None,
    };

    let image = DwarfImage::open(&cli.elf)?;
    if !image.has_debug_info() {
        warn!(elf = %cli.elf.display(), "no DWARF debug information found");
    }

    let options = EnumerateOptions {
        window,
        expand_structs: !cli.no_structs,
        fill_gaps: !cli.no_gaps,
    };
    let entries = collect_symbols(&image, &options);

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match (&mode, snapshot) {
        (Mode::Dump(_), Some(snapshot)) => write_dump(cli, &mut out, &entries, &snapshot)?,
        (Mode::Map, _) => write_map(&mut out, &entries)?,
        (Mode::Usage, _) => {
            // Register and I/O space only exists in the data space.
            let ram_start = match space {
                AddressSpace::Data => layout.ram_start,
                AddressSpace::Eeprom => 0,
            };
            write_usage(&mut out, &entries, ram_start)?;
        }
        (Mode::Dump(_), None) => {}
    }

    out.flush()?;
    Ok(())
}

fn load_snapshot(cli: &Cli, path: &Path, window: &AddressWindow) -> SymsnapResult<Snapshot>
{
    let format = cli
        .dump_format
        .map_or_else(|| SnapshotFormat::from_path(path), SnapshotFormat::from);
    let mut snapshot = Snapshot::load(path, format, cli.dump_base)?;
    snapshot.rebase_into(window);
    info!(
        base = %format!("0x{:06x}", snapshot.base()),
        len = snapshot.data().len(),
        ranges = snapshot.ranges().len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

fn write_dump<W: Write>(cli: &Cli, out: &mut W, entries: &[Entry], snapshot: &Snapshot) -> SymsnapResult<()>
{
    let options = AnnotateOptions {
        width: cli.width,
        gaps: !cli.no_gaps,
        overlaps: cli.overlaps,
    };
    let lines = annotate(entries, snapshot.base(), snapshot.data(), &options);
    write_listing(out, &lines, cli.width)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error>
    {
        Cli::try_parse_from(std::iter::once("symsnap").chain(args.iter().copied()))
    }

    #[test]
    fn test_exactly_one_mode_is_required()
    {
        assert!(parse(&["fw.elf"]).is_err());
        assert!(parse(&["fw.elf", "--map", "--usage"]).is_err());
        assert!(parse(&["fw.elf", "--map", "--dump", "ram.hex"]).is_err());
        assert_eq!(parse(&["fw.elf", "--map"]).unwrap().mode(), Mode::Map);
        assert_eq!(parse(&["fw.elf", "--usage"]).unwrap().mode(), Mode::Usage);
        assert_eq!(
            parse(&["fw.elf", "--dump", "ram.hex"]).unwrap().mode(),
            Mode::Dump(PathBuf::from("ram.hex"))
        );
    }

    #[test]
    fn test_defaults()
    {
        let cli = parse(&["fw.elf", "--map"]).unwrap();
        assert_eq!(cli.width, DEFAULT_NAME_WIDTH);
        assert_eq!(cli.target, TargetPreset::Atmega328p);
        assert_eq!(cli.dump_base, 0);
        assert_eq!(cli.space(), AddressSpace::Data);
        assert!(!cli.no_gaps && !cli.no_structs && !cli.overlaps);
    }

    #[test]
    fn test_layout_overrides()
    {
        let cli = parse(&[
            "fw.elf",
            "--usage",
            "--target",
            "atmega2560",
            "--ram-start",
            "0x300",
            "--eeprom-end",
            "8458240",
        ])
        .unwrap();
        let layout = cli.layout();
        assert_eq!(layout.ram_start, 0x300);
        assert_eq!(layout.eeprom_end, 0x81_0000 + 0x1000);
        assert_eq!(layout.data_start, 0x80_0000);
    }

    #[test]
    fn test_dump_format_flag()
    {
        let cli = parse(&["fw.elf", "--dump", "ram.img", "--dump-format", "bin", "--dump-base", "0x100"]).unwrap();
        assert_eq!(cli.dump_format.map(SnapshotFormat::from), Some(SnapshotFormat::Binary));
        assert_eq!(cli.dump_base, 0x100);
        assert!(parse(&["fw.elf", "--dump", "ram.img", "--dump-format", "srec"]).is_err());
    }

    #[test]
    fn test_parse_address()
    {
        assert_eq!(parse_address("0x800100"), Ok(0x80_0100));
        assert_eq!(parse_address("0X10"), Ok(16));
        assert_eq!(parse_address("256"), Ok(256));
        assert_eq!(parse_address("0x80_0000"), Ok(0x80_0000));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_exit_codes()
    {
        let bad_snapshot = Snapshot::parse_ihex(":0100000000FE\n").unwrap_err();
        assert_eq!(exit_code(&bad_snapshot), EX_DATAERR);

        let missing = SymsnapError::Io(io::Error::new(io::ErrorKind::NotFound, "firmware.elf"));
        assert_eq!(exit_code(&missing), 1);
        assert_eq!(exit_code(&SymsnapError::ObjectParse("truncated".to_string())), 1);
    }

    #[test]
    fn test_log_level_and_output()
    {
        let cli = parse(&["fw.elf", "--map", "--log-level", "debug", "-o", "map.tsv"]).unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert_eq!(cli.output, Some(PathBuf::from("map.tsv")));
    }
}
