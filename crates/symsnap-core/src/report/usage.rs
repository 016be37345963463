//! Memory usage tree in KDirStat cache format.
//!
//! Symbol names are treated as paths: `cfg.gains[1]` becomes the file `[1]`
//! in directory `/cfg/gains`. Disk usage viewers that read KDirStat caches
//! (KDirStat, QDirStat, WinDirStat) then show where RAM goes.

use std::io::Write;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::SymsnapResult;
use crate::types::Entry;

pub const KDIRSTAT_BANNER: &str = "[kdirstat 2.0 cache file]";

/// Split a flattened symbol name into path segments
///
/// Members are separated by `.` and every non-empty bracketed index is a
/// segment of its own. An empty `[]` stays attached to its name, so string
/// leaves keep their `name[]` spelling.
pub fn split_path(name: &str) -> Vec<String>
{
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' if chars.peek() == Some(&']') => current.push('['),
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut index = String::from("[");
                for c in chars.by_ref() {
                    index.push(c);
                    if c == ']' {
                        break;
                    }
                }
                segments.push(index);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// One directory of the usage tree; children keep insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDir
{
    pub files: IndexMap<String, u64>,
    pub dirs: IndexMap<String, UsageDir>,
}

/// A directory segment renamed because a file already held its name
///
/// `prefix` is the path up to and including the original segment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rename
{
    prefix: Vec<String>,
    name: String,
}

impl UsageDir
{
    /// Add one leaf; `previous` is the directory rename made for the entry
    /// inserted just before, reused when this entry continues that variable
    fn insert(&mut self, segments: &[String], size: u64, loc: u64, previous: Option<&Rename>) -> Option<Rename>
    {
        let (leaf, parents) = segments.split_last()?;

        let mut rename = None;
        let mut dir = self;
        for (depth, segment) in parents.iter().enumerate() {
            let name = if dir.files.contains_key(segment) {
                let prefix = &segments[..=depth];
                let name = match previous {
                    Some(previous) if previous.prefix == prefix => previous.name.clone(),
                    _ => {
                        let renamed = format!("{segment}_{loc:x}");
                        debug!(from = %segment, to = %renamed, "renaming directory colliding with a leaf");
                        renamed
                    }
                };
                rename.get_or_insert_with(|| Rename {
                    prefix: prefix.to_vec(),
                    name: name.clone(),
                });
                name
            } else {
                segment.clone()
            };
            dir = dir.dirs.entry(name).or_default();
        }

        let name = if dir.files.contains_key(leaf) || dir.dirs.contains_key(leaf) {
            let renamed = format!("{leaf}_{loc:x}");
            debug!(from = %leaf, to = %renamed, "renaming colliding usage leaf");
            renamed
        } else {
            leaf.clone()
        };
        dir.files.insert(name, size);
        rename
    }

    fn write<W: Write>(&self, out: &mut W, path: &str) -> SymsnapResult<()>
    {
        writeln!(out, "D\t{path}\t0\t0x0")?;
        for (name, size) in &self.files {
            writeln!(out, "F\t{name}\t{size}\t0x0")?;
        }
        for (name, dir) in &self.dirs {
            let child = if path == "/" {
                format!("/{name}")
            } else {
                format!("{path}/{name}")
            };
            dir.write(out, &child)?;
        }
        Ok(())
    }
}

/// Hierarchical view of the symbols living in RAM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTree
{
    pub root: UsageDir,
}

impl UsageTree
{
    /// Build the tree from sorted entries, ignoring everything below
    /// `ram_start` (register file and I/O space)
    pub fn build(entries: &[Entry], ram_start: u64) -> Self
    {
        let mut root = UsageDir::default();
        let mut previous = None;
        for entry in entries.iter().filter(|entry| entry.loc >= ram_start) {
            previous = root.insert(&split_path(&entry.name), entry.size, entry.loc, previous.as_ref());
        }
        Self { root }
    }

    /// Emit the tree as a KDirStat cache file
    pub fn write<W: Write>(&self, out: &mut W) -> SymsnapResult<()>
    {
        writeln!(out, "{KDIRSTAT_BANNER}")?;
        self.root.write(out, "/")
    }
}

/// Build and write the usage report in one step
pub fn write_usage<W: Write>(out: &mut W, entries: &[Entry], ram_start: u64) -> SymsnapResult<()>
{
    UsageTree::build(entries, ram_start).write(out)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn total_size(dir: &UsageDir) -> u64
    {
        dir.files.values().sum::<u64>() + dir.dirs.values().map(total_size).sum::<u64>()
    }

    fn render(entries: &[Entry], ram_start: u64) -> String
    {
        let mut out = Vec::new();
        write_usage(&mut out, entries, ram_start).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_split_path()
    {
        assert_eq!(split_path("a.b[01][2]"), ["a", "b", "[01]", "[2]"]);
        assert_eq!(split_path("cfg.*UNKNOWN*"), ["cfg", "*UNKNOWN*"]);
        assert_eq!(split_path("label[]"), ["label[]"]);
        assert_eq!(split_path("plain"), ["plain"]);
    }

    #[test]
    fn test_tree_layout()
    {
        let entries = [
            Entry::new("io", 0x20, 1, ""),
            Entry::new("ticks", 0x100, 4, ""),
            Entry::new("cfg.mode", 0x104, 1, ""),
            Entry::new("cfg.gain[0]", 0x105, 2, ""),
            Entry::new("cfg.gain[1]", 0x107, 2, ""),
            Entry::new("banner[]", 0x109, 8, ""),
        ];
        assert_eq!(
            render(&entries, 0x100),
            "[kdirstat 2.0 cache file]\n\
             D\t/\t0\t0x0\n\
             F\tticks\t4\t0x0\n\
             F\tbanner[]\t8\t0x0\n\
             D\t/cfg\t0\t0x0\n\
             F\tmode\t1\t0x0\n\
             D\t/cfg/gain\t0\t0x0\n\
             F\t[0]\t2\t0x0\n\
             F\t[1]\t2\t0x0\n"
        );
    }

    #[test]
    fn test_colliding_leaf_is_renamed()
    {
        let entries = [Entry::new("cfg.x", 0x100, 1, ""), Entry::new("cfg.x", 0x1a0, 2, "")];
        let tree = UsageTree::build(&entries, 0x100);
        let cfg = &tree.root.dirs["cfg"];
        assert_eq!(cfg.files.keys().collect::<Vec<_>>(), ["x", "x_1a0"]);
        assert_eq!(total_size(&tree.root), 3);
    }

    #[test]
    fn test_directory_colliding_with_leaf_is_renamed()
    {
        let entries = [Entry::new("state", 0x100, 1, ""), Entry::new("state.flag", 0x110, 1, "")];
        let tree = UsageTree::build(&entries, 0x100);
        assert!(tree.root.files.contains_key("state"));
        assert!(tree.root.dirs.contains_key("state_110"));
    }

    #[test]
    fn test_colliding_variable_keeps_one_directory()
    {
        let entries = [
            Entry::new("state", 0x100, 1, ""),
            Entry::new("state.flag", 0x110, 1, ""),
            Entry::new("state.mode", 0x111, 1, ""),
            Entry::new("state.*UNKNOWN*", 0x112, 2, ""),
            Entry::new("other", 0x114, 1, ""),
            Entry::new("state.flag", 0x120, 1, ""),
        ];
        let tree = UsageTree::build(&entries, 0x100);
        assert_eq!(tree.root.dirs.keys().collect::<Vec<_>>(), ["state_110", "state_120"]);
        assert_eq!(
            tree.root.dirs["state_110"].files.keys().collect::<Vec<_>>(),
            ["flag", "mode", "*UNKNOWN*"]
        );
        assert_eq!(total_size(&tree.root), 7);
    }
}
