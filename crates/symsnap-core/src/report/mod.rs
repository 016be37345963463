//! # Reports
//!
//! Text renderings of the sorted symbol list that do not need a snapshot.

pub mod map;
pub mod usage;

pub use map::{write_map, MAP_HEADER};
pub use usage::{split_path, write_usage, UsageDir, UsageTree, KDIRSTAT_BANNER};
