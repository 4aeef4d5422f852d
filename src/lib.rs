//! Library to dump several MySQL/MariaDB servers into a timestamped,
//! host-partitioned directory tree and to prune old runs.
//!
//! ```text
//! <backup_root>/<YYYY-MM-DD HHMMSS>/
//!     logs.txt
//!     <host>/<database>.sql
//! ```
//!
//! The [`orchestrator`] walks the connections loaded by [`connections`] and
//! hands every database to a [`backends::Dumper`]. Old runs are removed by
//! [`util::retention`].

#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod connections;
pub mod orchestrator;
pub mod run;
pub mod util;
