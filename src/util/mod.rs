//! Filesystem helpers shared by the run and the retention.

pub mod dir;
pub mod retention;
