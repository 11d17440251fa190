//! Cabinet serialization.
//!
//! The writer re-derives everything derivable (offsets, counts, sizes, block
//! layout, checksums) from the in-memory model and reproduces everything
//! layout-relevant verbatim: the reserve flag and declared reserve sizes, the
//! header reserve bytes, per-folder reserve blocks and compression values,
//! the set identifier, and the file sequence with its folder assignments.
//! A written image parses back to an equivalent model.

mod writer;
