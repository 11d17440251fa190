//! In-place cabinet editing.
//!
//! All operations validate fully before mutating, so a failed call leaves the
//! [`Cabinet`](crate::Cabinet) exactly as it was. Names are matched
//! case-insensitively throughout, following Windows CE filesystem semantics.

mod editor;
