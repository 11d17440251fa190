//! # cabforge
//!
//! A pure-Rust engine for layout-preserving editing of Microsoft Cabinet
//! (CAB) archives, built for Windows CE deployment cabinets.
//!
//! Deployment cabinets are picky: device installers care about the reserve
//! areas, the set identifier, the order of file entries, and which folder a
//! file's bytes live in. This crate parses a cabinet into an editable
//! in-memory [`Cabinet`], lets you add, replace, and remove files, and writes
//! the result back with every layout-relevant characteristic of the source
//! preserved. Cabinets carrying a `_setup.xml` deployment manifest get their
//! file mappings kept in sync automatically.
//!
//! ## Quick Start
//!
//! ### Inspecting a Cabinet
//!
//! ```rust,no_run
//! use cabforge::{Cabinet, Result};
//!
//! fn main() -> Result<()> {
//!     let cab = Cabinet::parse_path("install.cab")?;
//!     for record in cab.records() {
//!         println!(
//!             "{}: {} bytes -> {}",
//!             record.name,
//!             record.size,
//!             record.install_dir.as_deref().unwrap_or("(unmapped)"),
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Editing and Repacking
//!
//! ```rust,no_run
//! use cabforge::{Cabinet, Result};
//!
//! fn main() -> Result<()> {
//!     let mut cab = Cabinet::parse_path("install.cab")?;
//!     cab.replace_file("APP~1.EXE", std::fs::read("app.exe")?)?;
//!     cab.add_file("README.TXT", b"hello".to_vec(), 0x20)?;
//!     cab.write_to("install-patched.cab")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Scope
//!
//! Single-cabinet archives with stored or MSZIP folders. Chained
//! multi-cabinet sets and the LZX/Quantum schemes are rejected at parse
//! time. Authenticode signatures can be [probed](signature::probe_signature)
//! but not verified or re-created.

pub mod checksum;
pub mod codec;
mod document;
pub mod edit;
mod error;
pub mod format;
pub mod manifest;
pub mod signature;
pub mod write;

pub use document::{Cabinet, DataBlock, FileEntry, FileSummary, Folder, MANIFEST_NAME};
pub use error::{EditError, Error, FormatError, Result, WriteError};
pub use manifest::{ManifestEntry, ManifestError, SetupManifest};
pub use signature::{SignatureStatus, probe_signature};
