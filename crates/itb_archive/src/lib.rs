//! This library handles reading and unpacking **ITB** resource archives.
//!
//! # ITB Archive Format Documentation
//!
//! An ITB resource file (usually `resource.dat`) is a flat container of named files. There is no
//! compression and no checksum; the archive is a header, an index table, and the file entries
//! stored back to back. Everything can be read in a single forward pass, which is how this crate
//! reads it.
//!
//! ## File Structure
//!
//! | Offset (bytes)       | Field          | Description                                          |
//! |----------------------|----------------|------------------------------------------------------|
//! | 0x0000               | Entry Count    | 4 bytes: Number of files stored in the archive       |
//! | 0x0004               | Index Table    | (Entry Count * 4) bytes: Opaque, skipped when read   |
//! | 0x0004 + Count * 4   | Entries        | Entry records, back to back without padding          |
//!
//! ### Index Table
//!
//! The index table holds one 4-byte value per entry. Its contents are not needed to unpack the
//! archive and are never interpreted; only its length matters.
//!
//! ### Entry
//!
//! | Offset (bytes) | Field          | Description                                             |
//! |----------------|----------------|---------------------------------------------------------|
//! | 0x0000         | Payload Length | 4 bytes: Size of the file data                          |
//! | 0x0004         | Name Length    | 4 bytes: Size of the name                               |
//! | 0x0008         | Name           | (Name Length) bytes: `/` separated path, no terminator  |
//! | 0x0008 + Name  | Payload        | (Payload Length) bytes: Raw file contents               |
//!
//! - **Name**: A relative path using `/` between components. The encoding is undefined; names
//!   are used as raw bytes on Unix and decoded lossily as UTF-8 elsewhere.
//!
//! ## Additional Information
//!
//! - **File Name**: `resource.dat`
//! - **Endianness**: Little-endian for all multi-byte integers
//!
//! ```no_run
//! fn unpack() -> itb_archive::error::Result<()> {
//!     let file = std::fs::File::open("resource.dat")?;
//!     itb_archive::extract(std::io::BufReader::new(file), "out")
//! }
//! ```

pub mod error;
pub mod options;
pub mod path;
pub mod read;
pub mod types;

use std::{io::Read, path::Path};

pub use options::ExtractOptions;
pub use read::{ItbArchive, ItbEntry};

/// Separator used between the components of entry names
pub const SEPARATOR: u8 = b'/';

/// Default upper bound for the length of an entry name, in bytes
///
/// Matches `PATH_MAX` on Linux.
pub const MAX_NAME_LENGTH: u32 = 4096;

/// Unpack every entry of the archive in `reader` below `destination` using the default options.
pub fn extract<R: Read>(reader: R, destination: impl AsRef<Path>) -> error::Result<()> {
    ItbArchive::new(reader)?.extract(destination, &ExtractOptions::default())?;
    Ok(())
}
