//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`] raised while reading the archive
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// archive ended while reading {what} at offset {offset}
    #[error("archive ended while reading {what} at offset {offset}{}", entry_suffix(.entry))]
    #[diagnostic(
        code(itb::truncated_stream),
        help("the archive is truncated or is not an ITB resource file")
    )]
    TruncatedStream {
        /// The field or block that could not be read in full
        what: &'static str,
        /// Offset from the start of the archive where the read began
        offset: u64,
        /// Index of the entry being read, if any
        entry: Option<u32>,
    },

    /// name is {length} bytes, longer than the limit of {max}
    #[error("name is {length} bytes, longer than the limit of {max}{}", entry_suffix(.entry))]
    #[diagnostic(code(itb::name_too_long))]
    NameTooLong {
        /// Index of the offending entry, if known
        entry: Option<u32>,
        /// Declared length of the name
        length: u32,
        /// The configured limit
        max: u32,
    },

    /// entry name {name:?} does not describe a file below the destination
    #[error("entry name {name:?} does not describe a file below the destination")]
    #[diagnostic(code(itb::unsafe_name))]
    UnsafeName {
        /// The entry name, lossily decoded
        name: String,
    },

    /// unable to create directory {path}
    #[error("unable to create directory {}", .path.display())]
    #[diagnostic(code(itb::directory_create_failed))]
    DirectoryCreateFailed {
        /// The directory that could not be created
        path: PathBuf,
        /// Cause reported by the filesystem
        #[source]
        source: std::io::Error,
    },

    /// unable to create output file {path}
    #[error("unable to create output file {}", .path.display())]
    #[diagnostic(
        code(itb::output_open_failed),
        help("the path may already exist as a directory, or the destination is not writable")
    )]
    OutputOpenFailed {
        /// The file that could not be created
        path: PathBuf,
        /// Cause reported by the filesystem
        #[source]
        source: std::io::Error,
    },

    /// unable to write to output file {path}
    #[error("unable to write to output file {}", .path.display())]
    #[diagnostic(code(itb::output_write_failed))]
    OutputWriteFailed {
        /// The file being written
        path: PathBuf,
        /// Cause reported by the filesystem
        #[source]
        source: std::io::Error,
    },

    /// failed to allocate {size} bytes
    #[error("failed to allocate {size} bytes")]
    #[diagnostic(code(itb::allocation_failed))]
    AllocationFailed {
        /// Size of the requested buffer
        size: usize,
        /// Cause reported by the allocator
        #[source]
        source: std::collections::TryReserveError,
    },
}

fn entry_suffix(entry: &Option<u32>) -> String {
    entry.map(|i| format!(" (entry {i})")).unwrap_or_default()
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
