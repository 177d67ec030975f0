//! Types for reading ITB archives
//!

use binrw::BinRead;
use std::{
    fmt::{self, Debug},
    io::{self, Cursor, Read, Write},
    path::Path,
};
use tracing::{debug, info, instrument};

use crate::{
    error::{Error, Result},
    options::ExtractOptions,
    path::{ensure_directories, StdDirBuilder},
    types::{EntryHeader, ItbHeader},
    MAX_NAME_LENGTH, SEPARATOR,
};

/// The input stream together with the bookkeeping needed to report precise offsets
struct Source<R> {
    reader: R,
    /// Bytes consumed from the start of the archive
    position: u64,
    /// Payload bytes of the current entry that have not been consumed yet
    unread: u64,
}

impl<R: Read> Source<R> {
    fn fill(&mut self, buf: &mut [u8], what: &'static str, entry: Option<u32>) -> Result<()> {
        let offset = self.position;
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedStream {
                what,
                offset,
                entry,
            },
            _ => Error::IOError(e),
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn skip(&mut self, len: u64, what: &'static str, entry: Option<u32>) -> Result<()> {
        let offset = self.position;
        let skipped = io::copy(&mut self.reader.by_ref().take(len), &mut io::sink())?;
        self.position += skipped;
        if skipped < len {
            return Err(Error::TruncatedStream {
                what,
                offset,
                entry,
            });
        }
        Ok(())
    }
}

/// A struct for reading an entry from an ITB file
///
/// Reading yields the payload of the entry and nothing more. Whatever is left unread is skipped
/// when the next entry is requested from the [`ItbArchive`].
pub struct ItbEntry<'a, R> {
    index: u32,
    name: Box<[u8]>,
    size: u64,
    data_start: u64,
    source: &'a mut Source<R>,
}

impl<R> Debug for ItbEntry<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ItbEntry")
            .field("index", &self.index)
            .field("name", &self.name())
            .field("size", &self.size)
            .field("data_start", &self.data_start)
            .finish()
    }
}

/// Methods for retrieving information on ITB file entries
impl<R> ItbEntry<'_, R> {
    /// Position of the entry in the archive, starting at 0
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the name of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Use [`crate::path::ensure_directories`]
    /// to turn it into a path below a destination.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Get the name of the file, in the raw (internal) byte representation.
    ///
    /// The encoding of this data is undefined.
    pub fn name_raw(&self) -> &[u8] {
        &self.name
    }

    /// Get the size of the file, in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the offset of the file data from the start of the archive
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Offset of the next payload byte to be read
    fn position(&self) -> u64 {
        self.source.position
    }
}

impl<R: Read> Read for ItbEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.source.unread;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let read = self.source.reader.read(&mut buf[..len])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive ended inside entry data",
            ));
        }

        self.source.unread -= read as u64;
        self.source.position += read as u64;
        Ok(read)
    }
}

/// ITB archive reader
///
/// The archive is read in a single forward pass, entries are handed out one at a time.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_itb_contents(reader: impl Read) -> itb_archive::error::Result<()> {
///     let mut itb = itb_archive::ItbArchive::new(reader)?;
///
///     while let Some(mut file) = itb.next_entry()? {
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct ItbArchive<R> {
    source: Source<R>,
    header: ItbHeader,
    next_index: u32,
    max_name_length: u32,
}

impl<R> ItbArchive<R> {
    /// Number of entries declared by this ITB.
    pub fn len(&self) -> usize {
        self.header.entry_count as usize
    }

    /// Whether this ITB archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries handed out by [`ItbArchive::next_entry`] so far
    pub fn entries_read(&self) -> u32 {
        self.next_index
    }

    /// Offset of the reader from the start of the archive
    pub fn position(&self) -> u64 {
        self.source.position
    }

    /// Limit the length of entry names, see [`crate::MAX_NAME_LENGTH`]
    pub fn with_max_name_length(mut self, max_name_length: u32) -> Self {
        self.max_name_length = max_name_length;
        self
    }

    /// Unwrap and return the inner reader object
    ///
    /// The reader is positioned wherever the last read stopped.
    pub fn into_inner(self) -> R {
        self.source.reader
    }
}

impl<R: Read> ItbArchive<R> {
    /// Read the header of an ITB archive and skip past its index table.
    #[instrument(skip_all)]
    pub fn new(reader: R) -> Result<ItbArchive<R>> {
        let mut source = Source {
            reader,
            position: 0,
            unread: 0,
        };

        let mut raw = [0u8; ItbHeader::SIZE];
        source.fill(&mut raw, "header", None)?;
        let header = ItbHeader::read(&mut Cursor::new(raw))?;
        debug!("archive declares {} entries", header.entry_count);

        source.skip(header.index_table_size(), "index table", None)?;

        Ok(ItbArchive {
            source,
            header,
            next_index: 0,
            max_name_length: MAX_NAME_LENGTH,
        })
    }

    /// Advance to the next entry in the archive.
    ///
    /// Returns `Ok(None)` once every declared entry has been read. Any data of the previous entry
    /// that was not read is skipped first.
    pub fn next_entry(&mut self) -> Result<Option<ItbEntry<'_, R>>> {
        if self.source.unread > 0 {
            let unread = self.source.unread;
            self.source.unread = 0;
            self.source
                .skip(unread, "entry data", self.next_index.checked_sub(1))?;
        }

        if self.next_index >= self.header.entry_count {
            return Ok(None);
        }
        let index = self.next_index;

        let mut raw = [0u8; EntryHeader::SIZE];
        self.source.fill(&mut raw, "entry header", Some(index))?;
        let record = EntryHeader::read(&mut Cursor::new(raw))?;

        if record.name_length > self.max_name_length {
            return Err(Error::NameTooLong {
                entry: Some(index),
                length: record.name_length,
                max: self.max_name_length,
            });
        }

        let mut name = allocate(record.name_length as usize)?;
        self.source.fill(&mut name, "entry name", Some(index))?;

        debug!(
            index,
            payload_length = record.payload_length,
            name_length = record.name_length,
            "read entry header"
        );

        self.next_index += 1;
        self.source.unread = u64::from(record.payload_length);

        Ok(Some(ItbEntry {
            index,
            name: name.into_boxed_slice(),
            size: u64::from(record.payload_length),
            data_start: self.source.position,
            source: &mut self.source,
        }))
    }

    /// Unpack every remaining entry below `destination`.
    ///
    /// Entries are written one after another, each output file is closed before the next entry
    /// is read. The first failure stops the run; files written up to that point stay on disk,
    /// including a partially written file for the failing entry.
    ///
    /// Entry names are bounded by the limit set with [`ItbArchive::with_max_name_length`].
    #[instrument(skip_all, fields(destination = %destination.as_ref().display()))]
    pub fn extract(mut self, destination: impl AsRef<Path>, options: &ExtractOptions) -> Result<()> {
        let destination = destination.as_ref();

        let mut buffer = allocate(options.effective_chunk_size())?;
        let mut dirs = StdDirBuilder;
        let max_name_length = self.max_name_length;

        info!("Unpacking {} files", self.len());

        while let Some(mut entry) = self.next_entry()? {
            info!("{}", entry.name());

            let path = ensure_directories(
                &mut dirs,
                destination,
                entry.name_raw(),
                SEPARATOR,
                max_name_length,
            )
            .map_err(|e| match e {
                Error::NameTooLong { length, max, .. } => Error::NameTooLong {
                    entry: Some(entry.index()),
                    length,
                    max,
                },
                e => e,
            })?;

            let mut out = options
                .create_output(&path)
                .map_err(|source| Error::OutputOpenFailed {
                    path: path.clone(),
                    source,
                })?;

            copy_entry(&mut entry, &mut out, &mut buffer, &path)?;
        }

        Ok(())
    }
}

/// Move the payload of `entry` into `out`, one chunk of `buffer` at a time.
fn copy_entry<R: Read, W: Write>(
    entry: &mut ItbEntry<'_, R>,
    out: &mut W,
    buffer: &mut [u8],
    path: &Path,
) -> Result<()> {
    let mut remaining = entry.size();
    while remaining > 0 {
        let len = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let chunk = &mut buffer[..len];

        let offset = entry.position();
        entry.read_exact(chunk).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedStream {
                what: "entry data",
                offset,
                entry: Some(entry.index()),
            },
            _ => Error::IOError(e),
        })?;

        out.write_all(chunk)
            .map_err(|source| Error::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            })?;

        remaining -= len as u64;
    }

    out.flush().map_err(|source| Error::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn allocate(size: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|source| Error::AllocationFailed { size, source })?;
    buffer.resize(size, 0);
    Ok(buffer)
}

#[cfg(test)]
mod test {
    use std::io::prelude::*;

    use pretty_assertions::assert_eq;

    use crate::{
        error::{Error, Result},
        read::{allocate, copy_entry, ItbArchive},
    };
    use std::io::{self, Cursor};
    use std::path::Path;

    /// Accepts nothing, like a destination on a full disk.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_empty_input() {
        let archive = ItbArchive::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            archive,
            Err(Error::TruncatedStream {
                what: "header",
                offset: 0,
                entry: None
            })
        ));
    }

    #[test]
    fn read_empty_itb() -> Result<()> {
        let input = [0x00, 0x00, 0x00, 0x00];

        let mut archive = ItbArchive::new(Cursor::new(input))?;
        assert!(archive.is_empty());
        assert!(archive.next_entry()?.is_none());

        Ok(())
    }

    #[test]
    fn read_short_index_table() {
        #[rustfmt::skip]
        let input = [
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];

        let archive = ItbArchive::new(Cursor::new(input));
        assert!(matches!(
            archive,
            Err(Error::TruncatedStream {
                what: "index table",
                offset: 4,
                entry: None
            })
        ));
    }

    #[test]
    fn read_itb_with_entry() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            // Header
            0x01, 0x00, 0x00, 0x00,
            // Index table
            0x00, 0x00, 0x00, 0x00,
            // Entry header
            0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
            // Name
            0x78, 0x2E, 0x74, 0x78, 0x74,
            // Data
            0x68, 0x65, 0x6C, 0x6C, 0x6F,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?;
        assert_eq!(archive.len(), 1);

        let mut buffer = Vec::new();

        let mut file = archive.next_entry()?.expect("one entry");
        assert_eq!(file.index(), 0);
        assert_eq!(file.name(), "x.txt");
        assert_eq!(file.size(), 5);
        assert_eq!(file.data_start(), 21);

        file.read_to_end(&mut buffer)?;
        assert_eq!(buffer, b"hello");

        assert!(archive.next_entry()?.is_none());
        assert_eq!(archive.position(), 26);

        Ok(())
    }

    #[test]
    fn unread_data_is_skipped() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x02, 0x00, 0x00, 0x00,
            0xAA, 0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB,
            // First entry, "a" -> "123"
            0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x61,
            0x31, 0x32, 0x33,
            // Second entry, "b/c" -> "xy"
            0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
            0x62, 0x2F, 0x63,
            0x78, 0x79,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?;

        let mut first = archive.next_entry()?.expect("first entry");
        let mut partial = [0u8; 1];
        first.read_exact(&mut partial)?;
        assert_eq!(&partial, b"1");

        let mut second = archive.next_entry()?.expect("second entry");
        assert_eq!(second.index(), 1);
        assert_eq!(second.name_raw(), b"b/c");

        let mut buffer = Vec::new();
        second.read_to_end(&mut buffer)?;
        assert_eq!(buffer, b"xy");

        assert!(archive.next_entry()?.is_none());
        assert_eq!(archive.entries_read(), 2);

        Ok(())
    }

    #[test]
    fn read_name_too_long() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?.with_max_name_length(8);
        assert!(matches!(
            archive.next_entry(),
            Err(Error::NameTooLong {
                entry: Some(0),
                length: 9,
                max: 8
            })
        ));

        Ok(())
    }

    #[test]
    fn truncated_data_fails_on_read() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x61,
            0x31, 0x32,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?;
        let mut file = archive.next_entry()?.expect("one entry");

        let mut buffer = Vec::new();
        let err = file.read_to_end(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
        assert_eq!(buffer, b"12");

        Ok(())
    }

    #[test]
    fn truncated_data_fails_on_skip() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x61,
            0x31, 0x32,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?;
        archive.next_entry()?.expect("first entry");

        assert!(matches!(
            archive.next_entry(),
            Err(Error::TruncatedStream {
                what: "entry data",
                offset: 21,
                entry: Some(0)
            })
        ));

        Ok(())
    }

    #[test]
    fn write_failure_is_reported_with_path() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x61,
            0x31, 0x32, 0x33,
        ];

        let mut archive = ItbArchive::new(Cursor::new(input))?;
        let mut entry = archive.next_entry()?.expect("one entry");

        let mut buffer = [0u8; 2];
        let result = copy_entry(&mut entry, &mut FullDisk, &mut buffer, Path::new("a"));

        match result {
            Err(Error::OutputWriteFailed { path, source }) => {
                assert_eq!(path, Path::new("a"));
                assert_eq!(source.kind(), io::ErrorKind::Other);
            }
            other => panic!("unexpected result {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn oversized_buffer_fails_to_allocate() {
        match allocate(usize::MAX) {
            Err(Error::AllocationFailed { size, .. }) => assert_eq!(size, usize::MAX),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
