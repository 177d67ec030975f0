//! Options controlling how an archive is unpacked

use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use bon::Builder;

/// Default size of the buffer used to copy entry payloads
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Options for how the ITB file should be unpacked
///
/// ```
/// use itb_archive::ExtractOptions;
///
/// let options = ExtractOptions::builder().overwrite(false).chunk_size(1024).build();
/// assert_eq!(options.chunk_size, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct ExtractOptions {
    /// Size of the buffer payloads are copied through
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Truncate existing files instead of failing on them
    #[builder(default = true)]
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExtractOptions {
    /// Chunk size actually used, never zero
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub(crate) fn create_output(&self, path: &Path) -> std::io::Result<File> {
        let mut open = OpenOptions::new();
        open.write(true);
        if self.overwrite {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }
        open.open(path)
    }
}
