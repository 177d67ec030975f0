//! Base types for structure of ITB file.

use binrw::{BinRead, BinWrite};

/// ITB file header
///
/// The header only carries the number of entries. It is directly followed by the index table,
/// which holds one `u32` per entry. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct ItbHeader {
    /// The number of entries stored in the file
    pub entry_count: u32,
}

impl ItbHeader {
    /// Size of the header on disk
    pub const SIZE: usize = 4;

    /// Size of the index table following this header
    pub fn index_table_size(&self) -> u64 {
        u64::from(self.entry_count) * 4
    }
}

/// ITB entry record
///
/// Prefixes every file stored in the archive. The name follows immediately, then the payload.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct EntryHeader {
    /// The size of the file data for this entry
    pub payload_length: u32,

    /// The size of the name for this entry
    pub name_length: u32,
}

impl EntryHeader {
    /// Size of the record on disk
    pub const SIZE: usize = 8;
}
