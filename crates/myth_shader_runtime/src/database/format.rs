//! On-disk layout of the shader database.
//!
//! ```text
//! DatabaseHeader       low magic u64 | high magic u64 | platform u32 | version u32
//! ShaderEntriesHeader  entry count u32
//! entry *              ShaderEntryHeader | stage blobs (vertex..compute) | metadata
//! ```
//!
//! Integers use the host byte order (every supported platform is
//! little-endian). A stage blob is present exactly when its
//! recorded size is non-zero. The metadata record is length-prefixed (see
//! [`codec`](super::codec)).

use bytemuck::{Pod, Zeroable};

use crate::stage::ShaderStage;

pub const LOW_MAGIC: u64 = 0x2b8e_8a3b_5f02_ce78;
pub const HIGH_MAGIC: u64 = 0x0ba9_27e7_f8ab_c09d;
pub const DATABASE_VERSION: u32 = 1;

/// Platform id written into the header; a database is only read back on the
/// platform that wrote it.
pub const PLATFORM_ID: u32 = if cfg!(target_os = "windows") {
    1
} else if cfg!(target_os = "linux") {
    2
} else if cfg!(target_os = "macos") {
    3
} else {
    0
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DatabaseHeader {
    pub low_magic: u64,
    pub high_magic: u64,
    pub platform: u32,
    pub version: u32,
}

impl DatabaseHeader {
    pub const SIZE: usize = size_of::<Self>();

    #[must_use]
    pub const fn current() -> Self {
        Self {
            low_magic: LOW_MAGIC,
            high_magic: HIGH_MAGIC,
            platform: PLATFORM_ID,
            version: DATABASE_VERSION,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ShaderEntriesHeader {
    pub num_shader_entries: u32,
}

impl ShaderEntriesHeader {
    pub const SIZE: usize = size_of::<Self>();
    /// Byte offset of the entry count, patched on every append.
    pub const OFFSET: usize = DatabaseHeader::SIZE;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ShaderEntryHeader {
    pub raw_shader_key: u32,
    pub _padding: u32,
    pub last_modified_timestamp: u64,
    /// Blob size per stage, in [`ShaderStage`] order.
    pub raw_sizes: [u64; ShaderStage::COUNT],
}

impl ShaderEntryHeader {
    pub const SIZE: usize = size_of::<Self>();
}

/// Byte offset of the first entry.
pub const FIRST_ENTRY_OFFSET: usize = DatabaseHeader::SIZE + ShaderEntriesHeader::SIZE;
