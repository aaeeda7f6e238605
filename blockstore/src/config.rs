use std::ops::Range;

use crate::bitmap::byte_len;
use crate::store::BlockStoreError;

/// 2^16 blocks.
pub const DEFAULT_TOTAL_BLOCKS: usize = 65536;
/// 4k is a common block size for file systems. Disks commonly are composed of
/// 512 byte blocks mapping each file system block to 8 hard disk blocks.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Geometry of a block store: how many blocks, how large each one is, and which
/// contiguous run of blocks is set aside for allocation metadata.
///
/// Unless `with_reserved` is used, the reserved range starts at block 0 and is
/// exactly as long as a packed bitmap of `total_blocks` bits needs, so changing
/// the geometry keeps it in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    total_blocks: usize,
    block_size: usize,
    reserved: Option<Range<usize>>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            total_blocks: DEFAULT_TOTAL_BLOCKS,
            block_size: DEFAULT_BLOCK_SIZE,
            reserved: None,
        }
    }
}

impl StoreConfig {
    /// Sets the number of blocks in the store.
    pub fn with_total_blocks(mut self, blocks: usize) -> Self {
        self.total_blocks = blocks;
        self
    }

    /// Sets the size of each block in bytes.
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Pins the metadata range to `len` blocks starting at `start` instead of
    /// deriving it from the geometry.
    pub fn with_reserved(mut self, start: usize, len: usize) -> Self {
        self.reserved = Some(start..start.saturating_add(len));
        self
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks excluded from allocation search and always counted as used.
    pub fn reserved(&self) -> Range<usize> {
        match &self.reserved {
            Some(range) => range.clone(),
            None => 0..self.bitmap_blocks(),
        }
    }

    /// Size in bytes of the whole block buffer, and of its on-disk image.
    pub fn image_len(&self) -> usize {
        self.total_blocks * self.block_size
    }

    /// Blocks needed to hold a packed bitmap covering every block.
    fn bitmap_blocks(&self) -> usize {
        if self.block_size == 0 {
            return 0;
        }
        let bytes = byte_len(self.total_blocks);
        bytes / self.block_size + if bytes % self.block_size == 0 { 0 } else { 1 }
    }

    /// Checks the geometry describes a store that can exist.
    ///
    /// # Errors
    ///
    /// Returns `BlockStoreError::InvalidConfig` for an empty store, zero sized
    /// blocks, a reserved range reaching past the last block, or a buffer size
    /// that does not fit in memory addressing.
    pub fn validate(&self) -> Result<(), BlockStoreError> {
        if self.total_blocks == 0 {
            return Err(BlockStoreError::InvalidConfig(
                "store must contain at least one block".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(BlockStoreError::InvalidConfig(
                "block size must be non-zero".to_string(),
            ));
        }
        let reserved = self.reserved();
        if reserved.start > reserved.end || reserved.end > self.total_blocks {
            return Err(BlockStoreError::InvalidConfig(format!(
                "reserved range {:?} exceeds {} blocks",
                reserved, self.total_blocks
            )));
        }
        if self.total_blocks.checked_mul(self.block_size).is_none() {
            return Err(BlockStoreError::InvalidConfig(format!(
                "{} blocks of {} bytes overflows the addressable size",
                self.total_blocks, self.block_size
            )));
        }
        Ok(())
    }
}
