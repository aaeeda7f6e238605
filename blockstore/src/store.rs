use std::ops::Range;
use std::path::Path;

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::bitmap::{Bitmap, BitmapError};
use crate::config::StoreConfig;
use crate::io::{image, BlockNumber, BlockStorage};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

#[derive(Error, Debug)]
pub enum BlockStoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("block {id} out of range for store of {total} blocks")]
    InvalidBlock { id: BlockNumber, total: usize },
    #[error("no free blocks left to allocate")]
    NoSpace,
    #[error("block {0} is already allocated")]
    AlreadyAllocated(BlockNumber),
    #[error("buffer of {actual} bytes cannot hold a {expected} byte block")]
    BufferSize { expected: usize, actual: usize },
    #[error("failed to allocate {bytes} bytes of block storage")]
    Alloc { bytes: usize },
    #[error("image holds {actual} bytes, expected {expected}")]
    ShortImage { expected: usize, actual: usize },
    #[error("allocation map error")]
    Bitmap(#[from] BitmapError),
    #[error("image io failed")]
    Io(#[from] std::io::Error),
}

/// A fixed number of equally sized blocks held in memory, with a bitmap tracking
/// which of them are allocated.
///
/// # Layout
/// ===========================================================
/// | ... | Reserved (allocation metadata) | ...             |
/// ===========================================================
///
/// The reserved range is never handed out by `allocate` and always counts as
/// used. Allocation state and block contents are independent: any in-range
/// block can be read or written whether or not it was allocated.
///
/// Persistence writes the block contents only. Loading an image rebuilds the
/// allocation map by marking every block holding a non-zero byte as used, so an
/// allocated block of all zeroes comes back free.
pub struct BlockStore {
    config: StoreConfig,
    reserved: Range<usize>,
    // Declared before `data` so the map is dropped first.
    bitmap: Bitmap,
    data: Vec<u8>,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("config", &self.config)
            .field("used_blocks", &self.used_blocks())
            .finish()
    }
}

impl BlockStore {
    /// Creates a store with the default geometry.
    pub fn new() -> Result<Self, BlockStoreError> {
        Self::create(StoreConfig::default())
    }

    /// Creates a zero filled store with every block free.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the block buffer or its bitmap
    /// cannot be allocated. Nothing is leaked on failure.
    pub fn create(config: StoreConfig) -> Result<Self, BlockStoreError> {
        config.validate()?;

        let bytes = config.image_len();
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| BlockStoreError::Alloc { bytes })?;
        data.resize(bytes, 0);
        let bitmap = Bitmap::new(config.total_blocks())?;

        info!(
            "created block store of {} blocks x {} bytes, reserved {:?}",
            config.total_blocks(),
            config.block_size(),
            config.reserved()
        );
        Ok(Self {
            reserved: config.reserved(),
            config,
            bitmap,
            data,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn total_blocks(&self) -> usize {
        self.config.total_blocks()
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size()
    }

    pub fn is_reserved(&self, id: BlockNumber) -> bool {
        self.reserved.contains(&id)
    }

    /// Allocation state of block `id`.
    pub fn state(&self, id: BlockNumber) -> Result<State, BlockStoreError> {
        self.check_id(id)?;
        if self.bitmap.test(id)? {
            Ok(State::Used)
        } else {
            Ok(State::Free)
        }
    }

    /// Marks the lowest numbered free block outside the reserved range as used
    /// and returns it.
    ///
    /// # Errors
    ///
    /// Returns `BlockStoreError::NoSpace` when every unreserved block is in use.
    pub fn allocate(&mut self) -> Result<BlockNumber, BlockStoreError> {
        let reserved = self.reserved.clone();
        let candidates = (0..reserved.start).chain(reserved.end..self.total_blocks());
        for id in candidates {
            if !self.bitmap.test(id)? {
                self.bitmap.set(id)?;
                debug!("allocated block {}", id);
                return Ok(id);
            }
        }
        debug!("allocation failed, no free blocks");
        Err(BlockStoreError::NoSpace)
    }

    /// Marks block `id` as used if it is currently free. Reserved blocks may be
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlock` for an id past the end of the store and
    /// `AlreadyAllocated` if the block is in use. Neither changes any state.
    pub fn request(&mut self, id: BlockNumber) -> Result<(), BlockStoreError> {
        self.check_id(id)?;
        if self.bitmap.test(id)? {
            debug!("request for block {} refused, already allocated", id);
            return Err(BlockStoreError::AlreadyAllocated(id));
        }
        self.bitmap.set(id)?;
        debug!("allocated requested block {}", id);
        Ok(())
    }

    /// Marks block `id` as free. Releasing a free or out of range block does
    /// nothing.
    pub fn release(&mut self, id: BlockNumber) {
        match self.bitmap.test(id) {
            Ok(true) => {
                // test succeeded, so the id is in range and reset cannot fail.
                let _ = self.bitmap.reset(id);
                debug!("released block {}", id);
            }
            Ok(false) => debug!("release of free block {} ignored", id),
            Err(_) => debug!("release of out of range block {} ignored", id),
        }
    }

    /// Blocks in use: allocated blocks outside the reserved range plus the whole
    /// reserved range. Reserved bits are not counted twice.
    pub fn used_blocks(&self) -> usize {
        let reserved_set = self
            .reserved
            .clone()
            .filter(|&id| self.bitmap.test(id).unwrap_or(false))
            .count();
        self.bitmap.total_set() - reserved_set + self.reserved.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.total_blocks().saturating_sub(self.used_blocks())
    }

    /// Copies block `id` into the front of `buf` and returns the block size.
    ///
    /// # Errors
    ///
    /// Fails for an out of range id or a buffer shorter than a block. The
    /// allocation state of the block is not consulted.
    pub fn read(&self, id: BlockNumber, buf: &mut [u8]) -> Result<usize, BlockStoreError> {
        let range = self.block_range(id, buf.len())?;
        let size = range.len();
        buf[..size].copy_from_slice(&self.data[range]);
        Ok(size)
    }

    /// Copies the first block size bytes of `buf` into block `id` and returns the
    /// block size.
    ///
    /// # Errors
    ///
    /// Fails for an out of range id or a buffer shorter than a block. The
    /// allocation state of the block is not consulted.
    pub fn write(&mut self, id: BlockNumber, buf: &[u8]) -> Result<usize, BlockStoreError> {
        let range = self.block_range(id, buf.len())?;
        let size = range.len();
        self.data[range].copy_from_slice(&buf[..size]);
        Ok(size)
    }

    /// Writes every block, in order, to the image at `path` and returns the
    /// number of bytes written. The allocation map is not written.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> Result<usize, BlockStoreError> {
        let written = image::write_image(path.as_ref(), &self.data)?;
        info!(
            "serialized {} blocks ({} bytes) to {}",
            self.total_blocks(),
            written,
            path.as_ref().display()
        );
        Ok(written)
    }

    /// Loads an image written with the default geometry.
    pub fn deserialize<P: AsRef<Path>>(path: P) -> Result<Self, BlockStoreError> {
        Self::deserialize_with(path, StoreConfig::default())
    }

    /// Loads the image at `path` into a new store with the given geometry and
    /// rebuilds the allocation map from block contents.
    ///
    /// # Errors
    ///
    /// Fails if the image cannot be read or is shorter than the store. No store
    /// is returned on failure.
    pub fn deserialize_with<P: AsRef<Path>>(
        path: P,
        config: StoreConfig,
    ) -> Result<Self, BlockStoreError> {
        let mut store = Self::create(config)?;
        image::read_image(path.as_ref(), &mut store.data)?;
        store.rebuild_allocations()?;

        info!(
            "deserialized {} blocks from {}, {} in use",
            store.total_blocks(),
            path.as_ref().display(),
            store.used_blocks()
        );
        Ok(store)
    }

    /// Marks each block with at least one non-zero byte as used.
    fn rebuild_allocations(&mut self) -> Result<(), BlockStoreError> {
        let block_size = self.block_size();
        for (id, block) in self.data.chunks(block_size).enumerate() {
            if block.iter().all(|&b| b == 0) {
                continue;
            }
            if self.reserved.contains(&id) {
                warn!("reserved block {} holds data, marking it used", id);
            }
            trace!("block {} holds data, marking it used", id);
            self.bitmap.set(id)?;
        }
        Ok(())
    }

    fn check_id(&self, id: BlockNumber) -> Result<(), BlockStoreError> {
        if id >= self.total_blocks() {
            return Err(BlockStoreError::InvalidBlock {
                id,
                total: self.total_blocks(),
            });
        }
        Ok(())
    }

    /// Byte range of block `id` in the buffer, after checking the id and that a
    /// caller buffer of `buf_len` bytes can hold a block.
    fn block_range(&self, id: BlockNumber, buf_len: usize) -> Result<Range<usize>, BlockStoreError> {
        self.check_id(id)?;
        let size = self.block_size();
        if buf_len < size {
            return Err(BlockStoreError::BufferSize {
                expected: size,
                actual: buf_len,
            });
        }
        let start = id * size;
        Ok(start..start + size)
    }
}

impl BlockStorage for BlockStore {
    fn block_size(&self) -> usize {
        self.config.block_size()
    }

    fn block_count(&self) -> usize {
        self.config.total_blocks()
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> Result<(), BlockStoreError> {
        self.read(blocknr, buf).map(|_| ())
    }

    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> Result<(), BlockStoreError> {
        self.write(blocknr, buf).map(|_| ())
    }

    fn sync(&mut self) -> Result<(), BlockStoreError> {
        Ok(())
    }
}
