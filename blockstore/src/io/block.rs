use crate::store::BlockStoreError;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

/// Block granular access to a device, the interface a file system layered on top
/// of the store programs against. Allocation is a separate concern; nothing here
/// checks whether a block was handed out before it is read or written.
pub trait BlockStorage {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;
    /// Number of addressable blocks.
    fn block_count(&self) -> usize;
    /// Reads disk block number into provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a block out of range, or into a buffer smaller than a
    /// block, will return an error.
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> Result<(), BlockStoreError>;
    /// Writes provided buffer into the specified block number.
    ///
    /// # Errors
    ///
    /// Attempting to write a block out of range, or from a buffer smaller than a
    /// block, will return an error.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> Result<(), BlockStoreError>;
    /// Flush any buffered disk IO. In-memory devices have nothing to flush.
    fn sync(&mut self) -> Result<(), BlockStoreError>;
}
