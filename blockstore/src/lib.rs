//! A fixed capacity block device held in memory.
//!
//! A [`BlockStore`] is a flat array of equally sized blocks. Each block can be
//! allocated, released, read and written by number, and the whole device can be
//! saved to and loaded from a flat image file. Allocation state is tracked by a
//! packed [`Bitmap`] with one bit per block.
//!
//! ```no_run
//! use blockstore::{BlockStore, StoreConfig};
//!
//! let config = StoreConfig::default().with_total_blocks(64).with_block_size(512);
//! let mut store = BlockStore::create(config)?;
//!
//! let id = store.allocate()?;
//! store.write(id, &[0x55; 512])?;
//! store.serialize("disk.img")?;
//!
//! let loaded = BlockStore::deserialize_with("disk.img", store.config().clone())?;
//! assert_eq!(loaded.used_blocks(), store.used_blocks());
//! # Ok::<(), blockstore::BlockStoreError>(())
//! ```
pub mod bitmap;
pub mod config;
pub mod io;
mod store;

pub use bitmap::{Bitmap, BitmapError};
pub use config::{StoreConfig, DEFAULT_BLOCK_SIZE, DEFAULT_TOTAL_BLOCKS};
pub use io::{BlockNumber, BlockStorage};
pub use store::{BlockStore, BlockStoreError, State};
