mod block;
pub mod image;

pub use block::{BlockNumber, BlockStorage};
