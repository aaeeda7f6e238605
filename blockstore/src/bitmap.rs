use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BitmapError {
    #[error("bit {index} out of range for bitmap of {len} bits")]
    OutOfRange { index: usize, len: usize },
    #[error("failed to allocate {bytes} bytes of bitmap storage")]
    Alloc { bytes: usize },
}

/// A packed bit-vector with one bit per tracked block. Bit `i` lives in byte
/// `i / 8` under the mask `1 << (i % 8)`, so block 0 is the least significant
/// bit of the first byte.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    bits: Vec<u8>,
    /// Number of addressable bits. The trailing bits of the last byte past this
    /// count are never set.
    len: usize,
}

impl Bitmap {
    /// Creates a bitmap of `bit_count` bits, all clear.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::Alloc` if the backing bytes cannot be reserved.
    pub fn new(bit_count: usize) -> Result<Self, BitmapError> {
        let bytes = byte_len(bit_count);
        let mut bits = Vec::new();
        bits.try_reserve_exact(bytes)
            .map_err(|_| BitmapError::Alloc { bytes })?;
        bits.resize(bytes, 0);

        Ok(Self {
            bits,
            len: bit_count,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether bit `index` is set.
    pub fn test(&self, index: usize) -> Result<bool, BitmapError> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits[byte] & mask != 0)
    }

    /// Sets bit `index`. Setting a bit that is already set has no effect.
    pub fn set(&mut self, index: usize) -> Result<(), BitmapError> {
        let (byte, mask) = self.locate(index)?;
        self.bits[byte] |= mask;
        Ok(())
    }

    /// Clears bit `index`. Clearing a bit that is already clear has no effect.
    pub fn reset(&mut self, index: usize) -> Result<(), BitmapError> {
        let (byte, mask) = self.locate(index)?;
        self.bits[byte] &= !mask;
        Ok(())
    }

    /// Counts the set bits. Not cached, every call walks the whole map.
    pub fn total_set(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Yields the index of every set bit in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|&(_, &byte)| byte != 0)
            .flat_map(|(i, &byte)| {
                (0..8_usize)
                    .filter(move |&bit| byte & (1_u8 << bit) != 0)
                    .map(move |bit| i * 8 + bit)
            })
    }

    /// The packed representation, `ceil(len / 8)` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    fn locate(&self, index: usize) -> Result<(usize, u8), BitmapError> {
        if index >= self.len {
            return Err(BitmapError::OutOfRange {
                index,
                len: self.len,
            });
        }
        Ok((index / 8, 1 << (index % 8)))
    }
}

/// Number of bytes needed to pack `bit_count` bits.
pub fn byte_len(bit_count: usize) -> usize {
    bit_count / 8 + if bit_count % 8 == 0 { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_starts_clear() {
        let bmp = Bitmap::new(20).unwrap();

        assert_eq!(bmp.len(), 20);
        assert_eq!(bmp.as_bytes().len(), 3);
        assert_eq!(bmp.total_set(), 0);
        assert!((0..20).all(|i| !bmp.test(i).unwrap()));
    }

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new(64).unwrap();

        bmp.set(2).unwrap();

        assert_eq!(bmp.test(0), Ok(false));
        assert_eq!(bmp.test(2), Ok(true));
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new(4096).unwrap();

        bmp.set(0).unwrap();
        bmp.set(4095).unwrap();

        assert_eq!(bmp.test(0), Ok(true));
        assert_eq!(bmp.test(4095), Ok(true));
        assert_eq!(bmp.total_set(), 2);
    }

    #[test]
    fn can_toggle_bit_between_set_and_clear() {
        let mut bmp = Bitmap::new(16).unwrap();

        bmp.set(10).unwrap();
        assert_eq!(bmp.test(10), Ok(true));

        bmp.reset(10).unwrap();
        assert_eq!(bmp.test(10), Ok(false));
    }

    #[test]
    fn reset_leaves_neighbouring_bits_alone() {
        let mut bmp = Bitmap::new(16).unwrap();
        for i in 8..16 {
            bmp.set(i).unwrap();
        }

        bmp.reset(12).unwrap();

        assert_eq!(bmp.total_set(), 7);
        assert_eq!(bmp.as_bytes(), &[0x00, 0xef]);
    }

    #[test]
    fn set_and_reset_are_idempotent() {
        let mut bmp = Bitmap::new(8).unwrap();

        bmp.set(3).unwrap();
        bmp.set(3).unwrap();
        assert_eq!(bmp.total_set(), 1);

        bmp.reset(3).unwrap();
        bmp.reset(3).unwrap();
        assert_eq!(bmp.total_set(), 0);
    }

    #[test]
    fn bits_pack_least_significant_first() {
        let mut bmp = Bitmap::new(16).unwrap();

        bmp.set(0).unwrap();
        bmp.set(9).unwrap();

        assert_eq!(bmp.as_bytes(), &[0b0000_0001, 0b0000_0010]);
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut bmp = Bitmap::new(10).unwrap();
        let err = BitmapError::OutOfRange { index: 10, len: 10 };

        assert_eq!(bmp.test(10), Err(err.clone()));
        assert_eq!(bmp.set(10), Err(err.clone()));
        assert_eq!(bmp.reset(10), Err(err));
        // The padding bits of the last byte stay untouched.
        assert_eq!(bmp.as_bytes(), &[0, 0]);
    }

    #[test]
    fn iter_set_yields_ascending_indices() {
        let mut bmp = Bitmap::new(30).unwrap();
        for &i in &[29, 0, 7, 8, 15] {
            bmp.set(i).unwrap();
        }

        let set: Vec<usize> = bmp.iter_set().collect();
        assert_eq!(set, vec![0, 7, 8, 15, 29]);
    }

    #[test]
    fn zero_length_bitmap_is_empty() {
        let bmp = Bitmap::new(0).unwrap();

        assert!(bmp.is_empty());
        assert_eq!(bmp.total_set(), 0);
        assert!(bmp.test(0).is_err());
    }

    #[test]
    fn byte_len_rounds_up() {
        assert_eq!(byte_len(0), 0);
        assert_eq!(byte_len(1), 1);
        assert_eq!(byte_len(8), 1);
        assert_eq!(byte_len(9), 2);
        assert_eq!(byte_len(65536), 8192);
    }
}
