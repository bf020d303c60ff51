//! Fixed-width packed storage for small unsigned integers.
//!
//! Every element occupies the same number of bytes (1, 2 or 4), chosen from
//! the largest value the store must hold. Elements are little endian inside a
//! single flat `Vec<u8>`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("index {index} is outside the store (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("value {value} exceeds the store maximum of {max}")]
    ValueTooLarge { value: u32, max: u32 },
}

/// Byte width of one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    U32,
}

impl Width {
    /// Narrowest width able to hold `max_value`.
    pub const fn for_max(max_value: u32) -> Self {
        if max_value <= u8::MAX as u32 {
            Width::U8
        } else if max_value <= u16::MAX as u32 {
            Width::U16
        } else {
            Width::U32
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U32 => 4,
        }
    }

    /// Largest value representable at this width.
    pub const fn ceiling(self) -> u32 {
        match self {
            Width::U8 => u8::MAX as u32,
            Width::U16 => u16::MAX as u32,
            Width::U32 => u32::MAX,
        }
    }
}

/// A fixed-length sequence of unsigned integers in `[0, max_value]`.
///
/// `max_value` is always the ceiling of the chosen width, so a store built for
/// values up to 23 accepts anything up to 255. The optional `flag` is carried
/// along untouched; higher layers use it to remember which encoding produced
/// the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedStore {
    bytes: Vec<u8>,
    width: Width,
    len: usize,
    flag: Option<u8>,
}

impl PackedStore {
    /// Creates a zero-filled store with room for `len` elements.
    pub fn new(max_value: u32, len: usize) -> Self {
        let width = Width::for_max(max_value);
        Self {
            bytes: vec![0; len * width.bytes()],
            width,
            len,
            flag: None,
        }
    }

    /// Creates a store seeded with `values`.
    ///
    /// The length is `len` or `values.len()`, whichever is larger; elements
    /// past the seed stay zero.
    pub fn with_values(max_value: u32, values: &[u32], len: usize) -> Result<Self, StoreError> {
        let mut store = Self::new(max_value, len.max(values.len()));
        store.write_range(0, values)?;
        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn width(&self) -> Width {
        self.width
    }

    /// Largest value this store accepts.
    #[inline]
    pub fn max_value(&self) -> u32 {
        self.width.ceiling()
    }

    pub fn flag(&self) -> Option<u8> {
        self.flag
    }

    pub fn set_flag(&mut self, flag: Option<u8>) {
        self.flag = flag;
    }

    /// Returns the store with `flag` attached.
    #[must_use]
    pub fn flagged(mut self, flag: u8) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn read(&self, index: usize) -> Result<u32, StoreError> {
        self.check_index(index)?;
        Ok(self.load(index))
    }

    pub fn write(&mut self, index: usize, value: u32) -> Result<(), StoreError> {
        self.check_index(index)?;
        if value > self.max_value() {
            return Err(StoreError::ValueTooLarge {
                value,
                max: self.max_value(),
            });
        }
        self.store(index, value);
        Ok(())
    }

    /// Reads the inclusive range between `lo` and `hi`.
    ///
    /// The bounds may be given in either order; the values always come back in
    /// ascending index order.
    pub fn read_range(&self, lo: usize, hi: usize) -> Result<Vec<u32>, StoreError> {
        let (first, last) = if hi < lo { (hi, lo) } else { (lo, hi) };
        self.check_index(last)?;
        Ok((first..=last).map(|index| self.load(index)).collect())
    }

    /// Writes `values` starting at `lo`.
    ///
    /// Either every value is written or, on error, none are.
    pub fn write_range(&mut self, lo: usize, values: &[u32]) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        self.check_index(lo + values.len() - 1)?;
        if let Some(&value) = values.iter().find(|&&v| v > self.max_value()) {
            return Err(StoreError::ValueTooLarge {
                value,
                max: self.max_value(),
            });
        }
        for (offset, &value) in values.iter().enumerate() {
            self.store(lo + offset, value);
        }
        Ok(())
    }

    /// All values in index order.
    pub fn to_vec(&self) -> Vec<u32> {
        (0..self.len).map(|index| self.load(index)).collect()
    }

    /// Returns a freshly allocated store of `new_len` elements holding a copy
    /// of this one's contents (truncated or zero-extended).
    ///
    /// Stores never grow in place.
    pub fn resized(&self, new_len: usize) -> Self {
        let mut bytes = vec![0; new_len * self.width.bytes()];
        let kept = self.bytes.len().min(bytes.len());
        bytes[..kept].copy_from_slice(&self.bytes[..kept]);
        Self {
            bytes,
            width: self.width,
            len: new_len,
            flag: self.flag,
        }
    }

    /// Copies `count` elements from `src` to `dst` inside this store.
    pub fn copy_within(&mut self, src: usize, dst: usize, count: usize) -> Result<(), StoreError> {
        if count == 0 {
            return Ok(());
        }
        self.check_index(src + count - 1)?;
        self.check_index(dst + count - 1)?;
        let w = self.width.bytes();
        self.bytes
            .copy_within(src * w..(src + count) * w, dst * w);
        Ok(())
    }

    /// Raw little-endian element bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index >= self.len {
            Err(StoreError::IndexOutOfRange {
                index,
                len: self.len,
            })
        } else {
            Ok(())
        }
    }

    /// Unchecked read used by hot loops that have already validated bounds.
    #[inline(always)]
    pub(crate) fn load(&self, index: usize) -> u32 {
        match self.width {
            Width::U8 => u32::from(self.bytes[index]),
            Width::U16 => {
                let at = index * 2;
                u32::from(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
            }
            Width::U32 => {
                let at = index * 4;
                u32::from_le_bytes([
                    self.bytes[at],
                    self.bytes[at + 1],
                    self.bytes[at + 2],
                    self.bytes[at + 3],
                ])
            }
        }
    }

    /// Unchecked write; callers guarantee `index < len` and `value <= max_value`.
    #[inline(always)]
    pub(crate) fn store(&mut self, index: usize, value: u32) {
        debug_assert!(value <= self.max_value());
        match self.width {
            Width::U8 => self.bytes[index] = value as u8,
            Width::U16 => {
                let at = index * 2;
                self.bytes[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
            Width::U32 => {
                let at = index * 4;
                self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
    }
}
