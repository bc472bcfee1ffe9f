//! Raw flash abstraction. Production devices get this from the CAL (out of
//! scope here); [`InMemoryFlash`] is the deterministic stand-in used by
//! tests and by anything exercising [`crate::store::PersistentStore`]
//! without real hardware.
//!
//! The only property that matters is the one the store's transaction
//! protocol relies on: erased bytes read as `0xFF`, and a write can only
//! clear bits (`new = old & written`), never set one back to `1`.

pub const BLOCK_SIZE: usize = 4096;

pub trait RawFlash {
    fn total_len(&self) -> usize;

    /// Erase the block covering `[offset, offset+len)`, rounded out to
    /// block boundaries. Sets those bytes to `0xFF`.
    fn erase_range(&mut self, offset: usize, len: usize) -> Result<(), String>;

    /// AND `data` into the existing bytes at `offset`; never sets a bit
    /// that erase hasn't already set.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), String>;

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct InMemoryFlash {
    bytes: Vec<u8>,
}

impl InMemoryFlash {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0xFF; size],
        }
    }
}

impl RawFlash for InMemoryFlash {
    fn total_len(&self) -> usize {
        self.bytes.len()
    }

    fn erase_range(&mut self, offset: usize, len: usize) -> Result<(), String> {
        let start = (offset / BLOCK_SIZE) * BLOCK_SIZE;
        let end_unaligned = offset + len;
        let end = end_unaligned.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        let end = end.min(self.bytes.len());
        if start >= self.bytes.len() {
            return Err(format!("erase offset {offset} out of range"));
        }
        for b in &mut self.bytes[start..end] {
            *b = 0xFF;
        }
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), String> {
        if offset + data.len() > self.bytes.len() {
            return Err(format!(
                "write offset {offset} len {} out of range (flash size {})",
                data.len(),
                self.bytes.len()
            ));
        }
        for (i, &b) in data.iter().enumerate() {
            self.bytes[offset + i] &= b;
        }
        Ok(())
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), String> {
        if offset + buf.len() > self.bytes.len() {
            return Err(format!(
                "read offset {offset} len {} out of range (flash size {})",
                buf.len(),
                self.bytes.len()
            ));
        }
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }
}
