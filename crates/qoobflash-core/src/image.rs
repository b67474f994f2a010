//! Flash images: a byte buffer bound to a flash address.

/// An ordered byte sequence destined for (or read from) a flash address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    base: u32,
    data: Vec<u8>,
}

impl FlashImage {
    /// Wrap bytes destined for `base`.
    pub fn new(base: u32, data: Vec<u8>) -> Self {
        Self { base, data }
    }

    /// Flash address of the first byte.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw bytes out of the image.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of pages the image spans for a given page size, counting the
    /// final partial page.
    pub fn page_count(&self, page_size: u32) -> u32 {
        (self.data.len() as u32).div_ceil(page_size)
    }

    /// Iterate page-sized chunks in address order, zero-padding the final
    /// partial page. Yields `(address, page_bytes)`.
    pub fn pages(&self, page_size: u32) -> impl Iterator<Item = (u32, Vec<u8>)> + '_ {
        let base = self.base;
        self.data
            .chunks(page_size as usize)
            .enumerate()
            .map(move |(i, chunk)| {
                let mut page = vec![0u8; page_size as usize];
                page[..chunk.len()].copy_from_slice(chunk);
                (base + i as u32 * page_size, page)
            })
    }
}
