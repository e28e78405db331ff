use crate::config::FramebufferConfig;

/// Flat byte-addressable memory.
///
/// Accesses outside `[0, len)` never fault: reads give 0 and writes are dropped, so a
/// misbehaving program can't take the host down with it.
///
/// ```text
///   0                       fb.len()                               len
///   ┌──────────────────────────┬─────────────────────────────────────┐
///   │ framebuffer (RGBA rows)  │ program, data                       │
///   └──────────────────────────┴─────────────────────────────────────┘
///     ▲ program bytes are loaded from 0 as well and overlap the framebuffer
/// ```
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Memory {
    #[debug("{} bytes", buffer.len())]
    buffer: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether `[address, address + len)` lies inside memory
    pub fn contains(&self, address: u64, len: usize) -> bool {
        self.range(address, len).is_some()
    }

    fn range(&self, address: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(address).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.buffer.len()).then_some(start..end)
    }

    /// Read a little-endian unsigned integer of `width` bytes (at most 8)
    pub fn read(&self, address: u64, width: usize) -> u64 {
        let Some(bytes) = self.read_bytes(address, width.min(8)) else {
            return 0;
        };
        let mut word = [0u8; 8];
        word[..bytes.len()].copy_from_slice(bytes);
        u64::from_le_bytes(word)
    }

    /// Store the low `width` bytes (at most 8) of `value`, little-endian
    pub fn write(&mut self, address: u64, value: u64, width: usize) {
        let width = width.min(8);
        self.write_bytes(address, &value.to_le_bytes()[..width]);
    }

    pub fn read_bytes(&self, address: u64, len: usize) -> Option<&[u8]> {
        self.range(address, len).map(|range| &self.buffer[range])
    }

    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) {
        if let Some(range) = self.range(address, bytes.len()) {
            self.buffer[range].copy_from_slice(bytes);
        }
    }

    /// A view of the pixel sub-range. Borrows the memory, never copies it.
    pub fn framebuffer(&self, config: FramebufferConfig) -> Option<Framebuffer<&[u8]>> {
        let range = self.range(config.base as u64, config.len())?;
        Some(Framebuffer::new(&self.buffer[range], config))
    }

    /// A writable view of the pixel sub-range. Pixels set here are plain memory writes.
    pub fn framebuffer_mut(&mut self, config: FramebufferConfig) -> Option<Framebuffer<&mut [u8]>> {
        let range = self.range(config.base as u64, config.len())?;
        Some(Framebuffer::new(&mut self.buffer[range], config))
    }
}

/// Row-major RGBA grid over a byte slice
#[derive(Debug)]
pub struct Framebuffer<B> {
    bytes: B,
    width: usize,
    height: usize,
}

impl<B> Framebuffer<B> {
    fn new(bytes: B, config: FramebufferConfig) -> Self {
        Self {
            bytes,
            width: config.width,
            height: config.height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) * 4)
    }
}

impl<B: AsRef<[u8]>> Framebuffer<B> {
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let px = self.bytes.as_ref().get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterate rows, each a slice of `width * 4` bytes
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes.as_ref().chunks_exact(self.width.max(1) * 4)
    }
}

impl<B: AsMut<[u8]>> Framebuffer<B> {
    /// No-op outside the grid
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if let Some(offset) = self.offset(x, y) {
            if let Some(px) = self.bytes.as_mut().get_mut(offset..offset + 4) {
                px.copy_from_slice(&rgba);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Memory;
    use crate::config::FramebufferConfig;
    use proptest::prelude::*;

    const FB: FramebufferConfig = FramebufferConfig {
        base: 0,
        width: 4,
        height: 4,
    };

    proptest! {
        #[test]
        fn test_write_then_read_in_bounds(width in 1usize..=8, value in any::<u64>(), seed in any::<u64>()) {
            let mut memory = Memory::new(256);
            let address = seed % (256 - width as u64 + 1);
            memory.write(address, value, width);
            let mask = if width == 8 { u64::MAX } else { (1u64 << (width * 8)) - 1 };
            prop_assert_eq!(memory.read(address, width), value & mask);
        }

        #[test]
        fn test_out_of_bounds_is_zero_and_noop(width in 1usize..=8, overshoot in 1u64..1024, value in any::<u64>()) {
            let mut memory = Memory::new(256);
            memory.write_bytes(0, &[0xAA; 256]);
            let before = memory.clone();
            let address = 256 - width as u64 + overshoot;

            prop_assert_eq!(memory.read(address, width), 0);
            memory.write(address, value, width);
            memory.write_bytes(address, &value.to_le_bytes()[..width]);
            prop_assert_eq!(memory, before);
        }
    }

    #[test]
    fn test_straddling_the_end_is_rejected() {
        let mut memory = Memory::new(16);
        memory.write(12, u64::MAX, 8);
        assert_eq!(memory.as_bytes(), &[0; 16]);
        memory.write(12, 0xDEAD_BEEF, 4);
        assert_eq!(memory.read(12, 4), 0xDEAD_BEEF);
        assert_eq!(memory.read(12, 8), 0);
        assert_eq!(memory.read(u64::MAX, 4), 0);
    }

    #[test]
    fn test_debug_shows_size_not_contents() {
        assert_eq!(format!("{:?}", Memory::new(64)), "Memory { buffer: 64 bytes }");
    }

    #[test]
    fn test_little_endian_layout() {
        let mut memory = Memory::new(8);
        memory.write(0, 0x0403_0201, 4);
        assert_eq!(memory.as_bytes()[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn test_framebuffer_aliases_memory() {
        let mut memory = Memory::new(128);
        memory.write_bytes(5 * 4, &[1, 2, 3, 4]);
        assert_eq!(memory.framebuffer(FB).unwrap().pixel(1, 1), Some([1, 2, 3, 4]));

        memory.framebuffer_mut(FB).unwrap().set_pixel(2, 3, [9, 8, 7, 6]);
        assert_eq!(memory.read((3 * 4 + 2) * 4, 4), u32::from_le_bytes([9, 8, 7, 6]) as u64);
    }

    #[test]
    fn test_framebuffer_outside_memory() {
        let memory = Memory::new(32);
        assert!(memory.framebuffer(FB).is_none());
    }

    #[test]
    fn test_set_pixel_off_grid_is_noop() {
        let mut memory = Memory::new(64);
        memory.framebuffer_mut(FB).unwrap().set_pixel(4, 0, [255; 4]);
        assert_eq!(memory.as_bytes(), &[0; 64]);
    }
}
