use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("A machine needs at least one register")]
    NoRegisters,
    #[error("Memory size must be greater than zero")]
    NoMemory,
    #[error("Framebuffer of {len} bytes at 0x{base:x} does not fit in {memory_size} bytes of memory")]
    FramebufferOutOfRange {
        base: usize,
        len: usize,
        memory_size: usize,
    },
    #[error("Field `{name}` ({bits} bits at shift {shift}) does not fit in a {word_bits}-bit word")]
    FieldOutOfRange {
        name: &'static str,
        shift: u32,
        bits: u32,
        word_bits: u32,
    },
    #[error("Field `{0}` overlaps the opcode field")]
    OverlapsOpcode(&'static str),
    #[error("Pixel channel fields must be 1 to 8 bits wide, got {0}")]
    ChannelWidth(u32),
    #[error("Tick rate must be a positive number of Hz, got {0}")]
    TickRate(f64),
}

/// Width of one machine word. Fixes instruction size, LOAD/STORE size and register width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordWidth {
    W32,
    W64,
}

impl WordWidth {
    pub const fn bytes(self) -> usize {
        match self {
            WordWidth::W32 => 4,
            WordWidth::W64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Mask applied to every register write
    pub const fn mask(self) -> u64 {
        match self {
            WordWidth::W32 => u32::MAX as u64,
            WordWidth::W64 => u64::MAX,
        }
    }
}

/// A bit-field inside an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub shift: u32,
    pub bits: u32,
}

impl Field {
    pub const fn new(shift: u32, bits: u32) -> Self {
        Self { shift, bits }
    }

    /// Largest value the field can hold
    pub const fn max(self) -> u64 {
        if self.bits == 0 {
            0
        } else if self.bits >= 64 {
            u64::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    pub const fn extract(self, word: u64) -> u64 {
        if self.shift >= 64 {
            return 0;
        }
        (word >> self.shift) & self.max()
    }

    /// Place `value` into the field. Bits that don't fit are dropped.
    pub const fn insert(self, value: u64) -> u64 {
        if self.shift >= 64 {
            return 0;
        }
        (value & self.max()) << self.shift
    }

    pub const fn fits(self, value: u64) -> bool {
        value <= self.max()
    }

    pub const fn overlaps(self, other: Field) -> bool {
        self.shift < other.shift + other.bits && other.shift < self.shift + self.bits
    }

    fn check(self, name: &'static str, word: WordWidth) -> Result<(), ConfigError> {
        if self.shift + self.bits > word.bits() {
            return Err(ConfigError::FieldOutOfRange {
                name,
                shift: self.shift,
                bits: self.bits,
                word_bits: word.bits(),
            });
        }
        Ok(())
    }
}

/// Operand layout of the SETPIXEL instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub x: Field,
    pub y: Field,
    /// R, G, B, A in that order
    pub channels: [Field; 4],
}

impl PixelLayout {
    /// Widen a raw channel value to 8 bits.
    ///
    /// Multiplies by `floor(255 / max)` rather than rounding, so a 3-bit channel at 7 gives 252.
    pub fn scale(channel: Field, raw: u64) -> u8 {
        let multiplier = 255u64.checked_div(channel.max()).unwrap_or(0);
        raw.saturating_mul(multiplier).min(255) as u8
    }
}

/// Where LOAD and STORE take their address from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// The address is held in the register named by the second register slot
    Indirect,
    /// The address is the instruction's address field
    Direct,
}

/// Bit-field positions for every operand slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub opcode: Field,
    /// First register slot (destination, or source for STORE, or A for BEQ)
    pub reg_a: Field,
    pub reg_b: Field,
    pub reg_c: Field,
    /// JMP target and direct LOAD/STORE address
    pub address: Field,
    /// BEQ offset, unsigned
    pub offset: Field,
    pub pixel: PixelLayout,
    pub addressing: Addressing,
}

impl Encoding {
    /// 32-bit encoding with a full opcode byte, 4-bit coordinates and 4-bit colour channels
    pub const fn nibble() -> Self {
        Self {
            opcode: Field::new(24, 8),
            pixel: PixelLayout {
                x: Field::new(20, 4),
                y: Field::new(16, 4),
                channels: [
                    Field::new(12, 4),
                    Field::new(8, 4),
                    Field::new(4, 4),
                    Field::new(0, 4),
                ],
            },
            ..Self::packed()
        }
    }

    /// 32-bit encoding with 8-bit coordinates and 3-bit colour channels.
    ///
    /// The opcode only gets the top nibble, so that `x` can use bits 20..28.
    pub const fn packed() -> Self {
        Self {
            opcode: Field::new(28, 4),
            reg_a: Field::new(20, 4),
            reg_b: Field::new(16, 4),
            reg_c: Field::new(12, 4),
            address: Field::new(0, 24),
            offset: Field::new(0, 16),
            pixel: PixelLayout {
                x: Field::new(20, 8),
                y: Field::new(12, 8),
                channels: [
                    Field::new(9, 3),
                    Field::new(6, 3),
                    Field::new(3, 3),
                    Field::new(0, 3),
                ],
            },
            addressing: Addressing::Indirect,
        }
    }

    /// 64-bit encoding with 8-bit register slots and full 8-bit channels
    pub const fn wide() -> Self {
        Self {
            opcode: Field::new(56, 8),
            reg_a: Field::new(48, 8),
            reg_b: Field::new(40, 8),
            reg_c: Field::new(32, 8),
            address: Field::new(0, 48),
            offset: Field::new(0, 32),
            pixel: PixelLayout {
                x: Field::new(48, 8),
                y: Field::new(40, 8),
                channels: [
                    Field::new(32, 8),
                    Field::new(24, 8),
                    Field::new(16, 8),
                    Field::new(8, 8),
                ],
            },
            addressing: Addressing::Direct,
        }
    }

    fn fields(&self) -> [(&'static str, Field); 12] {
        let [r, g, b, a] = self.pixel.channels;
        [
            ("opcode", self.opcode),
            ("reg_a", self.reg_a),
            ("reg_b", self.reg_b),
            ("reg_c", self.reg_c),
            ("address", self.address),
            ("offset", self.offset),
            ("pixel.x", self.pixel.x),
            ("pixel.y", self.pixel.y),
            ("pixel.r", r),
            ("pixel.g", g),
            ("pixel.b", b),
            ("pixel.a", a),
        ]
    }
}

/// Placement of the RGBA framebuffer inside memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferConfig {
    pub base: usize,
    pub width: usize,
    pub height: usize,
}

impl FramebufferConfig {
    pub const fn len(&self) -> usize {
        self.width * self.height * 4
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte address of pixel (x, y), if it lies on the grid
    pub fn address(&self, x: u64, y: u64) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.base + y * self.width * 4 + x * 4)
    }
}

/// Construction-time machine parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub word: WordWidth,
    pub register_count: usize,
    pub memory_size: usize,
    pub framebuffer: FramebufferConfig,
    /// Scheduler ticks per second
    pub tick_rate: f64,
    pub encoding: Encoding,
}

pub const DEFAULT_TICK_RATE: f64 = 60.0;

impl Config {
    pub fn nibble() -> Self {
        Self {
            word: WordWidth::W32,
            register_count: 16,
            memory_size: 64 * 1024,
            framebuffer: FramebufferConfig {
                base: 0,
                width: 64,
                height: 64,
            },
            tick_rate: DEFAULT_TICK_RATE,
            encoding: Encoding::nibble(),
        }
    }

    pub fn packed() -> Self {
        Self {
            word: WordWidth::W32,
            register_count: 16,
            memory_size: 128 * 1024,
            framebuffer: FramebufferConfig {
                base: 0,
                width: 128,
                height: 128,
            },
            tick_rate: DEFAULT_TICK_RATE,
            encoding: Encoding::packed(),
        }
    }

    /// The 64-bit machine. Memory is 16 MiB here; raise `memory_size` for bigger images.
    pub fn wide() -> Self {
        Self {
            word: WordWidth::W64,
            register_count: 256,
            memory_size: 16 * 1024 * 1024,
            framebuffer: FramebufferConfig {
                base: 0,
                width: 64,
                height: 64,
            },
            tick_rate: DEFAULT_TICK_RATE,
            encoding: Encoding::wide(),
        }
    }

    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.register_count == 0 {
            return Err(ConfigError::NoRegisters);
        }
        if self.memory_size == 0 {
            return Err(ConfigError::NoMemory);
        }
        let fb = self.framebuffer;
        if fb
            .base
            .checked_add(fb.len())
            .map_or(true, |end| end > self.memory_size)
        {
            return Err(ConfigError::FramebufferOutOfRange {
                base: fb.base,
                len: fb.len(),
                memory_size: self.memory_size,
            });
        }
        for (name, field) in self.encoding.fields() {
            field.check(name, self.word)?;
            if name != "opcode" && field.overlaps(self.encoding.opcode) {
                return Err(ConfigError::OverlapsOpcode(name));
            }
        }
        if let Some(channel) = self
            .encoding
            .pixel
            .channels
            .iter()
            .find(|c| c.bits == 0 || c.bits > 8)
        {
            return Err(ConfigError::ChannelWidth(channel.bits));
        }
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::packed()
    }
}
