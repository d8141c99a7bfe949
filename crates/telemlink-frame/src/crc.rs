//! CRC-16/XMODEM: polynomial 0x1021, initial value 0, no reflection, no
//! final XOR.

const POLYNOMIAL: u16 = 0x1021;

const TABLE: [u16; 256] = generate_table();

const fn generate_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;

        while bit < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Incremental CRC-16 calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    #[inline]
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    /// Feed more bytes into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.state >> 8) as u8 ^ byte) as usize;
            self.state = (self.state << 8) ^ TABLE[index];
        }
    }

    #[inline]
    pub fn finish(&self) -> u16 {
        self.state
    }

    /// Checksum of a single contiguous buffer.
    pub fn compute(data: &[u8]) -> u16 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finish()
    }

    pub fn verify(data: &[u8], expected: u16) -> bool {
        Self::compute(data) == expected
    }
}
