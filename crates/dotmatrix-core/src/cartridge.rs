use std::fs;
use std::io;
use std::path::Path;

/// Size the image is padded to: the full 16-bit address space, so reads
/// past the end of a 32 KiB ROM stay in bounds.
const IMAGE_SIZE: usize = 0x10000;

/// An opaque cartridge ROM image.
///
/// No bank controller is modeled; the image is read-only and writes into
/// the ROM region are dropped at the bus.
pub struct Cartridge {
    rom: Vec<u8>,
}

impl Cartridge {
    /// Wrap a ROM image, zero-padding it to 64 KiB.
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        if data.len() < IMAGE_SIZE {
            data.resize(IMAGE_SIZE, 0);
        }
        Self { rom: data }
    }

    /// Load a ROM image from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }
}
