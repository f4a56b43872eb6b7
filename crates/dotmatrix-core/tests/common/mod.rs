use dotmatrix_core::cartridge::Cartridge;
use dotmatrix_core::gameboy::GameBoy;
use once_cell::sync::OnceCell;

static COUNTING_ROM: OnceCell<Vec<u8>> = OnceCell::new();

/// 32 KiB ROM where every byte equals the low byte of its own address.
/// Shared by tests that only need recognizable ROM content.
#[allow(dead_code)]
pub fn counting_rom() -> Vec<u8> {
    COUNTING_ROM
        .get_or_init(|| (0..0x8000u32).map(|addr| addr as u8).collect())
        .clone()
}

/// 32 KiB of zeroes: NOPs all the way from the entry point.
#[allow(dead_code)]
pub fn blank_rom() -> Vec<u8> {
    vec![0; 0x8000]
}

/// Blank ROM with byte strings patched in at absolute addresses.
#[allow(dead_code)]
pub fn rom_with(patches: &[(u16, &[u8])]) -> Vec<u8> {
    let mut rom = blank_rom();
    for (addr, bytes) in patches {
        let start = *addr as usize;
        rom[start..start + bytes.len()].copy_from_slice(bytes);
    }
    rom
}

/// Machine with `rom` loaded.
#[allow(dead_code)]
pub fn boot(rom: Vec<u8>) -> GameBoy {
    let mut gb = GameBoy::new();
    gb.load_cart(Cartridge::from_bytes(rom));
    gb
}

/// Machine with `program` placed at the 0x0100 entry point.
#[allow(dead_code)]
pub fn boot_with_program(program: &[u8]) -> GameBoy {
    boot(rom_with(&[(0x0100, program)]))
}

/// Step once, failing the test on a fatal CPU error.
#[allow(dead_code)]
pub fn step_ok(gb: &mut GameBoy) -> u32 {
    gb.step().expect("unexpected fatal CPU error")
}
