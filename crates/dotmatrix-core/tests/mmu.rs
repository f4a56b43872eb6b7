mod common;

use dotmatrix_core::cartridge::Cartridge;
use dotmatrix_core::mmu::Mmu;

fn mmu_with_counting_rom() -> Mmu {
    let mut mmu = Mmu::new();
    mmu.load_cart(Cartridge::from_bytes(common::counting_rom()));
    mmu
}

#[test]
fn word_reads_compose_little_endian_byte_reads() {
    let mut mmu = mmu_with_counting_rom();
    mmu.write_byte(0xC000, 0x34);
    mmu.write_byte(0xC001, 0x12);
    assert_eq!(mmu.read_word(0xC000), 0x1234);

    for addr in [0x0000u16, 0x0150, 0x7FFE, 0xC000, 0xFF80] {
        let lo = mmu.read_byte(addr) as u16;
        let hi = mmu.read_byte(addr.wrapping_add(1)) as u16;
        assert_eq!(mmu.read_word(addr), lo | (hi << 8));
    }
}

#[test]
fn word_writes_store_low_byte_first() {
    let mut mmu = Mmu::new();
    mmu.write_word(0xC100, 0xBEEF);
    assert_eq!(mmu.read_byte(0xC100), 0xEF);
    assert_eq!(mmu.read_byte(0xC101), 0xBE);
}

#[test]
fn rom_region_ignores_writes() {
    let mut mmu = mmu_with_counting_rom();
    let before = mmu.read_byte(0x1234);
    mmu.write_byte(0x1234, !before);
    assert_eq!(mmu.read_byte(0x1234), before);
    assert_eq!(mmu.counters.rom_writes_ignored, 1);
}

#[test]
fn missing_cartridge_reads_open_bus() {
    let mut mmu = Mmu::new();
    assert_eq!(mmu.read_byte(0x0100), 0xFF);
    assert_eq!(mmu.read_byte(0x7FFF), 0xFF);
}

#[test]
fn wram_round_trip_and_echo_mirror() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xC000, 0xAA);
    assert_eq!(mmu.read_byte(0xC000), 0xAA);
    assert_eq!(mmu.read_byte(0xE000), 0xAA);

    mmu.write_byte(0xFDFF, 0xBB);
    assert_eq!(mmu.read_byte(0xDDFF), 0xBB);
}

#[test]
fn vram_and_oam_are_bus_accessible() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0x8000, 0x11);
    mmu.write_byte(0x9FFF, 0x22);
    assert_eq!(mmu.read_byte(0x8000), 0x11);
    assert_eq!(mmu.read_byte(0x9FFF), 0x22);
    assert_eq!(mmu.ppu.vram[0], 0x11);

    mmu.write_byte(0xFE00, 0x33);
    assert_eq!(mmu.read_byte(0xFE00), 0x33);
    assert_eq!(mmu.ppu.oam[0], 0x33);
}

#[test]
fn hram_round_trip_at_both_ends() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFF80, 0x01);
    mmu.write_byte(0xFFFE, 0x02);
    assert_eq!(mmu.read_byte(0xFF80), 0x01);
    assert_eq!(mmu.read_byte(0xFFFE), 0x02);
}

#[test]
fn external_ram_region_is_open_bus() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xA000, 0x55);
    assert_eq!(mmu.read_byte(0xA000), 0xFF);
    assert!(mmu.counters.open_bus_reads > 0);
}

#[test]
fn unusable_region_reads_ff() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFEA0, 0x77);
    assert_eq!(mmu.read_byte(0xFEA0), 0xFF);
    assert_eq!(mmu.read_byte(0xFEFF), 0xFF);
}

#[test]
fn joypad_reads_zero() {
    let mut mmu = Mmu::new();
    assert_eq!(mmu.read_byte(0xFF00), 0x00);
}

#[test]
fn unimplemented_io_reads_ff_and_counts_writes() {
    let mut mmu = Mmu::new();
    assert_eq!(mmu.read_byte(0xFF03), 0xFF);
    assert_eq!(mmu.read_byte(0xFF48), 0xFF);
    let before = mmu.counters.unhandled_io_writes;
    mmu.write_byte(0xFF03, 0x12);
    assert_eq!(mmu.counters.unhandled_io_writes, before + 1);
}

#[test]
fn if_register_upper_bits_read_as_one() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFF0F, 0x05);
    assert_eq!(mmu.read_byte(0xFF0F), 0xE5);
    assert_eq!(mmu.if_reg, 0x05);
}

#[test]
fn ie_register_round_trips() {
    let mut mmu = Mmu::new();
    mmu.write_byte(0xFFFF, 0x1F);
    assert_eq!(mmu.read_byte(0xFFFF), 0x1F);
}

#[test]
fn ly_write_resets_to_zero() {
    let mut mmu = Mmu::new();
    mmu.ppu.ly = 77;
    mmu.write_byte(0xFF44, 0x99);
    assert_eq!(mmu.read_byte(0xFF44), 0);
}

#[test]
fn serial_bytes_are_collected_through_the_bus() {
    let mut mmu = Mmu::new();
    for &byte in b"Passed" {
        mmu.write_byte(0xFF01, byte);
        mmu.write_byte(0xFF02, 0x81);
    }
    assert_eq!(mmu.take_serial(), b"Passed");
    assert!(mmu.take_serial().is_empty());
}

#[test]
fn request_interrupt_sets_if_bits() {
    let mut mmu = Mmu::new();
    mmu.if_reg = 0;
    mmu.request_interrupt(0);
    mmu.request_interrupt(4);
    assert_eq!(mmu.if_reg, 0x11);
}
