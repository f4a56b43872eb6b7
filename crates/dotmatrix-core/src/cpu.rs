use thiserror::Error;

use crate::alu::{self, Flags};
use crate::mmu::Mmu;

// Interrupt vectors, in priority order (bit 0 first).
const INTERRUPT_VBLANK: u16 = 0x40;
const INTERRUPT_STAT: u16 = 0x48;
const INTERRUPT_TIMER: u16 = 0x50;
const INTERRUPT_SERIAL: u16 = 0x58;
const INTERRUPT_JOYPAD: u16 = 0x60;

// Post-boot CPU state; cartridge entry point is 0x0100.
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;
const BOOT_A: u8 = 0x01;
const BOOT_F: u8 = 0xB0;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;

const CYCLES_PER_M_CYCLE: u32 = 4;

/// Fatal execution faults. Non-fatal bus conditions never reach here; they
/// are absorbed and counted by the bus.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("illegal opcode {opcode:#04X} at PC = {pc:#06X}")]
    IllegalOpcode { opcode: u8, pc: u16 },
    #[error("HALT with IME=0 and pending enabled interrupts at PC = {pc:#06X}")]
    HaltWithPendingInterrupts { pc: u16 },
}

/// What to do when HALT executes with IME=0 while an enabled interrupt is
/// already pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HaltBugPolicy {
    /// Reproduce the hardware bug: the byte after HALT is fetched without
    /// advancing PC, so it executes twice.
    #[default]
    Emulate,
    /// Surface `StepError::HaltWithPendingInterrupts` instead.
    FailFast,
}

pub struct Cpu {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub flags: Flags,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub halted: bool,
    /// Lifetime machine-cycle count.
    pub cycles: u64,
    halt_bug: bool,
    halt_policy: HaltBugPolicy,
    /// Cycles charged by the step in progress.
    step_cycles: u32,
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_halt_policy(HaltBugPolicy::default())
    }

    pub fn with_halt_policy(halt_policy: HaltBugPolicy) -> Self {
        Self {
            a: BOOT_A,
            b: BOOT_B,
            c: BOOT_C,
            d: BOOT_D,
            e: BOOT_E,
            h: BOOT_H,
            l: BOOT_L,
            flags: Flags::from_byte(BOOT_F),
            pc: BOOT_PC,
            sp: BOOT_SP,
            ime: false,
            halted: false,
            cycles: 0,
            halt_bug: false,
            halt_policy,
            step_cycles: 0,
        }
    }

    pub fn halt_policy(&self) -> HaltBugPolicy {
        self.halt_policy
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.flags.to_byte() as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.flags = Flags::from_byte(val as u8);
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.get_af(),
            self.get_bc(),
            self.get_de(),
            self.get_hl(),
            self.pc,
            self.sp,
            self.cycles
        )
    }

    #[inline]
    fn tick(&mut self, m_cycles: u32) {
        let charged = m_cycles * CYCLES_PER_M_CYCLE;
        self.step_cycles += charged;
        self.cycles += charged as u64;
    }

    #[inline(always)]
    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    #[inline(always)]
    fn read8(&mut self, mmu: &mut Mmu, addr: u16) -> u8 {
        let val = mmu.read_byte(addr);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn write8(&mut self, mmu: &mut Mmu, addr: u16, val: u8) {
        mmu.write_byte(addr, val);
        self.tick(1);
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.write8(mmu, self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        self.write8(mmu, self.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.read8(mmu, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = self.read8(mmu, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    /// Register-file read over the 8-slot selector; slot 6 is the memory
    /// operand at (HL).
    fn read_reg(&mut self, mmu: &mut Mmu, index: u8) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => self.read8(mmu, self.get_hl()),
            7 => self.a,
            _ => unreachable!(),
        }
    }

    fn write_reg(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        match index {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => {
                let addr = self.get_hl();
                self.write8(mmu, addr, val);
            }
            7 => self.a = val,
            _ => unreachable!(),
        }
    }

    /// Branch condition from bits 3-4 of the opcode: NZ, Z, NC, C.
    fn condition(&self, index: u8) -> bool {
        match index {
            0 => !self.flags.zero,
            1 => self.flags.zero,
            2 => !self.flags.carry,
            3 => self.flags.carry,
            _ => unreachable!(),
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.flags.zero = res == 0;
        self.flags.subtract = false;
        self.flags.half_carry = (val & 0x0F) + 1 > 0x0F;
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.flags.zero = res == 0;
        self.flags.subtract = true;
        self.flags.half_carry = val & 0x0F == 0;
        res
    }

    /// ADD HL, rr. Z is untouched; H and C come from the 16-bit add.
    fn add16_hl(&mut self, rhs: u16) {
        let hl = self.get_hl();
        self.flags.subtract = false;
        self.flags.half_carry = (hl & 0x0FFF) + (rhs & 0x0FFF) > 0x0FFF;
        self.flags.carry = hl as u32 + rhs as u32 > 0xFFFF;
        self.set_hl(hl.wrapping_add(rhs));
    }

    /// SP + signed immediate, shared by ADD SP, r8 and LD HL, SP+r8.
    /// Z and N are cleared; H and C come from the low-byte add.
    fn sp_plus_offset(&mut self, mmu: &mut Mmu) -> u16 {
        let offset = self.fetch8(mmu) as i8 as i16 as u16;
        let sp = self.sp;
        self.flags.zero = false;
        self.flags.subtract = false;
        self.flags.half_carry = (sp & 0x000F) + (offset & 0x000F) > 0x000F;
        self.flags.carry = (sp & 0x00FF) + (offset & 0x00FF) > 0x00FF;
        sp.wrapping_add(offset)
    }

    fn next_interrupt(pending: u8) -> (u8, u16) {
        if pending & 0x01 != 0 {
            (0x01, INTERRUPT_VBLANK)
        } else if pending & 0x02 != 0 {
            (0x02, INTERRUPT_STAT)
        } else if pending & 0x04 != 0 {
            (0x04, INTERRUPT_TIMER)
        } else if pending & 0x08 != 0 {
            (0x08, INTERRUPT_SERIAL)
        } else {
            (0x10, INTERRUPT_JOYPAD)
        }
    }

    /// Accept the highest-priority pending, enabled interrupt, if any.
    ///
    /// The driver calls this after the timer and LCD have advanced, so an
    /// interrupt they raised during instruction N is dispatched before
    /// instruction N+1. Returns the 20 dispatch cycles, or 0.
    pub fn service_interrupts(&mut self, mmu: &mut Mmu) -> u32 {
        let pending = mmu.if_reg & mmu.ie_reg & 0x1F;
        if pending == 0 {
            return 0;
        }

        // A pending interrupt always wakes a halted CPU, dispatched or not.
        self.halted = false;

        if !self.ime {
            return 0;
        }

        self.step_cycles = 0;
        let (bit, vector) = Self::next_interrupt(pending);
        self.ime = false;
        mmu.if_reg &= !bit;
        self.push_stack(mmu, self.pc);
        self.pc = vector;
        self.tick(3);
        self.step_cycles
    }

    /// Execute one instruction and return its cost in machine cycles.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32, StepError> {
        self.step_cycles = 0;

        if self.halted {
            // Idle; the timers and LCD keep running off these cycles.
            self.tick(1);
            return Ok(self.step_cycles);
        }

        let instruction_pc = self.pc;
        let opcode = if self.halt_bug {
            // The byte after HALT is fetched without advancing PC.
            self.halt_bug = false;
            self.read8(mmu, self.pc)
        } else {
            self.fetch8(mmu)
        };

        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(mmu);
                match (opcode >> 4) & 0x03 {
                    0 => self.set_bc(val),
                    1 => self.set_de(val),
                    2 => self.set_hl(val),
                    _ => self.sp = val,
                }
            }
            0x02 => {
                let addr = self.get_bc();
                self.write8(mmu, addr, self.a);
            }
            0x03 => {
                let val = self.get_bc().wrapping_add(1);
                self.set_bc(val);
                self.tick(1);
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let index = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, index);
                let res = self.inc8(val);
                self.write_reg(mmu, index, res);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let index = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, index);
                let res = self.dec8(val);
                self.write_reg(mmu, index, res);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let index = (opcode >> 3) & 0x07;
                let val = self.fetch8(mmu);
                self.write_reg(mmu, index, val);
            }
            0x07 => {
                let carry = self.a & 0x80 != 0;
                self.a = self.a.rotate_left(1);
                self.flags = Flags {
                    carry,
                    ..Flags::default()
                };
            }
            0x08 => {
                let addr = self.fetch16(mmu);
                self.write8(mmu, addr, self.sp as u8);
                self.write8(mmu, addr.wrapping_add(1), (self.sp >> 8) as u8);
            }
            0x09 => {
                let rhs = self.get_bc();
                self.add16_hl(rhs);
                self.tick(1);
            }
            0x0A => {
                let addr = self.get_bc();
                self.a = self.read8(mmu, addr);
            }
            0x0B => {
                let val = self.get_bc().wrapping_sub(1);
                self.set_bc(val);
                self.tick(1);
            }
            0x0F => {
                let carry = self.a & 0x01 != 0;
                self.a = self.a.rotate_right(1);
                self.flags = Flags {
                    carry,
                    ..Flags::default()
                };
            }
            0x10 => {
                // STOP behaves as a HALT variant; the padding byte is consumed.
                let _ = self.fetch8(mmu);
                self.halted = true;
            }
            0x12 => {
                let addr = self.get_de();
                self.write8(mmu, addr, self.a);
            }
            0x13 => {
                let val = self.get_de().wrapping_add(1);
                self.set_de(val);
                self.tick(1);
            }
            0x17 => {
                let carry = self.a & 0x80 != 0;
                self.a = (self.a << 1) | self.flags.carry as u8;
                self.flags = Flags {
                    carry,
                    ..Flags::default()
                };
            }
            0x18 => {
                let offset = self.fetch8(mmu) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
                self.tick(1);
            }
            0x19 => {
                let rhs = self.get_de();
                self.add16_hl(rhs);
                self.tick(1);
            }
            0x1A => {
                let addr = self.get_de();
                self.a = self.read8(mmu, addr);
            }
            0x1B => {
                let val = self.get_de().wrapping_sub(1);
                self.set_de(val);
                self.tick(1);
            }
            0x1F => {
                let carry = self.a & 0x01 != 0;
                self.a = (self.a >> 1) | ((self.flags.carry as u8) << 7);
                self.flags = Flags {
                    carry,
                    ..Flags::default()
                };
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pc.wrapping_add(offset as u16);
                    self.tick(1);
                }
            }
            0x22 => {
                let addr = self.get_hl();
                self.write8(mmu, addr, self.a);
                self.set_hl(addr.wrapping_add(1));
            }
            0x23 => {
                let val = self.get_hl().wrapping_add(1);
                self.set_hl(val);
                self.tick(1);
            }
            0x27 => {
                // Binary-coded-decimal correction of A, driven by N, H, C.
                let mut correction = 0u8;
                let mut carry = false;
                if self.flags.half_carry || (!self.flags.subtract && (self.a & 0x0F) > 0x09) {
                    correction |= 0x06;
                }
                if self.flags.carry || (!self.flags.subtract && self.a > 0x99) {
                    correction |= 0x60;
                    carry = true;
                }
                self.a = if self.flags.subtract {
                    self.a.wrapping_sub(correction)
                } else {
                    self.a.wrapping_add(correction)
                };
                self.flags.zero = self.a == 0;
                self.flags.half_carry = false;
                self.flags.carry = carry;
            }
            0x29 => {
                let rhs = self.get_hl();
                self.add16_hl(rhs);
                self.tick(1);
            }
            0x2A => {
                let addr = self.get_hl();
                self.a = self.read8(mmu, addr);
                self.set_hl(addr.wrapping_add(1));
            }
            0x2B => {
                let val = self.get_hl().wrapping_sub(1);
                self.set_hl(val);
                self.tick(1);
            }
            0x2F => {
                self.a = !self.a;
                self.flags.subtract = true;
                self.flags.half_carry = true;
            }
            0x32 => {
                let addr = self.get_hl();
                self.write8(mmu, addr, self.a);
                self.set_hl(addr.wrapping_sub(1));
            }
            0x33 => {
                self.sp = self.sp.wrapping_add(1);
                self.tick(1);
            }
            0x37 => {
                self.flags.subtract = false;
                self.flags.half_carry = false;
                self.flags.carry = true;
            }
            0x39 => {
                let rhs = self.sp;
                self.add16_hl(rhs);
                self.tick(1);
            }
            0x3A => {
                let addr = self.get_hl();
                self.a = self.read8(mmu, addr);
                self.set_hl(addr.wrapping_sub(1));
            }
            0x3B => {
                self.sp = self.sp.wrapping_sub(1);
                self.tick(1);
            }
            0x3F => {
                self.flags.subtract = false;
                self.flags.half_carry = false;
                self.flags.carry = !self.flags.carry;
            }
            0x76 => {
                let pending = mmu.if_reg & mmu.ie_reg & 0x1F;
                if self.ime || pending == 0 {
                    self.halted = true;
                } else {
                    match self.halt_policy {
                        HaltBugPolicy::Emulate => self.halt_bug = true,
                        HaltBugPolicy::FailFast => {
                            return Err(StepError::HaltWithPendingInterrupts {
                                pc: instruction_pc,
                            });
                        }
                    }
                }
            }
            0x40..=0x7F => {
                let src = opcode & 0x07;
                let dest = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, src);
                self.write_reg(mmu, dest, val);
            }
            0x80..=0x87 => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.a = alu::add(self.a, val, 0, &mut self.flags);
            }
            0x88..=0x8F => {
                let val = self.read_reg(mmu, opcode & 0x07);
                let carry_in = self.flags.carry as u8;
                self.a = alu::add(self.a, val, carry_in, &mut self.flags);
            }
            0x90..=0x97 => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.a = alu::sub(self.a, val, 0, &mut self.flags);
            }
            0x98..=0x9F => {
                let val = self.read_reg(mmu, opcode & 0x07);
                let borrow_in = self.flags.carry as u8;
                self.a = alu::sub(self.a, val, borrow_in, &mut self.flags);
            }
            0xA0..=0xA7 => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.a &= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    half_carry: true,
                    ..Flags::default()
                };
            }
            0xA8..=0xAF => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.a ^= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    ..Flags::default()
                };
            }
            0xB0..=0xB7 => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.a |= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    ..Flags::default()
                };
            }
            0xB8..=0xBF => {
                // CP: subtract without storing the result.
                let val = self.read_reg(mmu, opcode & 0x07);
                alu::sub(self.a, val, 0, &mut self.flags);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                self.tick(1);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pop_stack(mmu);
                    self.tick(1);
                }
            }
            0xC1 => {
                let val = self.pop_stack(mmu);
                self.set_bc(val);
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(mmu);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = addr;
                    self.tick(1);
                }
            }
            0xC3 => {
                let addr = self.fetch16(mmu);
                self.pc = addr;
                self.tick(1);
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(mmu);
                if self.condition((opcode >> 3) & 0x03) {
                    self.tick(1);
                    self.push_stack(mmu, self.pc);
                    self.pc = addr;
                }
            }
            0xC5 => {
                let val = self.get_bc();
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xC6 => {
                let val = self.fetch8(mmu);
                self.a = alu::add(self.a, val, 0, &mut self.flags);
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                // RST: vector is encoded in opcode bits 3-5.
                let target = (opcode & 0x38) as u16;
                self.tick(1);
                self.push_stack(mmu, self.pc);
                self.pc = target;
            }
            0xC9 => {
                self.pc = self.pop_stack(mmu);
                self.tick(1);
            }
            0xCB => {
                let extended = self.fetch8(mmu);
                self.execute_extended(mmu, extended);
            }
            0xCD => {
                let addr = self.fetch16(mmu);
                self.tick(1);
                self.push_stack(mmu, self.pc);
                self.pc = addr;
            }
            0xCE => {
                let val = self.fetch8(mmu);
                let carry_in = self.flags.carry as u8;
                self.a = alu::add(self.a, val, carry_in, &mut self.flags);
            }
            0xD1 => {
                let val = self.pop_stack(mmu);
                self.set_de(val);
            }
            0xD5 => {
                let val = self.get_de();
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xD6 => {
                let val = self.fetch8(mmu);
                self.a = alu::sub(self.a, val, 0, &mut self.flags);
            }
            0xD9 => {
                // RETI: return and atomically re-enable interrupts.
                self.pc = self.pop_stack(mmu);
                self.ime = true;
                self.tick(1);
            }
            0xDE => {
                let val = self.fetch8(mmu);
                let borrow_in = self.flags.carry as u8;
                self.a = alu::sub(self.a, val, borrow_in, &mut self.flags);
            }
            0xE0 => {
                let offset = self.fetch8(mmu);
                let addr = 0xFF00 | offset as u16;
                self.write8(mmu, addr, self.a);
            }
            0xE1 => {
                let val = self.pop_stack(mmu);
                self.set_hl(val);
            }
            0xE2 => {
                let addr = 0xFF00 | self.c as u16;
                self.write8(mmu, addr, self.a);
            }
            0xE5 => {
                let val = self.get_hl();
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xE6 => {
                let val = self.fetch8(mmu);
                self.a &= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    half_carry: true,
                    ..Flags::default()
                };
            }
            0xE8 => {
                self.sp = self.sp_plus_offset(mmu);
                self.tick(2);
            }
            0xE9 => {
                // Jump to HL itself, not memory at HL.
                self.pc = self.get_hl();
            }
            0xEA => {
                let addr = self.fetch16(mmu);
                self.write8(mmu, addr, self.a);
            }
            0xEE => {
                let val = self.fetch8(mmu);
                self.a ^= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    ..Flags::default()
                };
            }
            0xF0 => {
                let offset = self.fetch8(mmu);
                let addr = 0xFF00 | offset as u16;
                self.a = self.read8(mmu, addr);
            }
            0xF1 => {
                let val = self.pop_stack(mmu);
                self.set_af(val);
            }
            0xF2 => {
                let addr = 0xFF00 | self.c as u16;
                self.a = self.read8(mmu, addr);
            }
            0xF3 => {
                self.ime = false;
            }
            0xF5 => {
                let val = self.get_af();
                self.tick(1);
                self.push_stack(mmu, val);
            }
            0xF6 => {
                let val = self.fetch8(mmu);
                self.a |= val;
                self.flags = Flags {
                    zero: self.a == 0,
                    ..Flags::default()
                };
            }
            0xF8 => {
                let val = self.sp_plus_offset(mmu);
                self.set_hl(val);
                self.tick(1);
            }
            0xF9 => {
                self.sp = self.get_hl();
                self.tick(1);
            }
            0xFA => {
                let addr = self.fetch16(mmu);
                self.a = self.read8(mmu, addr);
            }
            0xFB => {
                self.ime = true;
            }
            0xFE => {
                let val = self.fetch8(mmu);
                alu::sub(self.a, val, 0, &mut self.flags);
            }
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                core_warn!("cpu", "illegal opcode {opcode:02X} at PC={instruction_pc:04X}");
                return Err(StepError::IllegalOpcode {
                    opcode,
                    pc: instruction_pc,
                });
            }
        }

        Ok(self.step_cycles)
    }

    /// The 0xCB-prefixed page: rotates, shifts, SWAP and single-bit ops
    /// over the 8-slot register file.
    fn execute_extended(&mut self, mmu: &mut Mmu, opcode: u8) {
        let index = opcode & 0x07;
        match opcode {
            0x00..=0x07 => {
                let val = self.read_reg(mmu, index);
                let res = val.rotate_left(1);
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x80 != 0,
                    ..Flags::default()
                };
            }
            0x08..=0x0F => {
                let val = self.read_reg(mmu, index);
                let res = val.rotate_right(1);
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x01 != 0,
                    ..Flags::default()
                };
            }
            0x10..=0x17 => {
                let val = self.read_reg(mmu, index);
                let res = (val << 1) | self.flags.carry as u8;
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x80 != 0,
                    ..Flags::default()
                };
            }
            0x18..=0x1F => {
                let val = self.read_reg(mmu, index);
                let res = (val >> 1) | ((self.flags.carry as u8) << 7);
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x01 != 0,
                    ..Flags::default()
                };
            }
            0x20..=0x27 => {
                let val = self.read_reg(mmu, index);
                let res = val << 1;
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x80 != 0,
                    ..Flags::default()
                };
            }
            0x28..=0x2F => {
                // SRA keeps the sign bit.
                let val = self.read_reg(mmu, index);
                let res = (val >> 1) | (val & 0x80);
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x01 != 0,
                    ..Flags::default()
                };
            }
            0x30..=0x37 => {
                let val = self.read_reg(mmu, index);
                let res = val.rotate_left(4);
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    ..Flags::default()
                };
            }
            0x38..=0x3F => {
                let val = self.read_reg(mmu, index);
                let res = val >> 1;
                self.write_reg(mmu, index, res);
                self.flags = Flags {
                    zero: res == 0,
                    carry: val & 0x01 != 0,
                    ..Flags::default()
                };
            }
            0x40..=0x7F => {
                // BIT only reads its operand; C is untouched.
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, index);
                self.flags.zero = val & (1 << bit) == 0;
                self.flags.subtract = false;
                self.flags.half_carry = true;
            }
            0x80..=0xBF => {
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, index);
                self.write_reg(mmu, index, val & !(1 << bit));
            }
            0xC0..=0xFF => {
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, index);
                self.write_reg(mmu, index, val | (1 << bit));
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
