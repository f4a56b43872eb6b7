use crate::{
    cartridge::Cartridge,
    cpu::{Cpu, HaltBugPolicy, StepError},
    mmu::Mmu,
    serial::TraceSink,
};

/// Machine cycles in one full frame: 154 scanlines of 456 cycles.
pub const FRAME_CYCLES: u32 = 70224;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    pub fn new() -> Self {
        Self::with_halt_policy(HaltBugPolicy::default())
    }

    pub fn with_halt_policy(policy: HaltBugPolicy) -> Self {
        Self {
            cpu: Cpu::with_halt_policy(policy),
            mmu: Mmu::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
    }

    /// Route serial output (0xFF01 writes) to an external sink.
    pub fn connect_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        self.mmu.serial.connect(sink);
    }

    /// Run one driver iteration: execute an instruction, advance the timer
    /// and LCD by its cost, then service pending interrupts. A dispatch is
    /// charged through the timer and LCD the same way, so its 20 cycles
    /// are visible to them before the next instruction.
    pub fn step(&mut self) -> Result<u32, StepError> {
        let cycles = self.cpu.step(&mut self.mmu)?;
        self.mmu.advance(cycles);

        let dispatch = self.cpu.service_interrupts(&mut self.mmu);
        if dispatch > 0 {
            self.mmu.advance(dispatch);
        }
        Ok(cycles + dispatch)
    }

    /// Step until one frame's worth of cycles has elapsed. Returns the
    /// cycles actually executed (the last instruction may overshoot).
    pub fn run_frame(&mut self) -> Result<u32, StepError> {
        let mut elapsed = 0;
        while elapsed < FRAME_CYCLES {
            elapsed += self.step()?;
        }
        Ok(elapsed)
    }

    /// Row-major 160x144 RGBA framebuffer; readable at any time.
    pub fn framebuffer(&self) -> &[u32] {
        &self.mmu.ppu.framebuffer
    }

    /// Drain the bytes written to the serial port so far.
    pub fn take_serial(&mut self) -> Vec<u8> {
        self.mmu.take_serial()
    }

    /// Reset to the initial power-on state while preserving the loaded
    /// cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        let policy = self.halt_policy();
        self.cpu = Cpu::with_halt_policy(policy);
        self.mmu = Mmu::new();
        if let Some(cart) = cart {
            self.mmu.load_cart(cart);
        }
    }

    fn halt_policy(&self) -> HaltBugPolicy {
        self.cpu.halt_policy()
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
