use num_traits::FromPrimitive;
use wordvm_common::{CpuStats, ExecutionError, Opcode, Program, Word};

use crate::console::Console;
use crate::memory::Memory;

/// Number of address registers.
pub const ADDRESS_REGS: usize = 256;

/// First register of the ring buffer that backs call/return.
pub const STACK_BASE: u8 = 240;

/// The virtual processor: private memory, 256 address registers, a 16-bit
/// flag register, and the instruction pointer.
///
/// Address registers hold memory addresses, never data. Every register
/// operand of an instruction is dereferenced through memory: "the value in
/// register r" is the word stored at the address register r holds.
#[derive(Debug)]
pub struct Processor<C: Console> {
    pub(crate) memory: Memory,
    pub(crate) address_regs: [u16; ADDRESS_REGS],
    flags: u16,
    ip: u16,
    sp: u8,
    stats: CpuStats,
    verbose: bool,
    pub(crate) console: C,
}

impl<C: Console> Processor<C> {
    pub fn new(console: C) -> Self {
        Self {
            memory: Memory::new(),
            address_regs: [0; ADDRESS_REGS],
            flags: 0,
            ip: 0,
            sp: STACK_BASE,
            stats: CpuStats::default(),
            verbose: false,
            console,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Clear memory and registers. Flags and the stack pointer are left as
    /// construction set them.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.address_regs = [0; ADDRESS_REGS];
    }

    /// Write a loaded program image into memory.
    pub fn load(&mut self, program: &Program) {
        for &(address, word) in &program.words {
            self.memory.write_word(address, word);
        }
    }

    /// Fetch-decode-execute from `start` until a word whose opcode field is
    /// zero is fetched. Handlers in the jump group (opcodes 1..=19) set the
    /// instruction pointer themselves, taken or not; every other opcode gets
    /// the automatic advance to the next word.
    pub fn run(&mut self, start: u16) -> Result<CpuStats, ExecutionError> {
        self.ip = start;
        loop {
            let word = self.memory.read_word(self.ip);
            if word.opcode() == 0 {
                break;
            }
            let opcode = Opcode::from_u8(word.opcode())
                .ok_or(ExecutionError::InvalidOpcode(word.opcode(), self.ip))?;

            if self.verbose {
                println!(
                    "@{:<5} {} a={} b={} c={} adrs={}",
                    self.ip,
                    opcode,
                    word.op_a(),
                    word.op_b(),
                    word.op_c(),
                    word.addr()
                );
            }

            self.execute(opcode, word);
            if !opcode.is_jump() {
                self.ip = self.ip.wrapping_add(2);
            }
            self.stats.instructions += 1;
        }
        Ok(self.stats)
    }

    pub fn print_state(&self) {
        println!();
        println!("========== VM STATE ===========");
        println!("IP: {}", self.ip);
        println!("SP: {}", self.sp);
        println!("Flags: {:#018b}", self.flags);
        for (index, &address) in self.address_regs.iter().enumerate() {
            if address != 0 {
                println!("R{index}: @{address}");
            }
        }
    }

    /// Set or clear one flag bit. Indices are masked to the 16-bit flag
    /// register; the flag-transfer instructions carry the index in a full
    /// byte.
    pub fn set_flag(&mut self, index: u8, value: bool) {
        let mask = 1u16 << (index & 15);
        if value {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    #[must_use]
    pub fn get_flag(&self, index: u8) -> bool {
        self.flags & (1u16 << (index & 15)) != 0
    }

    #[must_use]
    pub fn ip(&self) -> u16 {
        self.ip
    }

    pub(crate) fn set_ip(&mut self, ip: u16) {
        self.ip = ip;
    }

    /// Push a return address onto the register-window stack: registers
    /// 240..=255 used as a ring. Pushing past the top wraps around and
    /// silently clobbers the oldest saved address.
    pub fn push(&mut self, address: u16) {
        self.address_regs[self.sp as usize] = address;
        self.sp = if self.sp == u8::MAX {
            STACK_BASE
        } else {
            self.sp + 1
        };
    }

    /// Pop a return address. Popping below the window base wraps to the top;
    /// an unbalanced pop yields whatever stale address is there.
    pub fn pop(&mut self) -> u16 {
        self.sp = if self.sp == STACK_BASE {
            u8::MAX
        } else {
            self.sp - 1
        };
        self.address_regs[self.sp as usize]
    }

    /// The effective value of a register operand: one memory dereference
    /// through the address the register holds.
    #[must_use]
    pub fn reg_val(&self, reg: u8) -> Word {
        self.memory.read_word(self.address_regs[reg as usize])
    }

    pub fn set_reg_val(&mut self, reg: u8, word: Word) {
        self.memory.write_word(self.address_regs[reg as usize], word);
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[must_use]
    pub fn address_reg(&self, reg: u8) -> u16 {
        self.address_regs[reg as usize]
    }
}
