//! Instruction semantics. One handler arm per opcode, backed by shared
//! helpers for register indirection, flag recomputation,
//! arithmetic-with-overflow, and jump-target resolution.

use wordvm_common::{flag, Opcode, Word};

use crate::console::Console;
use crate::processor::Processor;

impl<C: Console> Processor<C> {
    pub(crate) fn execute(&mut self, opcode: Opcode, word: Word) {
        match opcode {
            // The dispatch loop stops on a zero opcode before it reaches the
            // handlers.
            Opcode::Halt => {}

            Opcode::Jmp => {
                let target = self.jump_target(word);
                self.set_ip(target);
            }
            Opcode::Jeq => self.branch(word, self.get_flag(flag::EQ_INT)),
            Opcode::JeqU => self.branch(word, self.get_flag(flag::EQ_UINT)),
            Opcode::JeqF => self.branch(word, self.get_flag(flag::EQ_FLOAT)),
            Opcode::Jgt => self.branch(word, self.get_flag(flag::GT_INT)),
            Opcode::JgtU => self.branch(word, self.get_flag(flag::GT_UINT)),
            Opcode::JgtF => self.branch(
                word,
                !self.get_flag(flag::EQ_FLOAT) && self.get_flag(flag::GT_FLOAT),
            ),
            Opcode::Jlt => self.branch(
                word,
                !self.get_flag(flag::EQ_INT) && !self.get_flag(flag::GT_INT),
            ),
            Opcode::JltU => self.branch(
                word,
                !self.get_flag(flag::EQ_UINT) && !self.get_flag(flag::GT_UINT),
            ),
            Opcode::JltF => self.branch(
                word,
                !self.get_flag(flag::EQ_FLOAT) && !self.get_flag(flag::GT_FLOAT),
            ),
            Opcode::Jne => self.branch(word, !self.get_flag(flag::EQ_INT)),
            Opcode::JneU => self.branch(word, !self.get_flag(flag::EQ_UINT)),
            Opcode::JneF => self.branch(word, !self.get_flag(flag::EQ_FLOAT)),
            Opcode::Jge => self.branch(
                word,
                self.get_flag(flag::EQ_INT) || self.get_flag(flag::GT_INT),
            ),
            Opcode::JgeU => self.branch(
                word,
                self.get_flag(flag::EQ_UINT) || self.get_flag(flag::GT_UINT),
            ),
            Opcode::JgeF => self.branch(
                word,
                self.get_flag(flag::EQ_FLOAT) || self.get_flag(flag::GT_FLOAT),
            ),
            Opcode::Jle => self.branch(word, !self.get_flag(flag::GT_INT)),
            Opcode::JleU => self.branch(word, !self.get_flag(flag::GT_UINT)),
            Opcode::JleF => self.branch(word, !self.get_flag(flag::GT_FLOAT)),

            Opcode::Print => {
                let value = self.reg_val(word.op_c()).as_i32();
                self.console.write_line(&value.to_string());
            }
            Opcode::PrintU => {
                let value = self.reg_val(word.op_c()).as_u32();
                self.console.write_line(&value.to_string());
            }
            Opcode::PrintF => {
                let value = self.reg_val(word.op_c()).as_f32();
                self.console.write_line(&value.to_string());
            }

            Opcode::Load => {
                self.address_regs[word.op_a() as usize] = word.addr();
            }

            Opcode::Neg => {
                let result = Word::from_i32(self.reg_val(word.op_c()).as_i32().wrapping_neg());
                self.set_int_flags(result);
                self.set_reg_val(word.op_c(), result);
            }
            Opcode::NegF => {
                let result = Word::from_f32(-self.reg_val(word.op_c()).as_f32());
                self.set_float_flags(result);
                self.set_reg_val(word.op_c(), result);
            }

            Opcode::Cmp => {
                let val1 = self.reg_val(word.op_a()).as_i32();
                let val2 = self.reg_val(word.op_b()).as_i32();
                self.set_flag(flag::EQ_INT, val1 == val2);
                self.set_flag(flag::GT_INT, val1 > val2);
            }
            Opcode::CmpU => {
                let val1 = self.reg_val(word.op_a()).as_u32();
                let val2 = self.reg_val(word.op_b()).as_u32();
                self.set_flag(flag::EQ_UINT, val1 == val2);
                self.set_flag(flag::GT_UINT, val1 > val2);
            }
            Opcode::CmpF => {
                let val1 = self.reg_val(word.op_a()).as_f32();
                let val2 = self.reg_val(word.op_b()).as_f32();
                self.set_flag(flag::EQ_FLOAT, val1 == val2);
                self.set_flag(flag::GT_FLOAT, val1 > val2);
            }

            Opcode::Add => {
                let result =
                    self.add_ints(self.reg_val(word.op_b()), self.reg_val(word.op_c()));
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::Sub => {
                let result =
                    self.sub_ints(self.reg_val(word.op_b()), self.reg_val(word.op_c()));
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::AddF => {
                let result =
                    self.add_floats(self.reg_val(word.op_b()), self.reg_val(word.op_c()));
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::SubF => {
                let rhs = Word::from_f32(-self.reg_val(word.op_c()).as_f32());
                let result = self.add_floats(self.reg_val(word.op_b()), rhs);
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::Mul => {
                let result =
                    self.mul_ints(self.reg_val(word.op_b()), self.reg_val(word.op_c()));
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::MulF => {
                let result =
                    self.mul_floats(self.reg_val(word.op_b()), self.reg_val(word.op_c()));
                self.set_reg_val(word.op_a(), result);
            }

            Opcode::Div => self.div_mod_signed(word, false),
            Opcode::Mod => self.div_mod_signed(word, true),
            Opcode::DivU => self.div_mod_unsigned(word, false),
            Opcode::ModU => self.div_mod_unsigned(word, true),
            Opcode::DivF => {
                let divisor = self.reg_val(word.op_c()).as_f32();
                self.set_flag(flag::DIV_ZERO, divisor == 0.0);
                let result = Word::from_f32(self.reg_val(word.op_b()).as_f32() / divisor);
                self.set_float_flags(result);
                self.set_reg_val(word.op_a(), result);
            }

            Opcode::Inc => {
                let result = self.add_ints(self.reg_val(word.op_c()), Word::from_i32(1));
                self.set_reg_val(word.op_c(), result);
            }
            Opcode::Dec => {
                let result = self.sub_ints(self.reg_val(word.op_c()), Word::from_i32(1));
                self.set_reg_val(word.op_c(), result);
            }

            Opcode::Read => {
                let value: i32 = self.read_console();
                self.set_reg_val(word.op_c(), Word::from_i32(value));
            }
            Opcode::ReadU => {
                let value: u32 = self.read_console();
                self.set_reg_val(word.op_c(), Word::from_u32(value));
            }
            Opcode::ReadF => {
                let value: f32 = self.read_console();
                self.set_reg_val(word.op_c(), Word::from_f32(value));
            }

            Opcode::And => {
                let result = Word::from_u32(
                    self.reg_val(word.op_b()).as_u32() & self.reg_val(word.op_c()).as_u32(),
                );
                self.set_int_flags(result);
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::Or => {
                let result = Word::from_u32(
                    self.reg_val(word.op_b()).as_u32() | self.reg_val(word.op_c()).as_u32(),
                );
                self.set_int_flags(result);
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::Xor => {
                let result = Word::from_u32(
                    self.reg_val(word.op_b()).as_u32() ^ self.reg_val(word.op_c()).as_u32(),
                );
                self.set_int_flags(result);
                self.set_reg_val(word.op_a(), result);
            }
            Opcode::Not => {
                let result = Word::from_u32(!self.reg_val(word.op_c()).as_u32());
                self.set_int_flags(result);
                self.set_reg_val(word.op_a(), result);
            }

            Opcode::CopyR => {
                self.address_regs[word.op_a() as usize] =
                    self.address_regs[word.op_b() as usize];
            }
            Opcode::CopyV => {
                let value = self.reg_val(word.op_b());
                self.set_reg_val(word.op_a(), value);
            }

            Opcode::Call => {
                // Push the word after the call, then land one word short of
                // the target; the loop's automatic advance covers the rest.
                let return_to = self.ip().wrapping_add(2);
                self.push(return_to);
                self.set_ip(word.addr().wrapping_sub(2));
            }
            Opcode::Ret => {
                let return_to = self.pop();
                self.set_ip(return_to.wrapping_sub(2));
            }

            Opcode::GetFlag => {
                let value = Word::from_u32(u32::from(self.get_flag(word.op_b())));
                self.set_reg_val(word.op_a(), value);
            }
            Opcode::SetFlag => {
                let value = self.reg_val(word.op_b());
                self.set_flag(word.op_a(), value.as_u32() != 0);
            }
        }
    }

    /// Zero/parity/sign from an integer result. Parity records evenness.
    fn set_int_flags(&mut self, word: Word) {
        self.set_flag(flag::ZERO, word.as_i32() == 0);
        self.set_flag(flag::PARITY, word.as_i32() % 2 == 0);
        self.set_flag(flag::SIGN, word.as_i32() < 0);
    }

    /// Zero/sign from a float result.
    fn set_float_flags(&mut self, word: Word) {
        self.set_flag(flag::ZERO, word.as_f32() == 0.0);
        self.set_flag(flag::SIGN, word.as_f32() < 0.0);
    }

    /// Integer addition through a 64-bit intermediate. The overflow flag
    /// records disagreement between the wide sum and the truncated signed
    /// result; the carry flag records that the truncated result matches the
    /// wide sum under neither interpretation (signed or unsigned), so a
    /// signed overflow always carries.
    fn add_ints(&mut self, lhs: Word, rhs: Word) -> Word {
        let wide = i64::from(lhs.as_i32()) + i64::from(rhs.as_i32());
        let wide_unsigned = u64::from(lhs.as_u32()) + u64::from(rhs.as_u32());
        let result = Word::from_i32(wide as i32);

        let overflow = wide != i64::from(result.as_i32());
        self.set_flag(flag::INT_OVERFLOW, overflow);
        self.set_flag(
            flag::CARRY,
            overflow || wide_unsigned != u64::from(result.as_u32()),
        );
        self.set_int_flags(result);
        result
    }

    /// Subtraction is addition of the negated right operand.
    fn sub_ints(&mut self, lhs: Word, rhs: Word) -> Word {
        self.add_ints(lhs, Word::from_i32(rhs.as_i32().wrapping_neg()))
    }

    fn mul_ints(&mut self, lhs: Word, rhs: Word) -> Word {
        let wide = i64::from(lhs.as_i32()) * i64::from(rhs.as_i32());
        let wide_unsigned = u64::from(lhs.as_u32()) * u64::from(rhs.as_u32());
        let result = Word::from_i32(wide as i32);

        let overflow = wide != i64::from(result.as_i32());
        self.set_flag(flag::INT_OVERFLOW, overflow);
        self.set_flag(
            flag::CARRY,
            overflow || wide_unsigned != u64::from(result.as_u32()),
        );
        self.set_int_flags(result);
        result
    }

    /// Float addition in single precision, with the float-overflow flag set
    /// when a double-precision computation disagrees with the truncated
    /// result.
    fn add_floats(&mut self, lhs: Word, rhs: Word) -> Word {
        let result = Word::from_f32(lhs.as_f32() + rhs.as_f32());
        let wide = f64::from(lhs.as_f32()) + f64::from(rhs.as_f32());
        self.set_flag(flag::FLOAT_OVERFLOW, f64::from(result.as_f32()) != wide);
        self.set_float_flags(result);
        result
    }

    fn mul_floats(&mut self, lhs: Word, rhs: Word) -> Word {
        let result = Word::from_f32(lhs.as_f32() * rhs.as_f32());
        let wide = f64::from(lhs.as_f32()) * f64::from(rhs.as_f32());
        self.set_flag(flag::FLOAT_OVERFLOW, f64::from(result.as_f32()) != wide);
        self.set_float_flags(result);
        result
    }

    /// Signed division/remainder. A zero divisor sets the division-by-zero
    /// flag and yields 0; `i32::MIN / -1` wraps.
    fn div_mod_signed(&mut self, word: Word, take_remainder: bool) {
        let divisor = self.reg_val(word.op_c()).as_i32();
        self.set_flag(flag::DIV_ZERO, divisor == 0);
        let dividend = self.reg_val(word.op_b()).as_i32();
        let value = if divisor == 0 {
            0
        } else if take_remainder {
            dividend.wrapping_rem(divisor)
        } else {
            dividend.wrapping_div(divisor)
        };
        let result = Word::from_i32(value);
        self.set_int_flags(result);
        self.set_reg_val(word.op_a(), result);
    }

    fn div_mod_unsigned(&mut self, word: Word, take_remainder: bool) {
        let divisor = self.reg_val(word.op_c()).as_u32();
        self.set_flag(flag::DIV_ZERO, divisor == 0);
        let dividend = self.reg_val(word.op_b()).as_u32();
        let value = if divisor == 0 {
            0
        } else if take_remainder {
            dividend % divisor
        } else {
            dividend / divisor
        };
        let result = Word::from_u32(value);
        self.set_int_flags(result);
        self.set_reg_val(word.op_a(), result);
    }

    /// Resolve a jump target. The mode selector rides in slot a:
    /// 0 absolute, 1 absolute-indirect, 2 sum of two address registers,
    /// anything else relative to the instruction pointer.
    fn jump_target(&self, word: Word) -> u16 {
        match word.op_a() {
            0 => word.addr(),
            1 => self.memory().read_word(word.addr()).as_u32() as u16,
            2 => self
                .address_reg(word.op_c())
                .wrapping_add(self.address_reg(word.op_b())),
            _ => self.ip().wrapping_add(word.addr()),
        }
    }

    /// Apply the resolved target or fall through by exactly one word.
    fn branch(&mut self, word: Word, taken: bool) {
        let next = if taken {
            self.jump_target(word)
        } else {
            self.ip().wrapping_add(2)
        };
        self.set_ip(next);
    }

    fn read_console<T: std::str::FromStr + Default>(&mut self) -> T {
        self.console.read_line().trim().parse().unwrap_or_default()
    }
}
