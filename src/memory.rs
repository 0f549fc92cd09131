use wordvm_common::Word;

/// Number of 16-bit cells.
pub const MEM_SIZE: usize = 32768;

const ADDR_MASK: u16 = (MEM_SIZE - 1) as u16;

/// Flat word-addressable storage: 32768 16-bit cells, one `Word` spanning
/// two consecutive cells (low half first). Addresses are masked to the cell
/// range on every access, so out-of-range addresses wrap instead of
/// faulting; a word written at the last cell places its high half at cell 0.
#[derive(Debug)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEM_SIZE],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    #[must_use]
    pub fn read_word(&self, address: u16) -> Word {
        let low = self.cells[(address & ADDR_MASK) as usize];
        let high = self.cells[(address.wrapping_add(1) & ADDR_MASK) as usize];
        Word::from_cells(low, high)
    }

    pub fn write_word(&mut self, address: u16, word: Word) {
        self.cells[(address & ADDR_MASK) as usize] = word.low_cell();
        self.cells[(address.wrapping_add(1) & ADDR_MASK) as usize] = word.high_cell();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_and_clears() {
        let mut memory = Memory::new();
        assert_eq!(memory.read_word(100), Word::HALT);

        memory.write_word(100, Word::from_u32(0xDEAD_BEEF));
        assert_eq!(memory.read_word(100).as_u32(), 0xDEAD_BEEF);

        memory.clear();
        assert_eq!(memory.read_word(100), Word::HALT);
    }

    #[test]
    fn words_span_two_cells_low_first() {
        let mut memory = Memory::new();
        memory.write_word(10, Word::from_cells(0x1111, 0x2222));
        // Overlapping read picks up the high cell as its low half.
        assert_eq!(memory.read_word(11).low_cell(), 0x2222);
    }

    #[test]
    fn addresses_wrap_at_the_cell_count() {
        let mut memory = Memory::new();
        memory.write_word(32768, Word::from_u32(7));
        assert_eq!(memory.read_word(0).as_u32(), 7);

        // High cell of a word at the last cell lands on cell 0.
        memory.clear();
        memory.write_word(32767, Word::from_cells(0xAAAA, 0xBBBB));
        assert_eq!(memory.read_word(32767).low_cell(), 0xAAAA);
        assert_eq!(memory.read_word(0).low_cell(), 0xBBBB);
    }
}
