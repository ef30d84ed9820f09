//! Top-of-stack register discipline.
//!
//! A and B cache the top two words of the operand stack; AROF and BROF say
//! which of them currently hold a value. Every operator first asks for the
//! registers it needs to be full or empty, and the adjust operations move
//! words between A, B and memory at S to get there. When both are full, A
//! is on top.

use crate::cpu::registers::ADDRESS_MASK;
use crate::cpu::Processor;

/// Interrupt code for stack overflow.
const STACK_OVERFLOW: u8 = 0x04;

impl Processor {
    /// Push a word onto the memory stack at S+1.
    ///
    /// In normal state, a push that brings S into the PRT page raises stack
    /// overflow and the store is skipped.
    fn push(&mut self, word: crate::word::Word) {
        self.regs.s = self.regs.s.wrapping_add(1) & ADDRESS_MASK;
        if self.regs.s >> 6 == self.regs.r && self.regs.ncsf {
            self.regs.i |= STACK_OVERFLOW;
            self.signal_interrupt();
        } else {
            self.store_word(self.regs.s, word);
        }
    }

    pub(crate) fn decrement_s(&mut self) {
        self.regs.s = self.regs.s.wrapping_sub(1) & ADDRESS_MASK;
    }

    /// Push A to memory and mark it empty.
    pub(crate) fn push_a(&mut self) {
        self.push(self.regs.a);
        self.regs.arof = false;
    }

    /// Push B to memory and mark it empty.
    pub(crate) fn push_b(&mut self) {
        self.push(self.regs.b);
        self.regs.brof = false;
    }

    /// Pop the memory stack into A.
    pub(crate) fn pop_a(&mut self) {
        self.load_a_via_s();
        self.decrement_s();
    }

    /// Pop the memory stack into B.
    pub(crate) fn pop_b(&mut self) {
        self.load_b_via_s();
        self.decrement_s();
    }

    pub(crate) fn adjust_a_full(&mut self) {
        if !self.regs.arof {
            if self.regs.brof {
                self.regs.a = self.regs.b;
                self.regs.arof = true;
                self.regs.brof = false;
            } else {
                self.pop_a();
            }
        }
    }

    pub(crate) fn adjust_b_full(&mut self) {
        if !self.regs.brof {
            self.pop_b();
        }
    }

    /// Make both A and B full. With both empty, A is loaded first.
    pub(crate) fn adjust_ab_full(&mut self) {
        if self.regs.arof {
            self.adjust_b_full();
        } else if self.regs.brof {
            // B holds the top: it moves up into A and the next word fills B.
            self.regs.a = self.regs.b;
            self.regs.arof = true;
            self.pop_b();
        } else {
            self.pop_a();
            self.pop_b();
        }
    }

    /// Empty A, moving it down into B (spilling B first if needed).
    pub(crate) fn adjust_a_empty(&mut self) {
        if self.regs.arof {
            if self.regs.brof {
                self.push_b();
            }
            self.regs.b = self.regs.a;
            self.regs.brof = true;
            self.regs.arof = false;
        }
    }

    pub(crate) fn adjust_b_empty(&mut self) {
        if self.regs.brof {
            self.push_b();
        }
    }

    /// Spill both registers, B first.
    pub(crate) fn adjust_ab_empty(&mut self) {
        if self.regs.brof {
            self.push_b();
        }
        if self.regs.arof {
            self.push_a();
        }
    }

    /// Exchange the top two stack values, wherever they are held.
    ///
    /// Leaves both A and B full. With at least one register full this takes
    /// at most one memory load. With both empty, both words are in memory
    /// and both must end up in registers, so that arm takes two loads.
    pub(crate) fn exchange_tos(&mut self) {
        match (self.regs.arof, self.regs.brof) {
            (true, true) => std::mem::swap(&mut self.regs.a, &mut self.regs.b),
            (true, false) => {
                // A is top; the second word is in memory.
                self.regs.b = self.regs.a;
                self.regs.brof = true;
                self.pop_a();
            }
            (false, true) => {
                // B is top; the second word is in memory.
                self.pop_a();
            }
            (false, false) => {
                // Two loads: neither word is cached. Loading in stack order
                // already exchanges them: the top word lands in B, the next in A.
                self.pop_b();
                self.pop_a();
            }
        }
    }

    /// Clear the top of stack without storing it.
    pub(crate) fn discard_top(&mut self) {
        if self.regs.arof {
            self.regs.arof = false;
        } else if self.regs.brof {
            self.regs.brof = false;
        } else {
            self.decrement_s();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::testing::processor;
    use proptest::prelude::*;

    #[test]
    fn test_adjust_a_full_takes_b_without_memory() {
        let mut p = processor();
        p.regs.s = 0o1000;
        p.regs.b = 5;
        p.regs.brof = true;
        p.adjust_a_full();
        assert!(p.regs.arof && !p.regs.brof);
        assert_eq!(p.regs.a, 5);
        assert_eq!(p.regs.s, 0o1000);
    }

    #[test]
    fn test_adjust_ab_full_loads_a_then_b() {
        let mut p = processor();
        p.mem.store(0o1000, 11);
        p.mem.store(0o777, 22);
        p.regs.s = 0o1000;
        p.adjust_ab_full();
        assert_eq!((p.regs.a, p.regs.b), (11, 22));
        assert_eq!(p.regs.s, 0o776);
    }

    #[test]
    fn test_adjust_ab_empty_pushes_b_first() {
        let mut p = processor();
        p.regs.s = 0o1000;
        p.regs.a = 1;
        p.regs.b = 2;
        p.regs.arof = true;
        p.regs.brof = true;
        p.adjust_ab_empty();
        assert!(!p.regs.arof && !p.regs.brof);
        assert_eq!(p.regs.s, 0o1002);
        assert_eq!(p.mem.peek(0o1001), 2);
        assert_eq!(p.mem.peek(0o1002), 1);
    }

    #[test]
    fn test_adjust_a_empty_moves_a_to_b() {
        let mut p = processor();
        p.regs.s = 0o1000;
        p.regs.a = 7;
        p.regs.b = 8;
        p.regs.arof = true;
        p.regs.brof = true;
        p.adjust_a_empty();
        assert!(!p.regs.arof && p.regs.brof);
        assert_eq!(p.regs.b, 7);
        assert_eq!(p.mem.peek(0o1001), 8);
    }

    #[test]
    fn test_overflow_skips_store_but_clears_flag() {
        let mut p = processor();
        p.regs.ncsf = true;
        p.regs.r = 0o21;
        p.regs.s = (0o21 << 6) - 1;
        p.regs.b = 9;
        p.regs.brof = true;
        p.adjust_b_empty();
        assert!(!p.regs.brof);
        assert_eq!(p.regs.s, 0o21 << 6);
        assert_eq!(p.mem.peek(0o21 << 6), 0);
        assert_eq!(p.regs.i & 0x04, 0x04);
        assert_eq!(p.central_control().p1_i & 0x04, 0x04);
    }

    #[test]
    fn test_no_overflow_in_control_state() {
        let mut p = processor();
        p.regs.r = 0o21;
        p.regs.s = (0o21 << 6) - 1;
        p.regs.b = 9;
        p.regs.brof = true;
        p.adjust_b_empty();
        assert_eq!(p.mem.peek(0o21 << 6), 9);
        assert_eq!(p.regs.i, 0);
    }

    #[test]
    fn test_exchange_with_second_word_in_memory() {
        let mut p = processor();
        p.mem.store(0o1000, 2);
        p.regs.s = 0o1000;
        p.regs.a = 1;
        p.regs.arof = true;
        p.exchange_tos();
        assert_eq!((p.regs.a, p.regs.b), (2, 1));
        assert_eq!(p.regs.s, 0o777);
    }

    #[test]
    fn test_exchange_with_both_words_in_memory() {
        let mut p = processor();
        p.mem.store(0o777, 2);
        p.mem.store(0o1000, 1);
        p.regs.s = 0o1000;
        p.exchange_tos();
        // Top was 1, next 2: after the exchange A (top) holds 2.
        assert_eq!((p.regs.a, p.regs.b), (2, 1));
        assert!(p.regs.arof && p.regs.brof);
        assert_eq!(p.regs.s, 0o776);
    }

    fn stack_case(arof: bool, brof: bool) -> crate::cpu::Processor {
        let mut p = processor();
        for i in 0..4u16 {
            p.mem.store(0o1000 - i, 100 + i as u64);
        }
        p.regs.s = 0o1000;
        p.regs.a = 1;
        p.regs.b = 2;
        p.regs.arof = arof;
        p.regs.brof = brof;
        p
    }

    proptest! {
        #[test]
        fn prop_adjust_ab_full_pulls_exactly_missing_words(arof in any::<bool>(), brof in any::<bool>()) {
            let mut p = stack_case(arof, brof);
            let missing = (!arof as u16) + (!brof as u16);
            p.adjust_ab_full();
            prop_assert!(p.regs.arof && p.regs.brof);
            prop_assert_eq!(p.regs.s, 0o1000 - missing);
        }

        #[test]
        fn prop_adjust_ab_empty_clears_both(arof in any::<bool>(), brof in any::<bool>()) {
            let mut p = stack_case(arof, brof);
            let full = arof as u16 + brof as u16;
            p.adjust_ab_empty();
            prop_assert!(!p.regs.arof && !p.regs.brof);
            prop_assert_eq!(p.regs.s, 0o1000 + full);
        }

        #[test]
        fn prop_exchange_twice_restores_order(arof in any::<bool>(), brof in any::<bool>()) {
            let mut p = stack_case(arof, brof);
            p.exchange_tos();
            let (a, b) = (p.regs.a, p.regs.b);
            p.exchange_tos();
            prop_assert_eq!((p.regs.a, p.regs.b), (b, a));
        }
    }
}
