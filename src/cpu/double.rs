//! Double-precision operators.
//!
//! A double-precision operand is two words, high word above low word. The
//! stock policy does not compute in double precision: it drops both low
//! words, runs the single-precision operator on the two high words, and
//! leaves the result as a high word over a zero low word. Another policy can
//! be installed per processor with [`Processor::with_double_precision`].

use crate::cpu::arith::DivideKind;
use crate::cpu::Processor;

/// How DLA, DLS, DLM and DLD are carried out.
///
/// On entry the top four stack words hold two double-precision operands;
/// on return the top two hold the result, high word in A.
pub trait DoublePrecisionPolicy: Send + Sync {
    fn add(&self, p: &mut Processor, is_add: bool);
    fn multiply(&self, p: &mut Processor);
    fn divide(&self, p: &mut Processor);
}

/// Double precision by rearranging the stack into single precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackRearrangement;

impl StackRearrangement {
    /// Leave the first operand's high word in A and the second's in B,
    /// dropping both low words.
    fn rearrange(p: &mut Processor) {
        p.adjust_ab_full();
        p.regs.brof = false;
        p.pop_b();
        p.decrement_s();
    }

    /// Turn the single-precision result in B into a double-precision pair.
    /// A still full means the operator refused its operands.
    fn widen(p: &mut Processor) {
        if p.regs.arof {
            return;
        }
        p.regs.a = p.regs.b;
        p.regs.arof = true;
        p.regs.b = 0;
        p.regs.brof = true;
    }
}

impl DoublePrecisionPolicy for StackRearrangement {
    fn add(&self, p: &mut Processor, is_add: bool) {
        Self::rearrange(p);
        p.single_add(is_add);
        Self::widen(p);
    }

    fn multiply(&self, p: &mut Processor) {
        Self::rearrange(p);
        p.single_multiply();
        Self::widen(p);
    }

    fn divide(&self, p: &mut Processor) {
        Self::rearrange(p);
        p.single_divide(DivideKind::Floating);
        Self::widen(p);
    }
}

impl Processor {
    /// DLA / DLS.
    pub(crate) fn double_add(&mut self, is_add: bool) {
        let policy = std::sync::Arc::clone(&self.double);
        policy.add(self, is_add);
    }

    /// DLM.
    pub(crate) fn double_multiply(&mut self) {
        let policy = std::sync::Arc::clone(&self.double);
        policy.multiply(self);
    }

    /// DLD.
    pub(crate) fn double_divide(&mut self) {
        let policy = std::sync::Arc::clone(&self.double);
        policy.divide(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::testing::processor;
    use crate::word::{Number, Word};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn int(v: i64) -> Word {
        Number::from_i64(v).compose()
    }

    /// Second operand (high 7, low 1) in memory under the first (high 5,
    /// low 2) held in A and B.
    fn double_operands() -> Processor {
        let mut p = processor();
        p.mem.store(0o1000, int(1));
        p.mem.store(0o1001, int(7));
        p.regs.s = 0o1001;
        p.regs.a = int(5);
        p.regs.b = int(2);
        p.regs.arof = true;
        p.regs.brof = true;
        p
    }

    #[test]
    fn test_double_add_uses_high_words() {
        let mut p = double_operands();
        p.double_add(true);
        assert_eq!(p.regs.a, int(12));
        assert_eq!(p.regs.b, 0);
        assert!(p.regs.arof && p.regs.brof);
        assert_eq!(p.regs.s, 0o777);
    }

    #[test]
    fn test_double_subtract_is_second_minus_first() {
        let mut p = double_operands();
        p.double_add(false);
        assert_eq!(p.regs.a, int(2));
    }

    #[test]
    fn test_double_multiply() {
        let mut p = double_operands();
        p.double_multiply();
        assert_eq!(p.regs.a, int(35));
    }

    #[test]
    fn test_double_divide_by_zero_keeps_operands() {
        let mut p = double_operands();
        p.regs.ncsf = true;
        p.regs.a = 0;
        p.double_divide();
        assert_eq!((p.regs.a, p.regs.b), (0, int(7)));
        assert_eq!(p.regs.i & 0xF0, 0xD0);
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl DoublePrecisionPolicy for Counting {
        fn add(&self, _p: &mut Processor, _is_add: bool) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
        fn multiply(&self, _p: &mut Processor) {}
        fn divide(&self, _p: &mut Processor) {}
    }

    #[test]
    fn test_policy_can_be_replaced() {
        let policy = Arc::new(Counting::default());
        let mut p = processor().with_double_precision(policy.clone());
        p.double_add(true);
        p.double_add(false);
        assert_eq!(policy.0.load(Ordering::Relaxed), 2);
    }
}
