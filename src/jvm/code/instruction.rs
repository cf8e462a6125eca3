use crate::jvm::class_file::ConstantIndex;
use crate::util::Width;

/// Encoded JVM instruction
///
/// The opcode set is not modelled: an instruction is just its opcode byte followed by whatever
/// operand bytes it takes. What matters here is its width, since that is what decides the byte
/// offsets of everything that follows it.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html#jvms-6.5
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    opcode: u8,
    operands: Vec<u8>,
}

impl Instruction {
    pub fn new(opcode: u8, operands: Vec<u8>) -> Instruction {
        Instruction { opcode, operands }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn operands(&self) -> &[u8] {
        &self.operands
    }

    pub fn nop() -> Instruction {
        Instruction::new(0x00, vec![])
    }

    /// Push an `int`, picking the shortest encoding
    pub fn iconst(value: i16) -> Instruction {
        match value {
            -1..=5 => Instruction::new((0x03 + value) as u8, vec![]),
            -128..=127 => Instruction::new(0x10, vec![value as i8 as u8]),
            _ => Instruction::new(0x11, value.to_be_bytes().to_vec()),
        }
    }

    /// Push a constant from the pool (`ldc` or `ldc_w`)
    pub fn ldc(index: ConstantIndex) -> Instruction {
        if index.0 <= u8::MAX as u16 {
            Instruction::new(0x12, vec![index.0 as u8])
        } else {
            Instruction::new(0x13, index.0.to_be_bytes().to_vec())
        }
    }

    pub fn iload(index: u8) -> Instruction {
        Instruction::new(0x15, vec![index])
    }

    pub fn aload(index: u8) -> Instruction {
        Instruction::new(0x19, vec![index])
    }

    pub fn istore(index: u8) -> Instruction {
        Instruction::new(0x36, vec![index])
    }

    pub fn astore(index: u8) -> Instruction {
        Instruction::new(0x3a, vec![index])
    }

    pub fn iadd() -> Instruction {
        Instruction::new(0x60, vec![])
    }

    pub fn ireturn() -> Instruction {
        Instruction::new(0xac, vec![])
    }

    pub fn return_void() -> Instruction {
        Instruction::new(0xb1, vec![])
    }

    pub fn athrow() -> Instruction {
        Instruction::new(0xbf, vec![])
    }
}

/// Length in bytes
impl Width for Instruction {
    fn width(&self) -> usize {
        1 + self.operands.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_constants_use_shortest_encoding() {
        assert_eq!(Instruction::iconst(-1), Instruction::new(0x02, vec![]));
        assert_eq!(Instruction::iconst(5), Instruction::new(0x08, vec![]));
        assert_eq!(Instruction::iconst(-2), Instruction::new(0x10, vec![0xFE]));
        assert_eq!(Instruction::iconst(300), Instruction::new(0x11, vec![0x01, 0x2C]));
        assert_eq!(Instruction::iconst(300).width(), 3);
    }

    #[test]
    fn wide_constant_loads() {
        assert_eq!(Instruction::ldc(ConstantIndex(7)).width(), 2);
        assert_eq!(
            Instruction::ldc(ConstantIndex(0x0100)),
            Instruction::new(0x13, vec![0x01, 0x00])
        );
    }
}
