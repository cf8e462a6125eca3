use super::class_file::{Constant, ConstantIndex, ConstantPoolOverflow, ConstantTag};
use super::code::{InstructionHandle, TargeterId};
use crate::util::Offset;

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow {
        constant: Constant,
        offset: u16,
    },
    IoError(std::io::Error),

    /// Byte offset into method code does not fit in a `u16`
    MethodCodeOverflow(Offset),

    /// Local variable slot outside of `0..=32767`
    InvalidIndex(i64),

    /// A targeter was asked to retarget a handle it does not point at (indicates a bug in whatever
    /// edited the instruction list)
    UntrackedTarget {
        targeter: TargeterId,
        target: InstructionHandle,
    },

    /// Deleting this handle would leave these targeters dangling
    ///
    /// This is fixable by redirecting the targeters before deleting the instruction.
    TargetLost {
        handle: InstructionHandle,
        targeters: Vec<TargeterId>,
    },

    /// Range ends at an instruction placed before the one it starts at
    InvertedRange {
        start: InstructionHandle,
        end: InstructionHandle,
    },

    /// Handle has been deleted from (or never belonged to) the instruction list
    DeletedHandle(InstructionHandle),

    /// Targeter registered on a handle is not known to the code being generated
    UnknownTargeter(TargeterId),

    /// Constant index is `0` or past the end of the pool
    ConstantOutOfRange(ConstantIndex),

    /// Constant index points at the unusable slot following a `long` or `double`
    UnusableConstantSlot(ConstantIndex),

    /// Constant is not of the kind that was expected
    BadConstantKind {
        index: ConstantIndex,
        expected: ConstantTag,
        found: ConstantTag,
    },

    /// Reading a constant with a tag this crate does not model
    UnknownConstantTag(u8),

    /// Bytes of a `CONSTANT_Utf8_info` are not valid modified UTF-8
    MalformedUtf8(Vec<u8>),

    /// Input does not start with `0xCAFEBABE`
    BadMagic(u32),
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: overflow.constant,
            offset: overflow.offset,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
