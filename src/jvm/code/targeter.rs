use crate::jvm::code::{InstructionHandle, InstructionList};
use crate::jvm::Error;
use std::fmt;

/// Opaque identity of something pointing into an instruction list
///
/// Targeters are tracked by this identity rather than by their contents, since their contents
/// (eg. the name of a local variable) can change while they are registered.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TargeterId(usize);

impl TargeterId {
    /// Get the next fresh identity
    pub fn next(&self) -> TargeterId {
        TargeterId(self.0 + 1)
    }
}

impl fmt::Debug for TargeterId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("t{}", self.0))
    }
}

/// Generates fresh [`TargeterId`]s
#[derive(Clone, Debug)]
pub struct TargeterIdGenerator(TargeterId);

impl TargeterIdGenerator {
    pub fn new() -> TargeterIdGenerator {
        TargeterIdGenerator(TargeterId(0))
    }

    pub fn fresh_id(&mut self) -> TargeterId {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl Default for TargeterIdGenerator {
    fn default() -> Self {
        TargeterIdGenerator::new()
    }
}

/// Something holding references to one or more instruction handles
///
/// Implementors must register every handle they hold with the instruction list (see
/// [`InstructionList::retarget`]), so that the list knows who to notify when the handle goes away.
pub trait InstructionTargeter {
    /// Identity under which this targeter is registered
    fn targeter_id(&self) -> TargeterId;

    /// Replace every reference to `old` with a reference to `new`
    ///
    /// Fails with [`Error::UntrackedTarget`] if `old` is not one of the handles held.
    fn update_target(
        &mut self,
        instructions: &mut InstructionList,
        old: InstructionHandle,
        new: InstructionHandle,
    ) -> Result<(), Error>;

    /// Whether `handle` is one of the handles held
    fn contains_target(&self, handle: InstructionHandle) -> bool;
}
