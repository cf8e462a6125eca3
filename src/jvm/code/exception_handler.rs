use super::instruction_list::code_offset;
use crate::jvm::class_file::{ConstantsPool, ConstantsWriter, ExceptionHandler};
use crate::jvm::code::{InstructionHandle, InstructionList, InstructionTargeter, TargeterId};
use crate::jvm::{BinaryName, Error};
use crate::util::Offset;

/// Exception handler being generated
///
/// Exceptions of type `catch_type` (or of any type, if it is `None`) thrown from the instructions
/// `start` up to and including `end` are caught by the code at `handler`.
#[derive(Debug)]
pub struct ExceptionHandlerGen {
    id: TargeterId,
    start: InstructionHandle,
    end: InstructionHandle,
    handler: InstructionHandle,
    catch_type: Option<BinaryName>,
}

impl ExceptionHandlerGen {
    pub fn new(
        instructions: &mut InstructionList,
        start: InstructionHandle,
        end: InstructionHandle,
        handler: InstructionHandle,
        catch_type: Option<BinaryName>,
    ) -> Result<ExceptionHandlerGen, Error> {
        for handle in [start, end, handler] {
            if !instructions.contains(handle) {
                return Err(Error::DeletedHandle(handle));
            }
        }

        let id = instructions.fresh_targeter_id();
        for handle in [start, end, handler] {
            instructions.retarget(id, None, Some(handle))?;
        }
        Ok(ExceptionHandlerGen {
            id,
            start,
            end,
            handler,
            catch_type,
        })
    }

    pub fn start(&self) -> InstructionHandle {
        self.start
    }

    pub fn end(&self) -> InstructionHandle {
        self.end
    }

    pub fn handler(&self) -> InstructionHandle {
        self.handler
    }

    pub fn catch_type(&self) -> Option<&BinaryName> {
        self.catch_type.as_ref()
    }

    pub fn set_catch_type(&mut self, catch_type: Option<BinaryName>) {
        self.catch_type = catch_type;
    }

    pub fn set_start(
        &mut self,
        instructions: &mut InstructionList,
        start: InstructionHandle,
    ) -> Result<(), Error> {
        instructions.retarget(self.id, Some(self.start), Some(start))?;
        self.start = start;
        Ok(())
    }

    pub fn set_end(
        &mut self,
        instructions: &mut InstructionList,
        end: InstructionHandle,
    ) -> Result<(), Error> {
        instructions.retarget(self.id, Some(self.end), Some(end))?;
        self.end = end;
        Ok(())
    }

    pub fn set_handler(
        &mut self,
        instructions: &mut InstructionList,
        handler: InstructionHandle,
    ) -> Result<(), Error> {
        instructions.retarget(self.id, Some(self.handler), Some(handler))?;
        self.handler = handler;
        Ok(())
    }

    /// Drop the handler, releasing all the handles it holds
    pub fn dispose(self, instructions: &mut InstructionList) -> Result<(), Error> {
        for handle in [self.start, self.end, self.handler] {
            instructions.retarget(self.id, Some(handle), None)?;
        }
        Ok(())
    }

    /// Turn the handler into an entry of the exception table
    pub fn resolve(
        &self,
        instructions: &InstructionList,
        constants: &mut ConstantsPool,
    ) -> Result<ExceptionHandler, Error> {
        let start_pc = instructions.position(self.start)?;
        let end_pc = instructions.position(self.end)?;
        let end_pc = Offset(end_pc.0 + instructions.length(self.end)?);
        if end_pc <= start_pc {
            return Err(Error::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }

        let catch_type = match &self.catch_type {
            Some(class) => Some(class.constant_index(constants)?),
            None => None,
        };

        Ok(ExceptionHandler {
            start_pc: code_offset(start_pc)?,
            end_pc: code_offset(end_pc)?,
            handler_pc: code_offset(instructions.position(self.handler)?)?,
            catch_type,
        })
    }
}

impl InstructionTargeter for ExceptionHandlerGen {
    fn targeter_id(&self) -> TargeterId {
        self.id
    }

    fn update_target(
        &mut self,
        instructions: &mut InstructionList,
        old: InstructionHandle,
        new: InstructionHandle,
    ) -> Result<(), Error> {
        if !self.contains_target(old) {
            return Err(Error::UntrackedTarget {
                targeter: self.id,
                target: old,
            });
        }
        if self.start == old {
            self.set_start(instructions, new)?;
        }
        if self.end == old {
            self.set_end(instructions, new)?;
        }
        if self.handler == old {
            self.set_handler(instructions, new)?;
        }
        Ok(())
    }

    fn contains_target(&self, handle: InstructionHandle) -> bool {
        self.start == handle || self.end == handle || self.handler == handle
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ClassConstantIndex, ConstantIndex};
    use crate::jvm::code::Instruction;

    #[test]
    fn resolves_to_table_entry() {
        let mut list = InstructionList::new();
        let start = list.append(Instruction::aload(0));
        let end = list.append(Instruction::athrow());
        let handler = list.append(Instruction::astore(1));
        list.append(Instruction::return_void());
        list.resolve_positions();

        let mut pool = ConstantsPool::new();
        let gen = ExceptionHandlerGen::new(
            &mut list,
            start,
            end,
            handler,
            Some(BinaryName::RUNTIMEEXCEPTION),
        )
        .unwrap();
        let entry = gen.resolve(&list, &mut pool).unwrap();
        assert_eq!(entry.start_pc, 0);
        assert_eq!(entry.end_pc, 3);
        assert_eq!(entry.handler_pc, 3);
        assert_eq!(entry.catch_type, Some(ClassConstantIndex(ConstantIndex(2))));
        assert_eq!(
            pool.class_name(ClassConstantIndex(ConstantIndex(2))).unwrap(),
            "java/lang/RuntimeException"
        );
    }

    #[test]
    fn retargeting_and_disposing() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::nop());
        let b = list.append(Instruction::nop());
        let c = list.append(Instruction::nop());

        let mut gen = ExceptionHandlerGen::new(&mut list, a, a, c, None).unwrap();
        assert_eq!(list.targeters(a), vec![gen.targeter_id()]);

        gen.update_target(&mut list, a, b).unwrap();
        assert_eq!((gen.start(), gen.end()), (b, b));
        assert!(!list.has_targeters(a));
        assert!(matches!(
            gen.update_target(&mut list, a, b),
            Err(Error::UntrackedTarget { .. })
        ));

        gen.dispose(&mut list).unwrap();
        assert!(!list.has_targeters(b));
        assert!(!list.has_targeters(c));
    }
}
