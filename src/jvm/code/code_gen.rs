use crate::jvm::class_file::{ConstantsPool, ExceptionHandler, LocalVariableTable};
use crate::jvm::code::{
    ExceptionHandlerGen, Instruction, InstructionHandle, InstructionList, InstructionTargeter,
    LocalVariableGen, TargeterId,
};
use crate::jvm::{BinaryName, Error, FieldType, UnqualifiedName};
use crate::util::Offset;
use std::collections::BTreeMap;

/// Code of one method being generated
///
/// This owns the instruction list along with the local variables and exception handlers that
/// point into it. Since it knows all of the targeters, it can redirect them when instructions
/// they point at are replaced or deleted.
#[derive(Debug, Default)]
pub struct CodeGen {
    instructions: InstructionList,

    /// Keyed by targeter identity, so iteration is in order of creation
    local_variables: BTreeMap<TargeterId, LocalVariableGen>,
    exception_handlers: BTreeMap<TargeterId, ExceptionHandlerGen>,
}

impl CodeGen {
    pub fn new() -> CodeGen {
        CodeGen::default()
    }

    pub fn instructions(&self) -> &InstructionList {
        &self.instructions
    }

    /// Edit the instruction list directly
    ///
    /// Deleting through this will fail for targeted instructions. Use
    /// [`Self::delete_instruction`] to have targeters redirected first.
    pub fn instructions_mut(&mut self) -> &mut InstructionList {
        &mut self.instructions
    }

    pub fn add_local_variable(
        &mut self,
        index: i32,
        name: UnqualifiedName,
        field_type: FieldType<BinaryName>,
        start: Option<InstructionHandle>,
        end: Option<InstructionHandle>,
    ) -> Result<TargeterId, Error> {
        let local =
            LocalVariableGen::new(&mut self.instructions, index, name, field_type, start, end)?;
        let id = local.targeter_id();
        self.local_variables.insert(id, local);
        Ok(id)
    }

    pub fn local_variable(&self, id: TargeterId) -> Option<&LocalVariableGen> {
        self.local_variables.get(&id)
    }

    pub fn local_variables(&self) -> impl Iterator<Item = &LocalVariableGen> + '_ {
        self.local_variables.values()
    }

    /// Modify a local variable (eg. change its scope)
    pub fn edit_local_variable<T>(
        &mut self,
        id: TargeterId,
        edit: impl FnOnce(&mut LocalVariableGen, &mut InstructionList) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let local = self
            .local_variables
            .get_mut(&id)
            .ok_or(Error::UnknownTargeter(id))?;
        edit(local, &mut self.instructions)
    }

    /// Remove a local variable, releasing the instructions it pointed at
    pub fn remove_local_variable(&mut self, id: TargeterId) -> Result<LocalVariableGen, Error> {
        let mut local = self
            .local_variables
            .remove(&id)
            .ok_or(Error::UnknownTargeter(id))?;
        local.dispose(&mut self.instructions)?;
        Ok(local)
    }

    pub fn add_exception_handler(
        &mut self,
        start: InstructionHandle,
        end: InstructionHandle,
        handler: InstructionHandle,
        catch_type: Option<BinaryName>,
    ) -> Result<TargeterId, Error> {
        let handler =
            ExceptionHandlerGen::new(&mut self.instructions, start, end, handler, catch_type)?;
        let id = handler.targeter_id();
        self.exception_handlers.insert(id, handler);
        Ok(id)
    }

    pub fn exception_handler(&self, id: TargeterId) -> Option<&ExceptionHandlerGen> {
        self.exception_handlers.get(&id)
    }

    pub fn remove_exception_handler(&mut self, id: TargeterId) -> Result<(), Error> {
        let handler = self
            .exception_handlers
            .remove(&id)
            .ok_or(Error::UnknownTargeter(id))?;
        handler.dispose(&mut self.instructions)
    }

    /// Point every targeter of `old` at `new` instead
    ///
    /// If any targeter of `old` is not owned by this code, nothing is redirected.
    pub fn redirect_targeters(
        &mut self,
        old: InstructionHandle,
        new: InstructionHandle,
    ) -> Result<(), Error> {
        if !self.instructions.contains(new) {
            return Err(Error::DeletedHandle(new));
        }

        let targeters = self.instructions.targeters(old);
        if let Some(unknown) = targeters.iter().find(|id| {
            !self.local_variables.contains_key(*id) && !self.exception_handlers.contains_key(*id)
        }) {
            return Err(Error::UnknownTargeter(*unknown));
        }

        for id in targeters {
            let targeter: &mut dyn InstructionTargeter =
                if let Some(local) = self.local_variables.get_mut(&id) {
                    local
                } else if let Some(handler) = self.exception_handlers.get_mut(&id) {
                    handler
                } else {
                    return Err(Error::UnknownTargeter(id));
                };
            targeter.update_target(&mut self.instructions, old, new)?;
        }

        log::debug!("Redirected targeters of {:?} to {:?}", old, new);
        Ok(())
    }

    /// Delete an instruction, first moving its targeters onto the next instruction (or the
    /// previous one, if it was the last)
    pub fn delete_instruction(&mut self, handle: InstructionHandle) -> Result<Instruction, Error> {
        if self.instructions.has_targeters(handle) {
            let neighbour = self
                .instructions
                .next(handle)
                .or_else(|| self.instructions.prev(handle));
            if let Some(neighbour) = neighbour {
                self.redirect_targeters(handle, neighbour)?;
            }
        }
        self.instructions.delete(handle)
    }

    /// See [`InstructionList::resolve_positions`]
    pub fn resolve_positions(&mut self) -> Offset {
        self.instructions.resolve_positions()
    }

    /// Resolve all local variables, ordered by slot
    pub fn local_variable_table(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<LocalVariableTable, Error> {
        let mut entries = self
            .local_variables
            .values()
            .map(|local| local.resolve(&self.instructions, constants))
            .collect::<Result<Vec<_>, Error>>()?;
        entries.sort_by_key(|entry| entry.index);
        Ok(LocalVariableTable(entries))
    }

    /// Resolve all exception handlers, in the order they were added
    ///
    /// Order matters here: when ranges overlap, the JVM picks the first matching handler.
    pub fn exception_table(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<Vec<ExceptionHandler>, Error> {
        self.exception_handlers
            .values()
            .map(|handler| handler.resolve(&self.instructions, constants))
            .collect()
    }

    /// Number of local variable slots needed to hold every local variable
    pub fn max_locals(&self) -> u16 {
        self.local_variables
            .values()
            .map(|local| local.index() as usize + local.slots())
            .max()
            .unwrap_or(0) as u16
    }
}
