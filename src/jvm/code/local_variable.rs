use super::instruction_list::code_offset;
use crate::jvm::class_file::{ConstantsPool, LocalVariable};
use crate::jvm::code::{InstructionHandle, InstructionList, InstructionTargeter, TargeterId};
use crate::jvm::{BinaryName, Error, FieldType, Name, RenderDescriptor, UnqualifiedName};
use crate::util::{Offset, Width};
use std::hash::{Hash, Hasher};

/// Largest local variable slot that can be described
pub const MAX_LOCAL_INDEX: i32 = i16::MAX as i32;

/// Local variable being generated, with its scope expressed as instruction handles
///
/// The scope starts at `start` and extends up to `end`. When either is missing, the variable is
/// considered live over the whole method.
///
/// Both handles are registered with the instruction list for as long as they are held. This is
/// why they can only be changed through methods that take the list, and why [`Self::dispose`]
/// must be called before the variable is dropped.
///
/// There is no `Clone`: a copy has to be registered under its own identity, so copying goes
/// through [`Self::duplicate`].
#[derive(Debug)]
pub struct LocalVariableGen {
    id: TargeterId,
    index: u16,
    name: UnqualifiedName,
    field_type: FieldType<BinaryName>,
    start: Option<InstructionHandle>,
    end: Option<InstructionHandle>,
}

/// Part of a local variable that determines its identity
///
/// The name and type are left out: those can be changed while the variable is registered as a
/// targeter, and must not affect how it hashes.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct LocalVariableKey {
    pub index: u16,
    pub start: Option<InstructionHandle>,
    pub end: Option<InstructionHandle>,
}

fn check_index(index: i32) -> Result<u16, Error> {
    if (0..=MAX_LOCAL_INDEX).contains(&index) {
        Ok(index as u16)
    } else {
        Err(Error::InvalidIndex(i64::from(index)))
    }
}

impl LocalVariableGen {
    /// Make a new local variable and register its scope with the instruction list
    pub fn new(
        instructions: &mut InstructionList,
        index: i32,
        name: UnqualifiedName,
        field_type: FieldType<BinaryName>,
        start: Option<InstructionHandle>,
        end: Option<InstructionHandle>,
    ) -> Result<LocalVariableGen, Error> {
        let index = check_index(index)?;
        for handle in start.iter().chain(end.iter()) {
            if !instructions.contains(*handle) {
                return Err(Error::DeletedHandle(*handle));
            }
        }

        let mut local = LocalVariableGen {
            id: instructions.fresh_targeter_id(),
            index,
            name,
            field_type,
            start: None,
            end: None,
        };
        local.set_start(instructions, start)?;
        local.set_end(instructions, end)?;
        log::trace!("New local {:?} ({:?}) in slot {}", local.name, local.id, index);
        Ok(local)
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn set_index(&mut self, index: i32) -> Result<(), Error> {
        self.index = check_index(index)?;
        Ok(())
    }

    pub fn name(&self) -> &UnqualifiedName {
        &self.name
    }

    pub fn set_name(&mut self, name: UnqualifiedName) {
        self.name = name;
    }

    pub fn field_type(&self) -> &FieldType<BinaryName> {
        &self.field_type
    }

    pub fn set_field_type(&mut self, field_type: FieldType<BinaryName>) {
        self.field_type = field_type;
    }

    /// Number of slots taken up (`long` and `double` take two)
    pub fn slots(&self) -> usize {
        self.field_type.width()
    }

    pub fn start(&self) -> Option<InstructionHandle> {
        self.start
    }

    pub fn end(&self) -> Option<InstructionHandle> {
        self.end
    }

    pub fn set_start(
        &mut self,
        instructions: &mut InstructionList,
        start: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        instructions.retarget(self.id, self.start, start)?;
        self.start = start;
        Ok(())
    }

    pub fn set_end(
        &mut self,
        instructions: &mut InstructionList,
        end: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        instructions.retarget(self.id, self.end, end)?;
        self.end = end;
        Ok(())
    }

    /// Release both ends of the scope
    ///
    /// Afterwards the variable no longer targets anything, so the instructions it used to point
    /// at can be deleted.
    pub fn dispose(&mut self, instructions: &mut InstructionList) -> Result<(), Error> {
        self.set_start(instructions, None)?;
        self.set_end(instructions, None)
    }

    /// Copy the variable, registering the copy as a targeter in its own right
    pub fn duplicate(&self, instructions: &mut InstructionList) -> Result<LocalVariableGen, Error> {
        LocalVariableGen::new(
            instructions,
            i32::from(self.index),
            self.name.clone(),
            self.field_type.clone(),
            self.start,
            self.end,
        )
    }

    pub fn key(&self) -> LocalVariableKey {
        LocalVariableKey {
            index: self.index,
            start: self.start,
            end: self.end,
        }
    }

    /// Turn the variable into its class file form
    ///
    /// Positions in the list should be resolved first. If `end` is the last instruction, the
    /// scope extends past it to cover that instruction too.
    pub fn resolve(
        &self,
        instructions: &InstructionList,
        constants: &mut ConstantsPool,
    ) -> Result<LocalVariable, Error> {
        if instructions.positions_stale() {
            log::warn!(
                "Resolving local {:?} against stale instruction positions",
                self.name
            );
        }

        let (start_pc, length) = match (self.start, self.end) {
            (Some(start), Some(end)) => {
                let start_pc = instructions.position(start)?;
                let mut end_pc = instructions.position(end)?;
                if instructions.next(end).is_none() {
                    end_pc.0 += instructions.length(end)?;
                }
                if end_pc < start_pc {
                    return Err(Error::InvertedRange { start, end });
                }
                let length = Offset(end_pc.0 - start_pc.0);
                (code_offset(start_pc)?, code_offset(length)?)
            }
            _ => (0, 0),
        };

        let name_index = constants.get_utf8(self.name.as_str())?;
        let signature_index = constants.get_utf8(self.field_type.render())?;

        Ok(LocalVariable {
            start_pc,
            length,
            name_index,
            signature_index,
            index: self.index,
        })
    }
}

impl InstructionTargeter for LocalVariableGen {
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
        if self.start == Some(old) {
            self.set_start(instructions, Some(new))?;
        }
        if self.end == Some(old) {
            self.set_end(instructions, Some(new))?;
        }
        Ok(())
    }

    fn contains_target(&self, handle: InstructionHandle) -> bool {
        self.start == Some(handle) || self.end == Some(handle)
    }
}

impl PartialEq for LocalVariableGen {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for LocalVariableGen {}

impl Hash for LocalVariableGen {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantIndex, Utf8ConstantIndex};
    use crate::jvm::code::Instruction;
    use std::collections::HashSet;

    fn name(name: &'static str) -> UnqualifiedName {
        UnqualifiedName::from_string(String::from(name)).unwrap()
    }

    #[test]
    fn index_must_fit_in_signed_short() {
        let mut list = InstructionList::new();
        for bad in [-1, 32768, 65536] {
            let local = LocalVariableGen::new(&mut list, bad, name("x"), FieldType::int(), None, None);
            assert!(matches!(local, Err(Error::InvalidIndex(i)) if i == i64::from(bad)));
        }

        let mut local =
            LocalVariableGen::new(&mut list, 32767, name("x"), FieldType::int(), None, None).unwrap();
        assert_eq!(local.index(), 32767);
        assert!(matches!(local.set_index(-1), Err(Error::InvalidIndex(-1))));
        assert_eq!(local.index(), 32767);
    }

    #[test]
    fn moving_start_moves_registration() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let mut local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), None, None).unwrap();

        local.set_start(&mut list, Some(h1)).unwrap();
        local.set_start(&mut list, Some(h2)).unwrap();
        assert!(list.is_targeted_by(h2, local.targeter_id()));
        assert!(!list.is_targeted_by(h1, local.targeter_id()));
        assert!(local.contains_target(h2));
        assert!(!local.contains_target(h1));
    }

    #[test]
    fn dispose_releases_both_ends() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let mut local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(h1), Some(h2))
                .unwrap();

        local.dispose(&mut list).unwrap();
        assert!(!local.contains_target(h1));
        assert!(!local.contains_target(h2));
        assert!(list.targeters(h1).is_empty());
        assert!(list.targeters(h2).is_empty());
        list.delete(h1).unwrap();
    }

    #[test]
    fn same_start_and_end() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let mut local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(h1), Some(h1))
                .unwrap();

        local.set_end(&mut list, Some(h2)).unwrap();
        assert!(list.is_targeted_by(h1, local.targeter_id()));

        local.update_target(&mut list, h1, h2).unwrap();
        assert_eq!(local.start(), Some(h2));
        assert_eq!(local.end(), Some(h2));
        assert!(!list.has_targeters(h1));
    }

    #[test]
    fn untracked_targets_are_rejected() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let h3 = list.append(Instruction::nop());
        let mut local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(h1), Some(h2))
                .unwrap();

        let result = local.update_target(&mut list, h3, h1);
        assert!(matches!(
            result,
            Err(Error::UntrackedTarget { target, .. }) if target == h3
        ));
        assert_eq!(local.start(), Some(h1));
        assert_eq!(local.end(), Some(h2));
    }

    #[test]
    fn equality_ignores_name_and_type() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let mut a =
            LocalVariableGen::new(&mut list, 3, name("a"), FieldType::int(), Some(h1), Some(h2))
                .unwrap();
        let b = LocalVariableGen::new(&mut list, 3, name("b"), FieldType::long(), Some(h1), Some(h2))
            .unwrap();
        assert_eq!(a, b);

        let before = a.duplicate(&mut list).unwrap();
        let mut set = HashSet::new();
        set.insert(b);
        a.set_name(name("renamed"));
        a.set_field_type(FieldType::object(BinaryName::STRING));
        assert_eq!(a, before);
        assert!(set.contains(&a));

        a.set_end(&mut list, Some(h1)).unwrap();
        assert_ne!(a, before);
    }

    #[test]
    fn duplicates_are_registered_separately() {
        let mut list = InstructionList::new();
        let h1 = list.append(Instruction::nop());
        let h2 = list.append(Instruction::nop());
        let mut local =
            LocalVariableGen::new(&mut list, 2, name("x"), FieldType::int(), Some(h1), Some(h2))
                .unwrap();

        let mut copy = local.duplicate(&mut list).unwrap();
        assert_ne!(copy.targeter_id(), local.targeter_id());
        assert_eq!(copy, local);
        assert_eq!(copy.name(), local.name());
        assert_eq!(list.targeters(h1), vec![local.targeter_id(), copy.targeter_id()]);

        copy.dispose(&mut list).unwrap();
        assert!(list.is_targeted_by(h1, local.targeter_id()));
        assert!(list.is_targeted_by(h2, local.targeter_id()));
        assert!(!list.is_targeted_by(h1, copy.targeter_id()));

        local.dispose(&mut list).unwrap();
        assert!(!list.has_targeters(h1));
    }

    #[test]
    fn scope_extends_over_last_instruction() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::new(0x11, vec![0, 1]));
        let second = list.append(Instruction::new(0xc8, vec![0, 0, 0, 1]));
        list.resolve_positions();
        assert_eq!(list.position(second).unwrap(), Offset(3));

        let mut pool = ConstantsPool::new();
        let local =
            LocalVariableGen::new(&mut list, 1, name("x"), FieldType::int(), Some(first), Some(second))
                .unwrap();
        let resolved = local.resolve(&list, &mut pool).unwrap();
        assert_eq!(resolved.start_pc, 0);
        assert_eq!(resolved.length, 8);
        assert_eq!(resolved.index, 1);
        assert_eq!(resolved.name_index, Utf8ConstantIndex(ConstantIndex(1)));
        assert_eq!(resolved.signature_index, Utf8ConstantIndex(ConstantIndex(2)));
        assert_eq!(pool.utf8(resolved.signature_index).unwrap(), "I");
    }

    #[test]
    fn scope_stops_before_end_with_successor() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::iconst(300));
        let second = list.append(Instruction::istore(1));
        list.append(Instruction::return_void());
        list.resolve_positions();

        let mut pool = ConstantsPool::new();
        let local = LocalVariableGen::new(
            &mut list,
            1,
            name("x"),
            FieldType::object(BinaryName::STRING),
            Some(first),
            Some(second),
        )
        .unwrap();
        let resolved = local.resolve(&list, &mut pool).unwrap();
        assert_eq!(resolved.start_pc, 0);
        assert_eq!(resolved.length, 3);
        assert_eq!(
            pool.utf8(resolved.signature_index).unwrap(),
            "Ljava/lang/String;"
        );
    }

    #[test]
    fn open_scope_resolves_to_nothing() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::iconst(300));
        list.append(Instruction::return_void());
        list.resolve_positions();

        let mut pool = ConstantsPool::new();
        let local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(first), None)
                .unwrap();
        let resolved = local.resolve(&list, &mut pool).unwrap();
        assert_eq!((resolved.start_pc, resolved.length), (0, 0));
    }

    #[test]
    fn inverted_scope() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::nop());
        let second = list.append(Instruction::nop());
        list.append(Instruction::nop());
        list.resolve_positions();

        let mut pool = ConstantsPool::new();
        let local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(second), Some(first))
                .unwrap();
        assert!(matches!(
            local.resolve(&list, &mut pool),
            Err(Error::InvertedRange { .. })
        ));
    }

    #[test]
    fn deleted_handles_are_rejected() {
        let mut list = InstructionList::new();
        let first = list.append(Instruction::nop());
        let gone = list.append(Instruction::nop());
        list.delete(gone).unwrap();

        let local =
            LocalVariableGen::new(&mut list, 0, name("x"), FieldType::int(), Some(first), Some(gone));
        assert!(matches!(local, Err(Error::DeletedHandle(h)) if h == gone));
        assert!(!list.has_targeters(first));
    }
}
