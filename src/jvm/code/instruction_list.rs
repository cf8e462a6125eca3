use crate::jvm::code::{Instruction, TargeterId, TargeterIdGenerator};
use crate::jvm::Error;
use crate::util::{Offset, Width};
use std::collections::HashMap;
use std::fmt;

/// Stable identity of one instruction in an [`InstructionList`]
///
/// Handles are never reused: once an instruction is deleted, its handle is dead for good (and
/// every accessor taking it will fail with [`Error::DeletedHandle`]).
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InstructionHandle(usize);

impl fmt::Debug for InstructionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("ih{}", self.0))
    }
}

#[derive(Debug)]
struct Node {
    instruction: Instruction,
    prev: Option<InstructionHandle>,
    next: Option<InstructionHandle>,

    /// Byte offset from the start of the code, as of the last `resolve_positions`
    position: Offset,
}

/// Mutable sequence of instructions
///
/// Instructions live in an arena indexed by their handles, and are linked together in code order.
/// Separately, the list tracks which targeters are registered on which handles. Registrations
/// are counted, so a targeter holding the same handle twice (eg. a local variable whose scope
/// starts and ends on the same instruction) stays registered until both references are moved.
#[derive(Debug, Default)]
pub struct InstructionList {
    nodes: Vec<Option<Node>>,
    first: Option<InstructionHandle>,
    last: Option<InstructionHandle>,
    len: usize,

    /// Targeters registered on each handle (handles with no targeters have no entry)
    targeters: HashMap<InstructionHandle, HashMap<TargeterId, usize>>,
    targeter_ids: TargeterIdGenerator,

    /// Whether there have been structural edits since positions were last resolved
    positions_stale: bool,
}

impl InstructionList {
    pub fn new() -> InstructionList {
        InstructionList::default()
    }

    /// Number of instructions in the list
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<InstructionHandle> {
        self.first
    }

    pub fn last(&self) -> Option<InstructionHandle> {
        self.last
    }

    /// Whether the handle refers to an instruction currently in the list
    pub fn contains(&self, handle: InstructionHandle) -> bool {
        self.node(handle).is_ok()
    }

    /// Instruction following this one
    pub fn next(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).ok().and_then(|node| node.next)
    }

    /// Instruction preceding this one
    pub fn prev(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).ok().and_then(|node| node.prev)
    }

    pub fn instruction(&self, handle: InstructionHandle) -> Result<&Instruction, Error> {
        Ok(&self.node(handle)?.instruction)
    }

    /// Byte offset of the instruction, as computed by the last [`Self::resolve_positions`]
    pub fn position(&self, handle: InstructionHandle) -> Result<Offset, Error> {
        Ok(self.node(handle)?.position)
    }

    /// Length in bytes of the instruction
    pub fn length(&self, handle: InstructionHandle) -> Result<usize, Error> {
        Ok(self.node(handle)?.instruction.width())
    }

    /// Whether positions need to be resolved again before they can be trusted
    pub fn positions_stale(&self) -> bool {
        self.positions_stale
    }

    pub fn iter(&self) -> InstructionIter<'_> {
        InstructionIter {
            list: self,
            cursor: self.first,
        }
    }

    fn node(&self, handle: InstructionHandle) -> Result<&Node, Error> {
        self.nodes
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(Error::DeletedHandle(handle))
    }

    fn node_mut(&mut self, handle: InstructionHandle) -> Result<&mut Node, Error> {
        self.nodes
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(Error::DeletedHandle(handle))
    }

    /// Add an instruction to the end of the list
    pub fn append(&mut self, instruction: Instruction) -> InstructionHandle {
        let handle = self.alloc(instruction);
        match self.last {
            Some(last) => {
                if let Some(Some(node)) = self.nodes.get_mut(last.0) {
                    node.next = Some(handle);
                }
                if let Some(Some(node)) = self.nodes.get_mut(handle.0) {
                    node.prev = Some(last);
                }
            }
            None => self.first = Some(handle),
        }
        self.last = Some(handle);
        handle
    }

    /// Add an instruction right before an existing one
    pub fn insert_before(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle, Error> {
        let prev = self.node(handle)?.prev;
        let inserted = self.alloc(instruction);
        self.link(inserted, prev, Some(handle))?;
        Ok(inserted)
    }

    /// Add an instruction right after an existing one
    pub fn insert_after(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle, Error> {
        let next = self.node(handle)?.next;
        let inserted = self.alloc(instruction);
        self.link(inserted, Some(handle), next)?;
        Ok(inserted)
    }

    /// Move an instruction so that it follows `after` (or to the front of the list, if `None`)
    ///
    /// The handle keeps its identity, so targeters pointing at it follow it to its new position.
    pub fn move_after(
        &mut self,
        handle: InstructionHandle,
        after: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        self.node(handle)?;
        if after == Some(handle) {
            return Ok(());
        }
        if let Some(after) = after {
            self.node(after)?;
        }

        self.unlink(handle)?;
        let next = match after {
            Some(after) => self.node(after)?.next,
            None => self.first,
        };
        self.link(handle, after, next)?;
        log::trace!("Moved {:?} after {:?}", handle, after);
        Ok(())
    }

    /// Replace the instruction behind a handle (targeters pointing at it are unaffected)
    pub fn set_instruction(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> Result<Instruction, Error> {
        let node = self.node_mut(handle)?;
        let old = std::mem::replace(&mut node.instruction, instruction);
        if old.width() != node.instruction.width() {
            self.positions_stale = true;
        }
        Ok(old)
    }

    /// Remove an instruction from the list
    ///
    /// This fails with [`Error::TargetLost`] if any targeters are still registered on the handle:
    /// they must be redirected first (see [`CodeGen::delete_instruction`] for a version that does
    /// that).
    ///
    /// [`CodeGen::delete_instruction`]: crate::jvm::code::CodeGen::delete_instruction
    pub fn delete(&mut self, handle: InstructionHandle) -> Result<Instruction, Error> {
        self.node(handle)?;
        if self.targeters.contains_key(&handle) {
            return Err(Error::TargetLost {
                handle,
                targeters: self.targeters(handle),
            });
        }

        self.unlink(handle)?;
        let node = self.nodes[handle.0]
            .take()
            .ok_or(Error::DeletedHandle(handle))?;
        self.len -= 1;
        log::trace!("Deleted {:?} ({:?})", handle, node.instruction);
        Ok(node.instruction)
    }

    /// Create an unlinked node
    fn alloc(&mut self, instruction: Instruction) -> InstructionHandle {
        let handle = InstructionHandle(self.nodes.len());
        self.nodes.push(Some(Node {
            instruction,
            prev: None,
            next: None,
            position: Offset(0),
        }));
        self.len += 1;
        self.positions_stale = true;
        handle
    }

    /// Splice an unlinked node in between two adjacent nodes
    fn link(
        &mut self,
        handle: InstructionHandle,
        prev: Option<InstructionHandle>,
        next: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        let node = self.node_mut(handle)?;
        node.prev = prev;
        node.next = next;

        match prev {
            Some(prev) => self.node_mut(prev)?.next = Some(handle),
            None => self.first = Some(handle),
        }
        match next {
            Some(next) => self.node_mut(next)?.prev = Some(handle),
            None => self.last = Some(handle),
        }
        self.positions_stale = true;
        Ok(())
    }

    /// Take a node out of the chain (it stays allocated)
    fn unlink(&mut self, handle: InstructionHandle) -> Result<(), Error> {
        let node = self.node_mut(handle)?;
        let prev = node.prev.take();
        let next = node.next.take();

        match prev {
            Some(prev) => self.node_mut(prev)?.next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => self.node_mut(next)?.prev = prev,
            None => self.last = prev,
        }
        self.positions_stale = true;
        Ok(())
    }

    /// Compute the byte offset of every instruction
    ///
    /// This is a single walk over the list, so it is cheap to re-run after further edits. Returns
    /// the total length of the code.
    pub fn resolve_positions(&mut self) -> Offset {
        let mut offset = Offset(0);
        let mut cursor = self.first;
        while let Some(handle) = cursor {
            match self.nodes.get_mut(handle.0).and_then(Option::as_mut) {
                Some(node) => {
                    node.position = offset;
                    offset.0 += node.instruction.width();
                    cursor = node.next;
                }
                None => break,
            }
        }
        self.positions_stale = false;
        log::debug!(
            "Resolved positions of {} instructions ({} bytes)",
            self.len,
            offset.0
        );
        offset
    }

    /// Encode the instructions back to back
    pub fn bytecode(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = vec![];
        for (_, instruction) in self.iter() {
            bytes.push(instruction.opcode());
            bytes.extend_from_slice(instruction.operands());
        }
        bytes
    }

    /// Allocate an identity for a new targeter
    pub fn fresh_targeter_id(&mut self) -> TargeterId {
        self.targeter_ids.fresh_id()
    }

    /// Targeters registered on a handle (sorted, so in order of creation)
    pub fn targeters(&self, handle: InstructionHandle) -> Vec<TargeterId> {
        let mut targeters: Vec<TargeterId> = self
            .targeters
            .get(&handle)
            .map(|registered| registered.keys().copied().collect())
            .unwrap_or_default();
        targeters.sort();
        targeters
    }

    pub fn has_targeters(&self, handle: InstructionHandle) -> bool {
        self.targeters.contains_key(&handle)
    }

    /// Whether a particular targeter is registered on a handle
    pub fn is_targeted_by(&self, handle: InstructionHandle, targeter: TargeterId) -> bool {
        self.targeters
            .get(&handle)
            .map_or(false, |registered| registered.contains_key(&targeter))
    }

    /// Move one registration of `targeter` from `old` to `new`
    ///
    /// Either side can be `None` for registering a fresh reference or dropping one. Targeters must
    /// go through this whenever they change which handles they hold. The new handle is checked
    /// before anything is modified, so on error the registrations are unchanged.
    pub fn retarget(
        &mut self,
        targeter: TargeterId,
        old: Option<InstructionHandle>,
        new: Option<InstructionHandle>,
    ) -> Result<(), Error> {
        if let Some(new) = new {
            self.node(new)?;
        }

        if let Some(old) = old {
            if let Some(registered) = self.targeters.get_mut(&old) {
                if let Some(count) = registered.get_mut(&targeter) {
                    *count -= 1;
                    if *count == 0 {
                        registered.remove(&targeter);
                    }
                }
                if registered.is_empty() {
                    self.targeters.remove(&old);
                }
            }
        }

        if let Some(new) = new {
            *self
                .targeters
                .entry(new)
                .or_default()
                .entry(targeter)
                .or_insert(0) += 1;
        }

        log::trace!("Retargeted {:?} from {:?} to {:?}", targeter, old, new);
        Ok(())
    }
}

/// Convert a byte offset into method code to the `u16` the class file stores
pub(crate) fn code_offset(offset: Offset) -> Result<u16, Error> {
    u16::try_from(offset.0).map_err(|_| Error::MethodCodeOverflow(offset))
}

/// Iterator over the instructions of a list, in code order
pub struct InstructionIter<'a> {
    list: &'a InstructionList,
    cursor: Option<InstructionHandle>,
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = (InstructionHandle, &'a Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.list.node(handle).ok()?;
        self.cursor = node.next;
        Some((handle, &node.instruction))
    }
}
