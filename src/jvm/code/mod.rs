//! Mutable method code and the entities that point into it
//!
//! ### Structure
//!
//! Method code is held in an [`InstructionList`]: a doubly-linked sequence of instructions, where
//! each instruction is identified by a stable [`InstructionHandle`]. Handles stay valid as other
//! instructions are inserted, moved, or deleted around them, so they are what everything else uses
//! to refer to a position in the code.
//!
//! Anything that holds handles (the scope of a [local variable](LocalVariableGen), the ranges of
//! an [exception handler](ExceptionHandlerGen)) is an [`InstructionTargeter`]. The list keeps a
//! side table of which targeters point at which handles. That table is what makes it possible to
//!
//!   - refuse to delete an instruction that something still points at
//!   - find every targeter that needs to be redirected when an instruction is replaced
//!
//! [`CodeGen`] ties the list together with the targeters that point into it.
//!
//! ### Emitting
//!
//! Handles only become byte offsets once [`InstructionList::resolve_positions`] has walked the
//! list. After that, targeters can be resolved into their binary forms (eg.
//! [`LocalVariable`](crate::jvm::class_file::LocalVariable) entries).

mod code_gen;
mod exception_handler;
mod instruction;
mod instruction_list;
mod local_variable;
mod targeter;

pub use code_gen::*;
pub use exception_handler::*;
pub use instruction::*;
pub use instruction_list::*;
pub use local_variable::*;
pub use targeter::*;
