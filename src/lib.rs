//! Core symbolic representation for generating JVM class files
//!
//! The crate is split in two:
//!
//!   - [`jvm::class_file`] holds the binary-facing structures, most importantly the
//!     [constants pool](jvm::class_file::ConstantsPool)
//!   - [`jvm::code`] holds a mutable [instruction list](jvm::code::InstructionList) along with
//!     the [targeters](jvm::code::InstructionTargeter) (local variable scopes, exception handlers)
//!     which refer to positions inside of it
//!
//! [`util`] has some general purpose helpers that aren't specific to the JVM.

pub mod jvm;
pub mod util;
