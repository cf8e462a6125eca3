//! Manipulate JVM classes
//!
//! ### Simple example
//!
//! Consider a static method with a single local variable `x` live over its whole body:
//!
//! ```java,ignore,no_run
//! static void f() {
//!     int x = 0;
//!     return;
//! }
//! ```
//!
//! Generating the body and its `LocalVariableTable` can be done as follows:
//!
//! ```
//! use jvmgen::jvm::class_file::{ConstantsPool, Serialize};
//! use jvmgen::jvm::code::{CodeGen, Instruction};
//! use jvmgen::jvm::*;
//!
//! # fn generate() -> Result<(), Error> {
//! let mut constants = ConstantsPool::new();
//! let mut code = CodeGen::new();
//!
//! let first = code.instructions_mut().append(Instruction::iconst(0));
//! code.instructions_mut().append(Instruction::istore(0));
//! let last = code.instructions_mut().append(Instruction::return_void());
//!
//! let name = UnqualifiedName::from_string(String::from("x")).unwrap();
//! code.add_local_variable(0, name, FieldType::int(), Some(first), Some(last))?;
//!
//! code.resolve_positions();
//! let table = code.local_variable_table(&mut constants)?;
//! assert_eq!(table.0[0].start_pc, 0);
//! assert_eq!(table.0[0].length, 4);
//!
//! let mut bytes: Vec<u8> = vec![];
//! constants.serialize(&mut bytes).map_err(Error::IoError)?;
//! # Ok(())
//! # }
//! # generate().unwrap();
//! ```

pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod names;

pub use descriptors::*;
pub use errors::*;
pub use names::*;
