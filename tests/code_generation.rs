use jvmgen::jvm::class_file::{
    ClassConstantIndex, Constant, ConstantIndex, ConstantsPool, Serialize, Utf8ConstantIndex,
};
use jvmgen::jvm::code::{CodeGen, Instruction, InstructionTargeter, LocalVariableGen};
use jvmgen::jvm::*;
use jvmgen::util::Offset;

fn name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(String::from(name)).unwrap()
}

/// Two instructions, of lengths 3 and 5, with a variable live over both
#[test]
fn scope_over_whole_body() -> Result<(), Error> {
    let mut code = CodeGen::new();
    let first = code.instructions_mut().append(Instruction::iconst(1000));
    let second = code
        .instructions_mut()
        .append(Instruction::new(0xb9, vec![0, 1, 1, 0]));
    let x = code.add_local_variable(0, name("x"), FieldType::int(), Some(first), Some(second))?;

    assert_eq!(code.resolve_positions(), Offset(8));
    assert_eq!(code.instructions().position(second)?, Offset(3));

    let mut constants = ConstantsPool::new();
    let table = code.local_variable_table(&mut constants)?;
    assert_eq!(table.0.len(), 1);
    assert_eq!(table.0[0].start_pc, 0);
    assert_eq!(table.0[0].length, 8);

    // Adding an instruction after the end stops the scope from covering the end
    code.instructions_mut()
        .insert_after(second, Instruction::return_void())?;
    code.resolve_positions();
    let table = code.local_variable_table(&mut constants)?;
    assert_eq!(table.0[0].length, 3);
    assert_eq!(code.local_variable(x).map(|local| local.index()), Some(0));
    Ok(())
}

#[test]
fn interning_is_value_based() -> Result<(), Error> {
    let mut constants = ConstantsPool::new();
    let hello = constants.get_utf8("hello")?;
    let owned = constants.get_utf8(String::from("hello"))?;
    let world = constants.get_utf8("world")?;
    assert_eq!(hello, owned);
    assert_ne!(hello, world);

    let class = constants.get_class(world)?;
    assert_eq!(constants.get_class(world)?, class);
    assert_eq!(constants.len(), 3);
    Ok(())
}

#[test]
fn pool_survives_a_round_trip() -> Result<(), Error> {
    let mut constants = ConstantsPool::new();
    let point = constants.get_utf8("me/alec/Point")?;
    let class = constants.get_class(point)?;
    constants.get_utf8("LocalVariableTable")?;

    let mut bytes: Vec<u8> = vec![];
    constants.emit(&mut bytes)?;
    let mut read_back = ConstantsPool::deserialize(&mut bytes.as_slice())?;
    assert_eq!(read_back.len(), constants.len());
    assert_eq!(read_back.class_name(class)?, "me/alec/Point");

    // Deduplication picks up where it left off
    assert_eq!(read_back.get_utf8("me/alec/Point")?, point);
    assert_eq!(read_back.get_class(point)?, class);
    Ok(())
}

#[test]
fn class_constant_wire_format() {
    let constant = Constant::Class(Utf8ConstantIndex(ConstantIndex(0x1234)));
    let mut bytes: Vec<u8> = vec![];
    constant.serialize(&mut bytes).unwrap();
    assert_eq!(bytes, vec![7, 0x12, 0x34]);

    let read_back = Constant::read(&mut bytes.as_slice()).unwrap();
    assert_eq!(read_back, constant);
}

#[test]
fn class_name_must_be_utf8() -> Result<(), Error> {
    let mut constants = ConstantsPool::new();
    let utf8 = constants.get_utf8("java/lang/Object")?;
    let class = constants.get_class(utf8)?;
    let nested = constants.get_class(Utf8ConstantIndex(class.0))?;

    assert!(matches!(
        constants.class_name(nested),
        Err(Error::BadConstantKind { .. })
    ));
    assert!(matches!(
        constants.emit(&mut Vec::<u8>::new()),
        Err(Error::BadConstantKind { .. })
    ));
    assert!(matches!(
        constants.class_name(ClassConstantIndex(ConstantIndex(0))),
        Err(Error::ConstantOutOfRange(_))
    ));
    Ok(())
}

#[test]
fn rewriting_a_method_body() -> Result<(), Error> {
    let mut code = CodeGen::new();
    let load = code.instructions_mut().append(Instruction::iload(0));
    let add = code.instructions_mut().append(Instruction::iadd());
    let ret = code.instructions_mut().append(Instruction::ireturn());
    let handler = code.instructions_mut().append(Instruction::athrow());

    let arg = code.add_local_variable(0, name("arg"), FieldType::int(), Some(load), Some(ret))?;
    let catch = code.add_exception_handler(load, add, handler, Some(BinaryName::THROWABLE))?;

    // Swap the addition for something else entirely
    let nop = code.instructions_mut().insert_before(add, Instruction::nop())?;
    code.redirect_targeters(add, nop)?;
    code.instructions_mut().delete(add)?;
    assert_eq!(code.exception_handler(catch).map(|h| h.end()), Some(nop));

    // Deleting the first instruction moves its targeters forward
    code.delete_instruction(load)?;
    let local = code.local_variable(arg).expect("local variable");
    assert_eq!(local.start(), Some(nop));
    assert!(!local.contains_target(load));

    code.resolve_positions();
    assert_eq!(code.instructions().bytecode(), vec![0x00, 0xac, 0xbf]);

    let mut constants = ConstantsPool::new();
    let exceptions = code.exception_table(&mut constants)?;
    assert_eq!(exceptions[0].start_pc, 0);
    assert_eq!(exceptions[0].end_pc, 1);
    assert_eq!(exceptions[0].handler_pc, 2);
    let catch_type = exceptions[0].catch_type.expect("catch type");
    assert_eq!(constants.class_name(catch_type)?, "java/lang/Throwable");
    Ok(())
}

#[test]
fn bare_local_variables_outside_code_gen() -> Result<(), Error> {
    let mut code = CodeGen::new();
    let a = code.instructions_mut().append(Instruction::nop());
    let instructions = code.instructions_mut();

    let mut local =
        LocalVariableGen::new(instructions, 1, name("y"), FieldType::int(), Some(a), Some(a))?;
    assert_eq!(instructions.targeters(a), vec![local.targeter_id()]);

    // Not known to the code, so it cannot be redirected on its behalf
    let b = code.instructions_mut().append(Instruction::nop());
    assert!(matches!(
        code.delete_instruction(a),
        Err(Error::UnknownTargeter(_))
    ));

    local.dispose(code.instructions_mut())?;
    code.delete_instruction(a)?;
    assert_eq!(code.instructions().first(), Some(b));
    Ok(())
}
