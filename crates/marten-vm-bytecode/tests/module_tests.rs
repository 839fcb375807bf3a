//! Integration tests for the bytecode module format.

use marten_vm_bytecode::{
    Declarations, Function, HandlerEntry, Instruction, LineMap, Module,
};

fn sample_module() -> Module {
    let mut builder = Module::builder("sample.js");
    let msg = builder.constants_mut().add_string("message");
    let pi = builder.constants_mut().add_number(3.25);

    let mut lines = LineMap::new();
    lines.add(0, 1, 1);
    lines.add(2, 2, 5);

    let entry = Function::builder()
        .name("<eval>")
        .max_stack(4)
        .instruction(Instruction::Const(msg))
        .instruction(Instruction::Const(pi))
        .instruction(Instruction::Add)
        .instruction(Instruction::Return)
        .handler(HandlerEntry {
            start_pc: 0,
            end_pc: 3,
            catch_pc: u32::MAX,
            finally_pc: 3,
        })
        .line_map(lines)
        .build();
    builder.add_function(entry);

    builder
        .declarations(Declarations::new().var_name("x").lex_name("y"))
        .build()
}

#[test]
fn roundtrip_preserves_structure() {
    let module = sample_module();
    let restored = Module::from_bytes(&module.to_bytes().unwrap()).unwrap();

    assert_eq!(restored.filename, "sample.js");
    let f = restored.entry_function().unwrap();
    assert_eq!(f.instructions.len(), 4);
    assert_eq!(f.handlers.len(), 1);
    assert_eq!(f.line_map.find(1), Some((1, 1)));
    assert_eq!(f.line_map.find(2), Some((2, 5)));
    assert_eq!(restored.declarations.var_names, vec!["x"]);
    assert_eq!(restored.declarations.lex_names, vec!["y"]);
}

#[test]
fn version_mismatch_is_rejected() {
    let module = sample_module();
    let mut bytes = module.to_bytes().unwrap();
    bytes[8] = 0xFF; // corrupt the version field
    assert!(Module::from_bytes(&bytes).is_err());
}

#[test]
fn negative_zero_survives_the_pool() {
    let mut builder = Module::builder("zero.js");
    let idx = builder.constants_mut().add_number(-0.0);
    let module = builder.build();
    let restored = Module::from_bytes(&module.to_bytes().unwrap()).unwrap();
    match restored.constants.get(idx).unwrap() {
        marten_vm_bytecode::Constant::Number(n) => {
            assert_eq!(*n, 0.0);
            assert!(n.is_sign_negative());
        }
        other => panic!("unexpected constant {other:?}"),
    }
}
