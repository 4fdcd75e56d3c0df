//! End-to-end compiler tests: source text in, bytecode shape out.

use gm8run::compiler::opcodes::OpCode;
use gm8run::compiler::{self, CodeObjectTable, ConstantPool, FieldTable};

fn compile(source: &str) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let mut fields = FieldTable::new();
    let mut code = CodeObjectTable::new();
    compiler::compile_code(source, &mut pool, &mut fields, &mut code).unwrap().bytecode
}

#[test]
fn constant_folding_collapses_arithmetic_at_compile_time() {
    // `1 + 2 * 3` should fold to the literal 7 rather than emitting any
    // arithmetic opcodes.
    let a = compile("x = 1 + 2 * 3;");
    let b = compile("x = 7;");
    assert_eq!(a, b);
}

#[test]
fn precedence_reshape_matches_explicit_parens() {
    let a = compile("x = 1 + 2 * 3 + 4;");
    let b = compile("x = (1 + (2 * 3)) + 4;");
    assert_eq!(a, b);
}

#[test]
fn an_empty_script_compiles_to_a_bare_exit() {
    let bytecode = compile("");
    assert_eq!(bytecode.len(), 1);
}

#[test]
fn if_else_and_while_compile_without_error() {
    let bytecode = compile(
        r#"
        if (x > 0) {
            y = 1;
        } else {
            y = 2;
        }
        while (y > 0) {
            y -= 1;
        }
        "#,
    );
    assert!(!bytecode.is_empty());
}

#[test]
fn repeat_loop_compiles_without_error() {
    let bytecode = compile("repeat (5) { x += 1; }");
    assert!(!bytecode.is_empty());
}

#[test]
fn bracketed_non_terminal_deref_segment_reaches_the_final_field() {
    // `a.b[i].c` must not lose its trailing `.c` to `b`'s array index.
    let read = compile("x = a.b[i].c;");
    let derefs = read.iter().filter(|&&b| b == OpCode::Deref as u8).count();
    let resets = read.iter().filter(|&&b| b == OpCode::ResetDeref as u8).count();
    assert_eq!(derefs, 2);
    assert_eq!(resets, 2);

    let write = compile("a.b[i].c = 1;");
    let derefs = write.iter().filter(|&&b| b == OpCode::Deref as u8).count();
    let resets = write.iter().filter(|&&b| b == OpCode::ResetDeref as u8).count();
    assert_eq!(derefs, 2);
    assert_eq!(resets, 2);
}

#[test]
fn unknown_call_is_a_compile_error() {
    let mut pool = ConstantPool::new();
    let mut fields = FieldTable::new();
    let mut code = CodeObjectTable::new();
    let err = compiler::compile_code("totally_unknown_function(1, 2);", &mut pool, &mut fields, &mut code);
    assert!(err.is_err());
}
