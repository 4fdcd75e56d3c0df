//! Statement compiler (C7): control flow, `var` binding, assignment, and
//! call statements.

use crate::error::{CompileError, CompileResult};

use super::lexer::Token;
use super::names;
use super::opcodes::{BinOp, OpCode, SetMethod, TermTag};
use super::val::Val;
use super::Compiler;

/// Instructions skip by byte offset; below this threshold the short
/// (1-byte operand) jump form is used, otherwise the 3-byte (`u24`) one.
const SHORT_JUMP_LIMIT: usize = 250;

fn u24(v: u32) -> [u8; 3] {
    [v as u8, (v >> 8) as u8, (v >> 16) as u8]
}

impl<'a> Compiler<'a> {
    /// Compile one statement, appending its bytecode to `out`. The top
    /// level repeatedly calls this until the token stream is exhausted;
    /// nested bodies (`for`/`if`/`with`/... single-statement bodies, or a
    /// `{ ... }` block) call it recursively.
    pub(crate) fn compile_line(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        if self.eat(&Token::LBrace) {
            while !self.eat(&Token::RBrace) {
                if self.at_end() {
                    return Err(CompileError::Syntax("unterminated block".into()));
                }
                self.compile_line(out)?;
            }
            return Ok(());
        }
        if self.eat_keyword("exit") {
            out.push(OpCode::Exit as u8);
            self.eat(&Token::Semicolon);
            return Ok(());
        }
        if self.eat_keyword("var") {
            return self.compile_var(out);
        }
        if self.eat_keyword("for") {
            return self.compile_for(out);
        }
        if self.eat_keyword("if") {
            return self.compile_if(out);
        }
        if self.eat_keyword("with") {
            return self.compile_with(out);
        }
        if self.eat_keyword("return") {
            let val = self.compile_expr_val()?;
            out.push(OpCode::Return as u8);
            val.emit(out);
            self.eat(&Token::Semicolon);
            return Ok(());
        }
        if self.eat_keyword("while") {
            return self.compile_while(out);
        }
        if self.eat_keyword("do") {
            return self.compile_do_until(out);
        }
        if self.eat_keyword("repeat") {
            return self.compile_repeat(out);
        }
        self.compile_call_or_assignment(out)
    }

    fn compile_var(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let mut names_list = Vec::new();
        loop {
            names_list.push(self.expect_ident()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            break;
        }
        self.eat(&Token::Semicolon);

        if names_list.len() > 256 {
            return Err(CompileError::TooManyVars(names_list.len()));
        }
        out.push(OpCode::BindVars as u8);
        out.push(names_list.len() as u8);
        for name in names_list {
            let id = self.fields.intern(&name)?;
            out.extend_from_slice(&(id as u16).to_le_bytes());
        }
        Ok(())
    }

    /// A condition expression, optionally parenthesized.
    fn compile_condition(&mut self) -> CompileResult<Val> {
        if self.eat(&Token::LParen) {
            let val = self.compile_expr_val()?;
            self.expect(&Token::RParen)?;
            Ok(val)
        } else {
            self.compile_expr_val()
        }
    }

    fn compile_if(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let test_val = self.compile_condition()?;
        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;

        if self.eat_keyword("else") {
            let mut else_bytes = Vec::new();
            self.compile_line(&mut else_bytes)?;

            let jump_over_else_len = jump_instr_len(else_bytes.len());
            let body_region = body_bytes.len() + jump_over_else_len;

            out.push(OpCode::TestValNot as u8);
            test_val.emit(out);
            emit_forward_jump(out, body_region);
            out.extend(body_bytes);
            emit_forward_jump(out, else_bytes.len());
            out.extend(else_bytes);
        } else {
            out.push(OpCode::TestValNot as u8);
            test_val.emit(out);
            emit_forward_jump(out, body_bytes.len());
            out.extend(body_bytes);
        }
        Ok(())
    }

    fn compile_with(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let expr_val = self.compile_condition()?;
        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;

        out.push(OpCode::ChangeContext as u8);
        expr_val.emit(out);
        let body_len = (body_bytes.len() + 1) as u32; // +1 for REVERT_CONTEXT
        out.extend_from_slice(&u24(body_len));
        out.extend(body_bytes);
        out.push(OpCode::RevertContext as u8);
        Ok(())
    }

    fn compile_for(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        self.expect(&Token::LParen)?;
        let mut init_bytes = Vec::new();
        self.compile_line(&mut init_bytes)?;

        let test_val = self.compile_expr_val()?;
        self.expect(&Token::Semicolon)?;

        let mut step_bytes = Vec::new();
        self.compile_line(&mut step_bytes)?;
        self.expect(&Token::RParen)?;

        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;

        let loop_bytes = assemble_loop(init_bytes, test_val, step_bytes, body_bytes);
        out.extend(loop_bytes);
        Ok(())
    }

    fn compile_while(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let test_val = self.compile_condition()?;
        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;
        let loop_bytes = assemble_loop(Vec::new(), test_val, Vec::new(), body_bytes);
        out.extend(loop_bytes);
        Ok(())
    }

    fn compile_do_until(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;
        if !self.eat_keyword("until") {
            return Err(CompileError::Syntax("expected 'until' after 'do' body".into()));
        }
        let test_val = self.compile_condition()?;
        self.eat(&Token::Semicolon);

        let mut test_instr = vec![OpCode::TestValNot as u8];
        test_val.emit(&mut test_instr);
        let back_offset = body_bytes.len() + test_instr.len();

        out.extend(body_bytes);
        out.extend(test_instr);
        emit_backward_jump(out, back_offset);
        Ok(())
    }

    fn compile_repeat(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let count_val = self.compile_expr_val()?;
        let mut body_bytes = Vec::new();
        self.compile_line(&mut body_bytes)?;

        let temp_name = format!("__repeat_{}", self.fresh_temp_id());
        let field_id = self.fields.intern(&temp_name)? as u16;

        let mut init_bytes = vec![OpCode::SetField as u8];
        init_bytes.extend_from_slice(&field_id.to_le_bytes());
        init_bytes.push(SetMethod::Assign as u8);
        count_val.emit(&mut init_bytes);

        let mut test_bytecode = vec![TermTag::Field as u8];
        test_bytecode.extend_from_slice(&field_id.to_le_bytes());
        test_bytecode.push(BinOp::Gt as u8);
        Val::literal(0).emit(&mut test_bytecode);
        test_bytecode.push(BinOp::Stop as u8);
        let test_idx = self.code.push(test_bytecode, true)?;
        let test_val = Val::code_object(test_idx);

        let mut step_bytes = vec![OpCode::SetField as u8];
        step_bytes.extend_from_slice(&field_id.to_le_bytes());
        step_bytes.push(SetMethod::Subtract as u8);
        Val::literal(1).emit(&mut step_bytes);

        let loop_bytes = assemble_loop(init_bytes, test_val, step_bytes, body_bytes);
        out.extend(loop_bytes);
        Ok(())
    }

    fn compile_call_or_assignment(&mut self, out: &mut Vec<u8>) -> CompileResult<()> {
        let name = self.expect_ident()?;
        if self.peek() == Some(&Token::LParen) {
            return self.compile_call_statement(out, name);
        }
        if self.peek() == Some(&Token::Dot) {
            return self.compile_deref_assignment(out, name);
        }
        self.compile_set_target(out, name)
    }

    fn compile_call_statement(&mut self, out: &mut Vec<u8>, name: String) -> CompileResult<()> {
        self.expect(&Token::LParen)?;
        let args = self.parse_arg_list()?;

        if let Some(id) = self.scope.resolve_script(&name) {
            out.push(OpCode::RunScript as u8);
            out.extend_from_slice(&id.to_le_bytes());
            out.push(args.len() as u8);
            for a in &args {
                a.emit(out);
            }
        } else if let Some(id) = names::internal_func_id(&name) {
            out.push(OpCode::RunInternalFunc as u8);
            out.extend_from_slice(&id.to_le_bytes());
            out.push(args.len() as u8);
            for a in &args {
                a.emit(out);
            }
        } else {
            return Err(CompileError::UnknownCall(name));
        }

        self.eat(&Token::Semicolon);
        Ok(())
    }

    /// How many tokens ahead a balanced `[...]` index spans starting at the
    /// current position; `0` if the next token isn't `[`. Pure lookahead —
    /// does not advance the cursor.
    fn bracket_span(&self) -> usize {
        if self.peek() != Some(&Token::LBracket) {
            return 0;
        }
        let mut depth = 0i32;
        let mut i = 0usize;
        loop {
            match self.peek_at(i) {
                Some(Token::LBracket) => depth += 1,
                Some(Token::RBracket) => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                Some(_) => {}
                None => return i,
            }
            i += 1;
        }
    }

    /// Walks a `.`-separated assignment target prefix, emitting one `DEREF`
    /// per segment, then compiles the final target and appends one
    /// `RESET_DEREF` per `DEREF` emitted (spec.md section 4.4, scenario 5).
    ///
    /// A non-terminal segment may itself carry an array index (`a.b[i].c`);
    /// `bracket_span` looks past it before deciding whether `name` is an
    /// intermediate deref step or the final assignment target, so the
    /// index is consumed by `resolve_atom_val` rather than mistaken for the
    /// final target's own index.
    fn compile_deref_assignment(&mut self, out: &mut Vec<u8>, first_name: String) -> CompileResult<()> {
        let mut resets = 0u32;
        let mut name = first_name;
        loop {
            let span = self.bracket_span();
            if self.peek_at(span) != Some(&Token::Dot) {
                break;
            }
            let head_val = self.resolve_atom_val(&name)?;
            out.push(OpCode::Deref as u8);
            head_val.emit(out);
            resets += 1;
            self.expect(&Token::Dot)?;
            name = self.expect_ident()?;
        }
        self.compile_set_target(out, name)?;
        for _ in 0..resets {
            out.push(OpCode::ResetDeref as u8);
        }
        Ok(())
    }

    fn expect_set_method(&mut self) -> CompileResult<SetMethod> {
        if let Some(Token::Op(op)) = self.peek().cloned() {
            if let Some(m) = SetMethod::from_token(&op) {
                self.advance();
                return Ok(m);
            }
        }
        Err(CompileError::Syntax(format!("expected an assignment operator, found {:?}", self.peek())))
    }

    /// Classify an already-consumed identifier per `_getVarType`'s order
    /// (game value, instance variable, else field) and compile the
    /// remainder of an assignment statement against it.
    fn compile_set_target(&mut self, out: &mut Vec<u8>, name: String) -> CompileResult<()> {
        if let Some(id) = names::game_value_id(&name) {
            let method = self.expect_set_method()?;
            let rhs = self.compile_expr_val()?;
            out.push(OpCode::SetGameValue as u8);
            out.push(id);
            out.push(method as u8);
            rhs.emit(out);
            self.eat(&Token::Semicolon);
            return Ok(());
        }

        if let Some(id) = names::instance_var_id(&name) {
            let has_bracket = matches!(self.peek(), Some(Token::LBracket));
            if names::is_alarm(&name) && !has_bracket {
                return Err(CompileError::BadArrayUse("alarm assignment requires an array index"));
            }
            if !names::is_alarm(&name) && has_bracket {
                return Err(CompileError::BadArrayUse("instance variable does not take an array index"));
            }
            let index_val = self.parse_optional_index()?.unwrap_or(Val::literal(0));
            let method = self.expect_set_method()?;
            let rhs = self.compile_expr_val()?;
            out.push(OpCode::SetInstanceVar as u8);
            out.push(id);
            index_val.emit(out);
            out.push(method as u8);
            rhs.emit(out);
            self.eat(&Token::Semicolon);
            return Ok(());
        }

        let field_id = self.fields.intern(&name)? as u16;
        if let Some(index_val) = self.parse_optional_index()? {
            let method = self.expect_set_method()?;
            let rhs = self.compile_expr_val()?;
            out.push(OpCode::SetArray as u8);
            index_val.emit(out);
            out.extend_from_slice(&field_id.to_le_bytes());
            out.push(method as u8);
            rhs.emit(out);
        } else {
            let method = self.expect_set_method()?;
            let rhs = self.compile_expr_val()?;
            out.push(OpCode::SetField as u8);
            out.extend_from_slice(&field_id.to_le_bytes());
            out.push(method as u8);
            rhs.emit(out);
        }
        self.eat(&Token::Semicolon);
        Ok(())
    }
}

fn jump_instr_len(region_len: usize) -> usize {
    if region_len < SHORT_JUMP_LIMIT {
        2
    } else {
        4
    }
}

fn emit_forward_jump(out: &mut Vec<u8>, region_len: usize) {
    if region_len < SHORT_JUMP_LIMIT {
        out.push(OpCode::Jump as u8);
        out.push(region_len as u8);
    } else {
        out.push(OpCode::JumpLong as u8);
        out.extend_from_slice(&u24(region_len as u32));
    }
}

fn emit_backward_jump(out: &mut Vec<u8>, offset: usize) {
    if offset < SHORT_JUMP_LIMIT {
        out.push(OpCode::JumpBack as u8);
        out.push(offset as u8);
    } else {
        out.push(OpCode::JumpBackLong as u8);
        out.extend_from_slice(&u24(offset as u32));
    }
}

/// Assembles a `for`/`while`/`repeat`-shaped loop:
/// `init; TEST_VAL_NOT test; JUMP past (body+step+back-jump); body; step;
/// JUMP_BACK to the TEST_VAL_NOT`.
///
/// The forward jump's region includes the backward jump's own encoded size,
/// and the backward jump's offset includes the forward jump's own encoded
/// size, so the short/long choice for each is resolved by a small
/// fixed-point iteration (sizes only grow, so this converges in at most two
/// rounds).
fn assemble_loop(init: Vec<u8>, test_val: Val, step: Vec<u8>, body: Vec<u8>) -> Vec<u8> {
    let mut test_instr = vec![OpCode::TestValNot as u8];
    test_val.emit(&mut test_instr);

    let mut fwd_long = false;
    let mut back_long = false;
    for _ in 0..4 {
        let fwd_size = if fwd_long { 4 } else { 2 };
        let back_size = if back_long { 4 } else { 2 };
        let region = body.len() + step.len() + back_size;
        let back_offset = test_instr.len() + fwd_size + body.len() + step.len();
        let new_fwd_long = region >= SHORT_JUMP_LIMIT;
        let new_back_long = back_offset >= SHORT_JUMP_LIMIT;
        if new_fwd_long == fwd_long && new_back_long == back_long {
            break;
        }
        fwd_long = new_fwd_long;
        back_long = new_back_long;
    }

    let fwd_size = if fwd_long { 4 } else { 2 };
    let back_size = if back_long { 4 } else { 2 };
    let region = body.len() + step.len() + back_size;
    let back_offset = test_instr.len() + fwd_size + body.len() + step.len();

    let mut out = Vec::new();
    out.extend(init);
    out.extend(test_instr);
    emit_forward_jump(&mut out, region);
    out.extend(body);
    out.extend(step);
    emit_backward_jump(&mut out, back_offset);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::intern::{CodeObjectTable, ConstantPool, FieldTable};
    use crate::compiler::names::Scope;
    use crate::compiler::{compile_code, lexer::Lexer};

    fn compile(src: &str) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let mut fields = FieldTable::new();
        let mut code = CodeObjectTable::new();
        compile_code(src, &mut pool, &mut fields, &mut code).unwrap().bytecode
    }

    #[test]
    fn deref_assignment_matches_the_documented_shape() {
        let bytes = compile("obj.x = 5;");
        assert_eq!(bytes[0], OpCode::Deref as u8);
        // DEREF val (3 bytes) then SET_INSTANCE_VAR.
        assert_eq!(bytes[4], OpCode::SetInstanceVar as u8);
        assert_eq!(*bytes.last().unwrap(), OpCode::Exit as u8);
        assert_eq!(bytes[bytes.len() - 2], OpCode::ResetDeref as u8);
    }

    #[test]
    fn bracketed_non_terminal_segment_keeps_the_trailing_field() {
        // `b`'s own `[i]` must not be mistaken for `c`'s index: two DEREFs
        // (for `a` and `b`), then a SET_FIELD for the real final target `c`.
        let bytes = compile("a.b[i].c = 1;");
        assert_eq!(bytes[0], OpCode::Deref as u8);
        assert_eq!(bytes[4], OpCode::Deref as u8);
        assert_eq!(bytes[8], OpCode::SetField as u8);
        let deref_count = bytes.iter().filter(|&&b| b == OpCode::Deref as u8).count();
        let reset_count = bytes.iter().filter(|&&b| b == OpCode::ResetDeref as u8).count();
        assert_eq!(deref_count, 2);
        assert_eq!(reset_count, 2);
    }

    #[test]
    fn var_statement_binds_every_name() {
        let bytes = compile("var a, b, c;");
        assert_eq!(bytes[0], OpCode::BindVars as u8);
        assert_eq!(bytes[1], 3);
    }

    #[test]
    fn too_many_var_names_is_rejected() {
        let mut pool = ConstantPool::new();
        let mut fields = FieldTable::new();
        let mut code = CodeObjectTable::new();
        let names_csv = (0..257).map(|i| format!("v{}", i)).collect::<Vec<_>>().join(", ");
        let src = format!("var {};", names_csv);
        let err = compile_code(&src, &mut pool, &mut fields, &mut code).unwrap_err();
        assert!(matches!(err, CompileError::TooManyVars(257)));
    }

    #[test]
    fn if_else_emits_both_branches() {
        let bytes = compile("if (a) { b = 1; } else { b = 2; }");
        assert_eq!(bytes[0], OpCode::TestValNot as u8);
    }

    #[test]
    fn call_statement_resolves_internal_func() {
        let bytes = compile("show_debug_message(1);");
        assert_eq!(bytes[0], OpCode::RunInternalFunc as u8);
    }

    #[test]
    fn unresolved_call_is_an_error() {
        let mut pool = ConstantPool::new();
        let mut fields = FieldTable::new();
        let mut code = CodeObjectTable::new();
        let err = compile_code("nonexistent_thing(1);", &mut pool, &mut fields, &mut code).unwrap_err();
        assert!(matches!(err, CompileError::UnknownCall(_)));
    }

    #[test]
    fn unary_precedence_and_scope_resolve_construct() {
        let scope = Scope::empty();
        let _ = scope.resolve_script("whatever");
    }
}
