//! Expression compiler (C6): chain parsing, precedence reshaping, constant
//! folding, unary-modifier optimization, and bytecode emission.

use crate::error::{CompileError, CompileResult};
use crate::types::MAX_LITERAL_INT;

use super::lexer::Token;
use super::names;
use super::opcodes::{BinOp, OpCode, TermTag, UnaryMod};
use super::val::Val;
use super::Compiler;

/// One link in an expression's element chain (spec.md section 4.4).
struct Element {
    unary_mods: Vec<UnaryMod>,
    term_bytes: Vec<u8>,
    /// Present when the term reduces to a plain VAL (literal, constant-pool
    /// reference, asset name, or a sub-chain that collapsed to one VAL).
    /// Absent for call/read forms whose term bytes are a tag byte plus
    /// operands rather than a bare VAL.
    term_val: Option<Val>,
    op: BinOp,
}

impl<'a> Compiler<'a> {
    /// Compile a standalone expression and return the VAL that represents
    /// its value: the expression's own VAL if it reduces to one, otherwise a
    /// freshly registered code-object VAL wrapping its bytecode.
    pub(crate) fn compile_expr_val(&mut self) -> CompileResult<Val> {
        let elements = self.parse_element_chain()?;
        let (bytes, val) = self.finish_chain(elements)?;
        match val {
            Some(v) => Ok(v),
            None => {
                let idx = self.code.push(bytes, true)?;
                Ok(Val::code_object(idx))
            }
        }
    }

    fn finish_chain(&mut self, elements: Vec<Element>) -> CompileResult<(Vec<u8>, Option<Val>)> {
        let elements = self.reshape(elements)?;
        let elements = fold_constants(elements);
        if elements.len() == 1 && elements[0].unary_mods.is_empty() && elements[0].op == BinOp::Stop
        {
            if let Some(v) = elements[0].term_val {
                return Ok((v.to_bytes().to_vec(), Some(v)));
            }
        }
        Ok((emit_chain(&elements), None))
    }

    fn parse_element_chain(&mut self) -> CompileResult<Vec<Element>> {
        let mut elements = Vec::new();
        loop {
            let mods = simplify_unary_mods(self.parse_unary_mods());
            let (term_bytes, term_val) = self.parse_term()?;
            let op = self.parse_binop_or_stop();
            let stop = op == BinOp::Stop;
            elements.push(Element { unary_mods: mods, term_bytes, term_val, op });
            if stop {
                break;
            }
        }
        Ok(elements)
    }

    fn parse_unary_mods(&mut self) -> Vec<UnaryMod> {
        let mut mods = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Op(op)) if op == "-" => {
                    self.advance();
                    mods.push(UnaryMod::Negate);
                }
                Some(Token::Op(op)) if op == "!" => {
                    self.advance();
                    mods.push(UnaryMod::LogicalNot);
                }
                Some(Token::Op(op)) if op == "~" => {
                    self.advance();
                    mods.push(UnaryMod::BitwiseNot);
                }
                Some(Token::Op(op)) if op == "+" => {
                    self.advance();
                }
                _ => break,
            }
        }
        mods
    }

    fn parse_binop_or_stop(&mut self) -> BinOp {
        if let Some(Token::Op(op)) = self.peek() {
            if let Some(b) = BinOp::from_token(op) {
                self.advance();
                return b;
            }
        }
        if matches!(self.peek_ident(), Some("mod")) {
            self.advance();
            return BinOp::Mod;
        }
        BinOp::Stop
    }

    fn parse_term(&mut self) -> CompileResult<(Vec<u8>, Option<Val>)> {
        match self.peek().cloned() {
            Some(Token::PoolRef(n)) => {
                self.advance();
                let val = Val::constant(n);
                Ok((val.to_bytes().to_vec(), Some(val)))
            }
            Some(Token::Number(text)) => {
                self.advance();
                let val = self.number_to_val(&text)?;
                Ok((val.to_bytes().to_vec(), Some(val)))
            }
            Some(Token::LParen) => {
                self.advance();
                let elements = self.parse_element_chain_until_rparen()?;
                self.expect(&Token::RParen)?;
                self.finish_chain(elements)
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if name == "pi" {
                    let val = Val::constant(self.pool.intern_double(std::f64::consts::PI)?);
                    return Ok((val.to_bytes().to_vec(), Some(val)));
                }
                if self.peek() == Some(&Token::Dot) {
                    let head = self.resolve_atom_val(&name)?;
                    return self.parse_deref_tail(head);
                }
                let (bytes, val) = self.parse_ident_term(name)?;
                if self.peek() == Some(&Token::Dot) {
                    let head = match val {
                        Some(v) => v,
                        None => {
                            let idx = self.code.push(bytes, true)?;
                            Val::code_object(idx)
                        }
                    };
                    return self.parse_deref_tail(head);
                }
                Ok((bytes, val))
            }
            other => Err(CompileError::Syntax(format!("expected a term, found {:?}", other))),
        }
    }

    /// Parses a `(...)`-bracketed sub-chain's elements without consuming the
    /// closing paren (the caller does, after this returns).
    fn parse_element_chain_until_rparen(&mut self) -> CompileResult<Vec<Element>> {
        self.parse_element_chain()
    }

    fn number_to_val(&mut self, text: &str) -> CompileResult<Val> {
        if !text.contains('.') {
            if let Ok(n) = text.parse::<u32>() {
                if n <= MAX_LITERAL_INT {
                    return Ok(Val::literal(n));
                }
            }
        }
        let value: f64 = text.parse().map_err(|_| CompileError::Syntax(format!("bad number literal: {}", text)))?;
        Ok(Val::constant(self.pool.intern_double(value)?))
    }

    /// Resolve a bare identifier (no call, no bracket) to a VAL, used for
    /// deref-chain heads and intermediate segments.
    pub(crate) fn resolve_atom_val(&mut self, name: &str) -> CompileResult<Val> {
        match name {
            "self" => return Ok(Val::constant(self.pool.intern_double(-1.0)?)),
            "other" => return Ok(Val::constant(self.pool.intern_double(-2.0)?)),
            "all" => return Ok(Val::literal(0)),
            "noone" => return Ok(Val::constant(self.pool.intern_double(-4.0)?)),
            _ => {}
        }
        let (bytes, val) = self.parse_ident_term(name.to_string())?;
        match val {
            Some(v) => Ok(v),
            None => {
                let idx = self.code.push(bytes, true)?;
                Ok(Val::code_object(idx))
            }
        }
    }

    /// Walks a `.`-separated chain to its final readable segment, wrapping
    /// the whole traversal (`DEREF`, the final term, then one
    /// `RESET_DEREF` per `DEREF` emitted) as a code object.
    fn parse_deref_tail(&mut self, head: Val) -> CompileResult<(Vec<u8>, Option<Val>)> {
        let mut bytecode = Vec::new();
        let mut resets: u32 = 0;
        let mut current_head = head;
        loop {
            self.expect(&Token::Dot)?;
            bytecode.push(OpCode::Deref as u8);
            current_head.emit(&mut bytecode);
            resets += 1;

            let seg_name = self.expect_ident()?;
            if self.peek() == Some(&Token::Dot) {
                current_head = self.resolve_atom_val(&seg_name)?;
                continue;
            }
            let (seg_bytes, seg_val) = self.parse_ident_term(seg_name)?;
            if self.peek() == Some(&Token::Dot) {
                current_head = match seg_val {
                    Some(v) => v,
                    None => {
                        let idx = self.code.push(seg_bytes, true)?;
                        Val::code_object(idx)
                    }
                };
                continue;
            }
            bytecode.extend(seg_bytes);
            break;
        }
        for _ in 0..resets {
            bytecode.push(OpCode::ResetDeref as u8);
        }
        let idx = self.code.push(bytecode, true)?;
        let val = Val::code_object(idx);
        Ok((val.to_bytes().to_vec(), Some(val)))
    }

    /// Classify an already-consumed identifier per `_getVarType`'s order
    /// (game value, instance variable, else field), also handling call
    /// forms and the asset-name lookup precedence.
    pub(crate) fn parse_ident_term(&mut self, name: String) -> CompileResult<(Vec<u8>, Option<Val>)> {
        if self.eat(&Token::LParen) {
            let args = self.parse_arg_list()?;
            if let Some(id) = self.scope.resolve_script(&name) {
                let mut bytes = vec![TermTag::Script as u8];
                bytes.extend_from_slice(&id.to_le_bytes());
                bytes.push(args.len() as u8);
                for a in &args {
                    a.emit(&mut bytes);
                }
                return Ok((bytes, None));
            }
            if let Some(id) = names::internal_func_id(&name) {
                let mut bytes = vec![TermTag::InternalFunc as u8];
                bytes.extend_from_slice(&id.to_le_bytes());
                bytes.push(args.len() as u8);
                for a in &args {
                    a.emit(&mut bytes);
                }
                return Ok((bytes, None));
            }
            return Err(CompileError::UnknownCall(name));
        }

        if let Some(idx) = self.scope.resolve_asset_name(&name) {
            let val = Val::literal(idx);
            return Ok((val.to_bytes().to_vec(), Some(val)));
        }

        if let Some(id) = names::game_value_id(&name) {
            let array_val = self.parse_optional_index()?.unwrap_or(Val::literal(0));
            let mut bytes = vec![TermTag::GameValue as u8, id];
            array_val.emit(&mut bytes);
            return Ok((bytes, None));
        }

        if let Some(id) = names::instance_var_id(&name) {
            let has_bracket = matches!(self.peek(), Some(Token::LBracket));
            if names::is_alarm(&name) && !has_bracket {
                return Err(CompileError::BadArrayUse("alarm read requires an array index"));
            }
            if !names::is_alarm(&name) && has_bracket {
                return Err(CompileError::BadArrayUse("instance variable does not take an array index"));
            }
            let array_val = self.parse_optional_index()?.unwrap_or(Val::literal(0));
            let mut bytes = vec![TermTag::InstanceVar as u8, id];
            array_val.emit(&mut bytes);
            return Ok((bytes, None));
        }

        let field_id = self.fields.intern(&name)?;
        if let Some(index_val) = self.parse_optional_index()? {
            let mut bytes = vec![TermTag::Array as u8];
            bytes.extend_from_slice(&(field_id as u16).to_le_bytes());
            index_val.emit(&mut bytes);
            Ok((bytes, None))
        } else {
            let mut bytes = vec![TermTag::Field as u8];
            bytes.extend_from_slice(&(field_id as u16).to_le_bytes());
            Ok((bytes, None))
        }
    }

    pub(crate) fn parse_optional_index(&mut self) -> CompileResult<Option<Val>> {
        if self.eat(&Token::LBracket) {
            let val = self.compile_expr_val()?;
            self.expect(&Token::RBracket)?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn parse_arg_list(&mut self) -> CompileResult<Vec<Val>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.compile_expr_val()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen)?;
            break;
        }
        Ok(args)
    }

    /// Precedence reshaping: whenever an operator is immediately followed by
    /// a strictly higher-precedence one, splice out the higher-precedence
    /// run, compile it as its own chain, and replace it with a single
    /// element carrying that result.
    fn reshape(&mut self, mut elements: Vec<Element>) -> CompileResult<Vec<Element>> {
        let mut i = 0;
        while i + 1 < elements.len() {
            let base_prec = elements[i].op.precedence();
            if elements[i + 1].op.precedence() > base_prec {
                let mut k = i + 1;
                while k < elements.len() && elements[k].op.precedence() > base_prec {
                    k += 1;
                }
                // k now indexes the first element whose op drops back to
                // base_prec or below; it is the last member of the run.
                let run: Vec<Element> = elements.drain((i + 1)..=k).collect();
                let trailing_op = run.last().map(|e| e.op).unwrap_or(BinOp::Stop);
                let mut sub = run;
                if let Some(last) = sub.last_mut() {
                    last.op = BinOp::Stop;
                }
                let (bytes, val) = self.finish_chain(sub)?;
                let spliced_val = match val {
                    Some(v) => v,
                    None => Val::code_object(self.code.push(bytes, true)?),
                };
                let spliced = Element {
                    unary_mods: Vec::new(),
                    term_bytes: spliced_val.to_bytes().to_vec(),
                    term_val: Some(spliced_val),
                    op: trailing_op,
                };
                elements.insert(i + 1, spliced);
            }
            i += 1;
        }
        Ok(elements)
    }
}

/// Cancel adjacent `negate`/`negate` and `bitwise-not`/`bitwise-not` pairs;
/// collapse runs of `logical-not` by parity.
fn simplify_unary_mods(mods: Vec<UnaryMod>) -> Vec<UnaryMod> {
    let mut stack: Vec<UnaryMod> = Vec::new();
    for m in mods {
        if let Some(&top) = stack.last() {
            if (top == UnaryMod::Negate && m == UnaryMod::Negate)
                || (top == UnaryMod::BitwiseNot && m == UnaryMod::BitwiseNot)
            {
                stack.pop();
                continue;
            }
        }
        stack.push(m);
    }

    let mut result = Vec::with_capacity(stack.len());
    let mut i = 0;
    while i < stack.len() {
        if stack[i] == UnaryMod::LogicalNot {
            let mut run = 0;
            while i < stack.len() && stack[i] == UnaryMod::LogicalNot {
                run += 1;
                i += 1;
            }
            if run % 2 == 1 {
                result.push(UnaryMod::LogicalNot);
            }
        } else {
            result.push(stack[i]);
            i += 1;
        }
    }
    result
}

/// Repeatedly collapse adjacent pairs of unmodified literal-int elements
/// joined by a foldable operator, using unsigned 32-bit arithmetic.
fn fold_constants(mut elements: Vec<Element>) -> Vec<Element> {
    loop {
        let mut folded_any = false;
        let mut i = 0;
        while i + 1 < elements.len() {
            let foldable = elements[i].unary_mods.is_empty()
                && elements[i + 1].unary_mods.is_empty()
                && elements[i].op.is_foldable();
            if foldable {
                if let (Some(a), Some(b)) = (
                    elements[i].term_val.and_then(|v| v.as_literal()),
                    elements[i + 1].term_val.and_then(|v| v.as_literal()),
                ) {
                    if let Some(result) = elements[i].op.fold_u32(a, b) {
                        if result <= MAX_LITERAL_INT {
                            let next_op = elements[i + 1].op;
                            let val = Val::literal(result);
                            elements[i] = Element {
                                unary_mods: Vec::new(),
                                term_bytes: val.to_bytes().to_vec(),
                                term_val: Some(val),
                                op: next_op,
                            };
                            elements.remove(i + 1);
                            folded_any = true;
                            continue;
                        }
                    }
                }
            }
            i += 1;
        }
        if !folded_any {
            break;
        }
    }
    elements
}

/// Emit each element's var bytes, its unary modifiers in reverse of
/// encountered order, then its operator byte.
fn emit_chain(elements: &[Element]) -> Vec<u8> {
    let mut out = Vec::new();
    for el in elements {
        out.extend_from_slice(&el.term_bytes);
        for m in el.unary_mods.iter().rev() {
            out.push(*m as u8);
        }
        out.push(el.op as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::intern::{CodeObjectTable, ConstantPool, FieldTable};
    use crate::compiler::names::Scope;

    fn val_of(src: &str) -> Val {
        let mut pool = ConstantPool::new();
        let mut fields = FieldTable::new();
        let mut code = CodeObjectTable::new();
        let scope = Scope::empty();
        let tokens = super::super::lexer::Lexer::new(src).tokenize();
        let mut c = Compiler::new(tokens, &mut pool, &mut fields, &mut code, &scope);
        c.compile_expr_val().unwrap()
    }

    #[test]
    fn constant_folding_collapses_to_one_literal() {
        let v = val_of("1 + 2 * 3");
        assert_eq!(v.as_literal(), Some(7));
    }

    #[test]
    fn three_logical_nots_collapse_to_one() {
        let mods = simplify_unary_mods(vec![
            UnaryMod::LogicalNot,
            UnaryMod::LogicalNot,
            UnaryMod::LogicalNot,
        ]);
        assert_eq!(mods, vec![UnaryMod::LogicalNot]);
    }

    #[test]
    fn double_negate_cancels() {
        let mods = simplify_unary_mods(vec![UnaryMod::Negate, UnaryMod::Negate]);
        assert!(mods.is_empty());
    }

    #[test]
    fn literal_at_boundary_stays_literal_kind() {
        let v = val_of("4194303");
        assert_eq!(v.as_literal(), Some(0x3F_FFFF));
    }

    #[test]
    fn literal_over_boundary_becomes_constant() {
        let v = val_of("4194304");
        assert!(v.as_literal().is_none());
    }

    #[test]
    fn precedence_reshape_wraps_higher_precedence_run() {
        let mut pool = ConstantPool::new();
        let mut fields = FieldTable::new();
        let mut code = CodeObjectTable::new();
        let scope = Scope::empty();
        let tokens = super::super::lexer::Lexer::new("a + b * c").tokenize();
        let mut c = Compiler::new(tokens, &mut pool, &mut fields, &mut code, &scope);
        let val = c.compile_expr_val().unwrap();
        // Not a plain literal or constant: the whole thing had to be wrapped
        // as a code object since `a` is a field read, not foldable.
        assert!(val.as_literal().is_none());
        assert_eq!(code.len(), 1);
    }
}
