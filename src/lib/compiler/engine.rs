// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The compilation engine: recursive descent over the token stream, updating
//! the symbol table at declaration sites and emitting VM commands at use
//! sites. There is no syntax tree; parsing and code generation are one pass.
//!
//! Cursor policy: every `compile_*` routine is entered with the cursor on the
//! first token of its construct and, on success, returns with the cursor on
//! the token immediately after the construct. The sole exception is the
//! outermost `class` production, which spans the whole input: after its
//! closing `}` it confirms that nothing but whitespace and comments remains.

use std::io::Write;

use smartstring::alias::String as SmartString;

use crate::compiler::emitter::{Arith, Emitter, Segment};
use crate::compiler::error::{CompileError, CompileErrorKind, CompileResult};
use crate::compiler::symbols::{Kind, SymbolTable};
use crate::compiler::tokenizer::{Keyword, Token, TokenType, Tokenizer};

/// Propagate a `CompileResult`, stamping this `file:line` onto the error's
/// trace on the way out.
macro_rules! traced {
    ($e:expr) => {
        $e.map_err(|e| e.frame($crate::here!()))?
    };
}

/// Which flavour of subroutine is being compiled. Constructors allocate the
/// object, methods bind the receiver, functions have no prologue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubKind {
    Constructor,
    Function,
    Method,
}

impl SubKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubKind::Constructor => "constructor",
            SubKind::Function => "function",
            SubKind::Method => "method",
        }
    }
}

pub struct Engine<W: Write> {
    toks: Tokenizer,
    syms: SymbolTable,
    emit: Emitter<W>,
    class_name: String,
    sub_kind: Option<SubKind>,
    sub_name: String,
    if_id: usize,
    while_id: usize,
}

impl<W: Write> Engine<W> {
    pub fn new(toks: Tokenizer, emit: Emitter<W>) -> Self {
        Engine {
            toks,
            syms: SymbolTable::new(),
            emit,
            class_name: String::new(),
            sub_kind: None,
            sub_name: String::new(),
            if_id: 0,
            while_id: 0,
        }
    }

    /// Compile the whole input: loads the first token and runs the `class`
    /// production. The first error is fatal; there is no recovery.
    pub fn run(&mut self) -> CompileResult<()> {
        traced!(self.bump());
        traced!(self.compile_class());
        Ok(())
    }

    /// Flush the emitter and hand back its sink.
    pub fn finish(self) -> CompileResult<W> {
        self.emit.finish()
    }

    /// Where compilation was, for the user-visible diagnostic.
    pub fn context(&self) -> String {
        let cls = if self.class_name.is_empty() {
            "<unknown class>"
        } else {
            &self.class_name
        };
        match self.sub_kind {
            Some(kind) => format!("{} {} {}", cls, kind.as_str(), self.sub_name),
            None => cls.to_owned(),
        }
    }

    /// Advance the tokenizer, treating an exhausted stream as an error: the
    /// grammar never asks for a token that may legitimately not exist.
    fn bump(&mut self) -> CompileResult<()> {
        if !self.toks.has_more() {
            return Err(CompileError::new(CompileErrorKind::RanOutOfTokens));
        }
        self.toks.advance()
    }

    fn cur_type(&self) -> CompileResult<TokenType> {
        match self.toks.token_type() {
            Some(tt) => Ok(tt),
            None => Err(CompileError::new(CompileErrorKind::RanOutOfTokens)),
        }
    }

    fn at_symbol(&self, c: u8) -> bool {
        matches!(self.toks.current(), Some(Token::Symbol(s)) if *s == c)
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.toks.current(), Some(Token::Keyword(k)) if *k == kw)
    }

    fn expected(&self, what: &str) -> Box<CompileError> {
        CompileError::new(CompileErrorKind::Expected(match self.toks.current() {
            Some(tok) => format!("{}, found \"{}\"", what, tok),
            None => what.to_owned(),
        }))
    }

    /// Demand that the current token is the symbol `c`, then step past it.
    fn eat_symbol(&mut self, c: u8) -> CompileResult<()> {
        match self.toks.symbol() {
            Ok(s) if s == c => self.bump(),
            _ => Err(self.expected(&format!("the symbol \"{}\"", c as char))),
        }
    }

    /// Demand that the current token is the keyword `kw`, then step past it.
    fn eat_keyword(&mut self, kw: Keyword) -> CompileResult<()> {
        match self.toks.keyword() {
            Ok(k) if k == kw => self.bump(),
            _ => Err(self.expected(&format!("the keyword \"{}\"", kw.as_str()))),
        }
    }

    /// Demand an identifier, returning its name with the cursor one past it.
    fn eat_identifier(&mut self) -> CompileResult<SmartString> {
        let name = match self.toks.identifier() {
            Ok(s) => SmartString::from(s),
            Err(_) => return Err(self.expected("an identifier")),
        };
        self.bump()?;
        Ok(name)
    }

    /// class → `class` IDENT `{` classVarDec* subroutineDec* `}`
    fn compile_class(&mut self) -> CompileResult<()> {
        traced!(self.eat_keyword(Keyword::Class));
        let name = traced!(self.eat_identifier());
        self.class_name = name.to_string();
        traced!(self.eat_symbol(b'{'));

        while self.at_keyword(Keyword::Static) || self.at_keyword(Keyword::Field) {
            traced!(self.compile_class_var_dec());
        }
        while self.at_keyword(Keyword::Constructor)
            || self.at_keyword(Keyword::Function)
            || self.at_keyword(Keyword::Method)
        {
            traced!(self.compile_subroutine());
        }

        if !self.at_symbol(b'}') {
            return Err(self.expected("the symbol \"}\""));
        }
        // A file holds exactly one class: after its `}` only whitespace and
        // comments may remain.
        if self.toks.has_more() {
            traced!(self.toks.advance());
            if self.toks.current().is_some() {
                return Err(self.expected("end of input"));
            }
        }
        Ok(())
    }

    /// classVarDec → (`static`|`field`) type varName (`,` varName)* `;`
    ///
    /// Declarations emit nothing; they only populate the class scope.
    fn compile_class_var_dec(&mut self) -> CompileResult<()> {
        let kind = if self.at_keyword(Keyword::Static) {
            Kind::Static
        } else {
            Kind::Field
        };
        traced!(self.bump());
        let ty = traced!(self.compile_type());
        loop {
            let name = traced!(self.eat_identifier());
            traced!(self.syms.define(&name, &ty, kind));
            if self.at_symbol(b',') {
                traced!(self.bump());
            } else {
                break;
            }
        }
        traced!(self.eat_symbol(b';'));
        Ok(())
    }

    /// type → `int` | `char` | `boolean` | IDENT. Returns the type's name
    /// with the cursor one past it.
    fn compile_type(&mut self) -> CompileResult<SmartString> {
        let ty = match self.toks.current() {
            Some(Token::Keyword(Keyword::Int)) => SmartString::from("int"),
            Some(Token::Keyword(Keyword::Char)) => SmartString::from("char"),
            Some(Token::Keyword(Keyword::Boolean)) => SmartString::from("boolean"),
            Some(Token::Ident(name)) => name.clone(),
            _ => {
                return Err(self.expected("a type: \"int\", \"char\", \"boolean\", or a class name"))
            }
        };
        traced!(self.bump());
        Ok(ty)
    }

    /// subroutineDec → (`constructor`|`function`|`method`) (`void`|type)
    /// IDENT `(` paramList `)` subroutineBody
    fn compile_subroutine(&mut self) -> CompileResult<()> {
        let kind = if self.at_keyword(Keyword::Constructor) {
            SubKind::Constructor
        } else if self.at_keyword(Keyword::Function) {
            SubKind::Function
        } else {
            SubKind::Method
        };
        self.sub_kind = Some(kind);
        traced!(self.bump());

        self.syms.start_subroutine();
        if kind == SubKind::Method {
            // The receiver is the method's hidden first argument.
            let cls = self.class_name.clone();
            traced!(self.syms.define("this", &cls, Kind::Arg));
            debug_assert_eq!(self.syms.index_of("this"), Some(0));
        }

        // The return type plays no part in code generation.
        if self.at_keyword(Keyword::Void) {
            traced!(self.bump());
        } else {
            traced!(self.compile_type());
        }

        let name = traced!(self.eat_identifier());
        self.sub_name = name.to_string();

        traced!(self.eat_symbol(b'('));
        traced!(self.compile_parameter_list());
        traced!(self.eat_symbol(b')'));
        traced!(self.compile_subroutine_body(kind));

        self.sub_kind = None;
        self.sub_name.clear();
        Ok(())
    }

    /// paramList → ( type varName (`,` type varName)* )?
    ///
    /// Entered one past `(`; returns on `)`. After a `,` the next iteration
    /// demands a type, so `,)` cannot parse.
    fn compile_parameter_list(&mut self) -> CompileResult<()> {
        if self.at_symbol(b')') {
            return Ok(());
        }
        loop {
            let ty = traced!(self.compile_type());
            let name = traced!(self.eat_identifier());
            traced!(self.syms.define(&name, &ty, Kind::Arg));
            if self.at_symbol(b',') {
                traced!(self.bump());
            } else {
                break;
            }
        }
        Ok(())
    }

    /// subroutineBody → `{` varDec* statements `}`
    ///
    /// The `function` line can only be written once the local count is
    /// known, so every `var` declaration is consumed before any emission.
    fn compile_subroutine_body(&mut self, kind: SubKind) -> CompileResult<()> {
        traced!(self.eat_symbol(b'{'));
        while self.at_keyword(Keyword::Var) {
            traced!(self.compile_var_dec());
        }

        let qual = format!("{}.{}", self.class_name, self.sub_name);
        traced!(self.emit.function(&qual, self.syms.var_count(Kind::Var)));
        match kind {
            SubKind::Constructor => {
                // Allocate the object and bind `this` to it.
                traced!(self
                    .emit
                    .push(Segment::Constant, self.syms.var_count(Kind::Field)));
                traced!(self.emit.call("Memory.alloc", 1));
                traced!(self.emit.pop(Segment::Pointer, 0));
            }
            SubKind::Method => {
                // Bind `this` to the receiver.
                traced!(self.emit.push(Segment::Argument, 0));
                traced!(self.emit.pop(Segment::Pointer, 0));
            }
            SubKind::Function => (),
        }

        traced!(self.compile_statements());
        traced!(self.eat_symbol(b'}'));
        Ok(())
    }

    /// varDec → `var` type varName (`,` varName)* `;`
    fn compile_var_dec(&mut self) -> CompileResult<()> {
        traced!(self.eat_keyword(Keyword::Var));
        let ty = traced!(self.compile_type());
        loop {
            let name = traced!(self.eat_identifier());
            traced!(self.syms.define(&name, &ty, Kind::Var));
            if self.at_symbol(b',') {
                traced!(self.bump());
            } else {
                break;
            }
        }
        traced!(self.eat_symbol(b';'));
        Ok(())
    }

    /// statements → statement*; stops at the first token that cannot start a
    /// statement (in well-formed input, the enclosing `}`).
    fn compile_statements(&mut self) -> CompileResult<()> {
        loop {
            if self.at_keyword(Keyword::Let) {
                traced!(self.compile_let());
            } else if self.at_keyword(Keyword::If) {
                traced!(self.compile_if());
            } else if self.at_keyword(Keyword::While) {
                traced!(self.compile_while());
            } else if self.at_keyword(Keyword::Do) {
                traced!(self.compile_do());
            } else if self.at_keyword(Keyword::Return) {
                traced!(self.compile_return());
            } else {
                break;
            }
        }
        Ok(())
    }

    /// letStmt → `let` varName (`[` expression `]`)? `=` expression `;`
    fn compile_let(&mut self) -> CompileResult<()> {
        traced!(self.bump()); // let
        let name = traced!(self.eat_identifier());

        if self.at_symbol(b'[') {
            // Array element target. The cell's address is computed up front
            // and parked in `temp 1` so that an array read inside the
            // right-hand side cannot clobber THAT before the store. `temp 1`
            // is reserved for exactly this purpose: nothing else may touch
            // it while the right-hand side evaluates.
            let entry = self
                .syms
                .lookup(&name)
                .map(|e| (e.ty.clone(), e.kind.segment(), e.index));
            let (seg, index) = match entry {
                Some((ty, seg, index)) => {
                    if &*ty != "Array" {
                        return Err(CompileError::new(CompileErrorKind::NotAnArray {
                            name: name.to_string(),
                            ty: ty.to_string(),
                        })
                        .frame(crate::here!()));
                    }
                    (seg, index)
                }
                None => {
                    return Err(CompileError::new(CompileErrorKind::UnresolvedSymbol(
                        name.to_string(),
                    ))
                    .frame(crate::here!()))
                }
            };
            traced!(self.emit.push(seg, index));
            traced!(self.bump()); // [
            traced!(self.compile_expression());
            traced!(self.eat_symbol(b']'));
            traced!(self.emit.arith(Arith::Add));
            traced!(self.emit.pop(Segment::Pointer, 1));
            traced!(self.emit.push(Segment::Pointer, 1));
            traced!(self.emit.pop(Segment::Temp, 1));

            traced!(self.eat_symbol(b'='));
            traced!(self.compile_expression());

            traced!(self.emit.push(Segment::Temp, 1));
            traced!(self.emit.pop(Segment::Pointer, 1));
            traced!(self.emit.pop(Segment::That, 0));
        } else {
            let entry = self.syms.lookup(&name).map(|e| (e.kind.segment(), e.index));
            let (seg, index) = match entry {
                Some(x) => x,
                None => {
                    return Err(CompileError::new(CompileErrorKind::UnresolvedSymbol(
                        name.to_string(),
                    ))
                    .frame(crate::here!()))
                }
            };
            traced!(self.eat_symbol(b'='));
            traced!(self.compile_expression());
            traced!(self.emit.pop(seg, index));
        }
        traced!(self.eat_symbol(b';'));
        Ok(())
    }

    /// ifStmt → `if` `(` expression `)` `{` statements `}`
    ///          (`else` `{` statements `}`)?
    fn compile_if(&mut self) -> CompileResult<()> {
        let id = self.if_id;
        self.if_id += 1;
        let else_label = format!("else_{}_{}", self.class_name, id);
        let end_label = format!("if_else_end_{}_{}", self.class_name, id);

        traced!(self.bump()); // if
        traced!(self.eat_symbol(b'('));
        traced!(self.compile_expression());
        traced!(self.eat_symbol(b')'));
        traced!(self.emit.arith(Arith::Not));
        traced!(self.emit.if_goto(&else_label));

        traced!(self.eat_symbol(b'{'));
        traced!(self.compile_statements());
        traced!(self.eat_symbol(b'}'));
        traced!(self.emit.goto(&end_label));
        traced!(self.emit.label(&else_label));

        if self.at_keyword(Keyword::Else) {
            traced!(self.bump());
            traced!(self.eat_symbol(b'{'));
            traced!(self.compile_statements());
            traced!(self.eat_symbol(b'}'));
        }
        traced!(self.emit.label(&end_label));
        Ok(())
    }

    /// whileStmt → `while` `(` expression `)` `{` statements `}`
    fn compile_while(&mut self) -> CompileResult<()> {
        let id = self.while_id;
        self.while_id += 1;
        let start_label = format!("while_start_{}_{}", self.class_name, id);
        let end_label = format!("while_end_{}_{}", self.class_name, id);

        traced!(self.emit.label(&start_label));
        traced!(self.bump()); // while
        traced!(self.eat_symbol(b'('));
        traced!(self.compile_expression());
        traced!(self.eat_symbol(b')'));
        traced!(self.emit.arith(Arith::Not));
        traced!(self.emit.if_goto(&end_label));

        traced!(self.eat_symbol(b'{'));
        traced!(self.compile_statements());
        traced!(self.eat_symbol(b'}'));
        traced!(self.emit.goto(&start_label));
        traced!(self.emit.label(&end_label));
        Ok(())
    }

    /// doStmt → `do` subroutineCall `;`. The call's value is discarded.
    fn compile_do(&mut self) -> CompileResult<()> {
        traced!(self.bump()); // do
        traced!(self.compile_subroutine_call());
        traced!(self.emit.pop(Segment::Temp, 0));
        traced!(self.eat_symbol(b';'));
        Ok(())
    }

    /// returnStmt → `return` expression? `;`. A void return still supplies a
    /// value for the caller to discard.
    fn compile_return(&mut self) -> CompileResult<()> {
        traced!(self.bump()); // return
        if self.at_symbol(b';') {
            traced!(self.emit.push(Segment::Constant, 0));
        } else {
            traced!(self.compile_expression());
        }
        traced!(self.eat_symbol(b';'));
        traced!(self.emit.ret());
        Ok(())
    }

    /// expression → term (op term)*, strictly left to right: `1 + 2 * 3`
    /// compiles as `(1 + 2) * 3`. There is deliberately no precedence.
    fn compile_expression(&mut self) -> CompileResult<()> {
        traced!(self.compile_term());
        loop {
            let op = match self.toks.current() {
                Some(Token::Symbol(c)) if b"+-*/&|<>=".contains(c) => *c,
                _ => break,
            };
            traced!(self.bump());
            traced!(self.compile_term());
            match op {
                b'+' => traced!(self.emit.arith(Arith::Add)),
                b'-' => traced!(self.emit.arith(Arith::Sub)),
                b'&' => traced!(self.emit.arith(Arith::And)),
                b'|' => traced!(self.emit.arith(Arith::Or)),
                b'<' => traced!(self.emit.arith(Arith::Lt)),
                b'>' => traced!(self.emit.arith(Arith::Gt)),
                b'=' => traced!(self.emit.arith(Arith::Eq)),
                b'*' => traced!(self.emit.call("Math.multiply", 2)),
                b'/' => traced!(self.emit.call("Math.divide", 2)),
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    /// term → INT_CONST | STR_CONST | keywordConstant | varName |
    ///        varName `[` expression `]` | subroutineCall |
    ///        `(` expression `)` | unaryOp term
    fn compile_term(&mut self) -> CompileResult<()> {
        match traced!(self.cur_type()) {
            TokenType::IntConst => {
                let n = traced!(self.toks.int_val());
                traced!(self.emit.push(Segment::Constant, n));
                traced!(self.bump());
            }
            TokenType::StrConst => {
                // A string literal builds a String object at run time, one
                // appendChar per character.
                let s = traced!(self.toks.string_val()).to_owned();
                traced!(self.emit.push(Segment::Constant, s.len() as u16));
                traced!(self.emit.call("String.new", 1));
                for b in s.bytes() {
                    traced!(self.emit.push(Segment::Constant, u16::from(b)));
                    traced!(self.emit.call("String.appendChar", 2));
                }
                traced!(self.bump());
            }
            TokenType::Keyword => {
                match traced!(self.toks.keyword()) {
                    Keyword::True => {
                        traced!(self.emit.push(Segment::Constant, 1));
                        traced!(self.emit.arith(Arith::Neg));
                    }
                    Keyword::False | Keyword::Null => {
                        traced!(self.emit.push(Segment::Constant, 0));
                    }
                    Keyword::This => {
                        traced!(self.emit.push(Segment::Pointer, 0));
                    }
                    _ => {
                        return Err(self
                            .expected("a term: \"true\", \"false\", \"null\", or \"this\"")
                            .frame(crate::here!()))
                    }
                }
                traced!(self.bump());
            }
            TokenType::Symbol => match traced!(self.toks.symbol()) {
                b'(' => {
                    traced!(self.bump());
                    traced!(self.compile_expression());
                    traced!(self.eat_symbol(b')'));
                }
                b'-' => {
                    traced!(self.bump());
                    traced!(self.compile_term());
                    traced!(self.emit.arith(Arith::Neg));
                }
                b'~' => {
                    traced!(self.bump());
                    traced!(self.compile_term());
                    traced!(self.emit.arith(Arith::Not));
                }
                _ => {
                    return Err(self
                        .expected("a term: \"(\", \"-\", or \"~\"")
                        .frame(crate::here!()))
                }
            },
            TokenType::Identifier => {
                // One byte of lookahead tells a subroutine call from an
                // array access from a plain variable read.
                match traced!(self.toks.peek()) {
                    b'(' | b'.' => traced!(self.compile_subroutine_call()),
                    b'[' => traced!(self.compile_array_read()),
                    _ => traced!(self.compile_var_read()),
                }
            }
        }
        Ok(())
    }

    /// A plain variable read: push its cell.
    fn compile_var_read(&mut self) -> CompileResult<()> {
        let name = traced!(self.eat_identifier());
        let entry = self.syms.lookup(&name).map(|e| (e.kind.segment(), e.index));
        match entry {
            Some((seg, index)) => {
                traced!(self.emit.push(seg, index));
                Ok(())
            }
            None => Err(CompileError::new(CompileErrorKind::UnresolvedSymbol(
                name.to_string(),
            ))
            .frame(crate::here!())),
        }
    }

    /// varName `[` expression `]` as a value. THAT is consumed immediately by
    /// the read, so unlike the write side no `temp` save is needed.
    fn compile_array_read(&mut self) -> CompileResult<()> {
        let name = traced!(self.eat_identifier());
        let entry = self.syms.lookup(&name).map(|e| (e.kind.segment(), e.index));
        let (seg, index) = match entry {
            Some(x) => x,
            None => {
                return Err(CompileError::new(CompileErrorKind::UnresolvedSymbol(
                    name.to_string(),
                ))
                .frame(crate::here!()))
            }
        };
        traced!(self.emit.push(seg, index));
        traced!(self.eat_symbol(b'['));
        traced!(self.compile_expression());
        traced!(self.eat_symbol(b']'));
        traced!(self.emit.arith(Arith::Add));
        traced!(self.emit.pop(Segment::Pointer, 1));
        traced!(self.emit.push(Segment::That, 0));
        Ok(())
    }

    /// subroutineCall → IDENT `(` expressionList `)`
    ///                | IDENT `.` IDENT `(` expressionList `)`
    ///
    /// A lone identifier is a method call on `this`. A dotted identifier is
    /// a method call on that variable if it resolves in the symbol table,
    /// otherwise a function (or constructor) call on a class of that name.
    fn compile_subroutine_call(&mut self) -> CompileResult<()> {
        let first = traced!(self.eat_identifier());

        let (target, implicit_args) = if self.at_symbol(b'.') {
            traced!(self.bump());
            let method = traced!(self.eat_identifier());
            let entry = self
                .syms
                .lookup(&first)
                .map(|e| (e.ty.clone(), e.kind.segment(), e.index));
            match entry {
                Some((ty, seg, index)) => {
                    // Method call on a variable: the object is argument 0.
                    traced!(self.emit.push(seg, index));
                    (format!("{}.{}", ty, method), 1)
                }
                None => (format!("{}.{}", first, method), 0),
            }
        } else {
            // Unqualified call: a method on the current object.
            traced!(self.emit.push(Segment::Pointer, 0));
            (format!("{}.{}", self.class_name, first), 1)
        };

        traced!(self.eat_symbol(b'('));
        let n_args = traced!(self.compile_expression_list());
        traced!(self.eat_symbol(b')'));
        traced!(self.emit.call(&target, implicit_args + n_args));
        Ok(())
    }

    /// expressionList → ( expression (`,` expression)* )?. Returns how many
    /// expressions were compiled, with the cursor on the closing `)`.
    fn compile_expression_list(&mut self) -> CompileResult<u16> {
        if self.at_symbol(b')') {
            return Ok(0);
        }
        let mut n = 1;
        traced!(self.compile_expression());
        while self.at_symbol(b',') {
            traced!(self.bump());
            traced!(self.compile_expression());
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(src: &str) -> CompileResult<String> {
        let toks = Tokenizer::new(src.as_bytes().to_vec());
        let mut engine = Engine::new(toks, Emitter::new(Vec::new()));
        engine.run()?;
        let out = engine.finish()?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn compile_ok(src: &str) -> String {
        match compile_str(src) {
            Ok(vm) => vm,
            Err(e) => panic!("compilation failed: {}", e.kind),
        }
    }

    fn compile_err(src: &str) -> CompileErrorKind {
        compile_str(src).unwrap_err().kind
    }

    #[test]
    fn trivial_function() {
        let vm = compile_ok("class A { function void f() { return; } }");
        assert_eq!(vm, "function A.f 0\npush constant 0\nreturn\n");
    }

    #[test]
    fn arithmetic_is_left_to_right() {
        let vm = compile_ok(
            "class A { function int f() { var int x; let x = 1 + 2 * 3; return x; } }",
        );
        assert_eq!(
            vm,
            "function A.f 1\n\
             push constant 1\n\
             push constant 2\n\
             add\n\
             push constant 3\n\
             call Math.multiply 2\n\
             pop local 0\n\
             push local 0\n\
             return\n"
        );
    }

    #[test]
    fn if_else_label_layout() {
        let vm = compile_ok(
            "class A { function void f(int x, int y) { \
                 if (x) { let y = 1; } else { let y = 2; } return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             push argument 0\n\
             not\n\
             if-goto else_A_0\n\
             push constant 1\n\
             pop argument 1\n\
             goto if_else_end_A_0\n\
             label else_A_0\n\
             push constant 2\n\
             pop argument 1\n\
             label if_else_end_A_0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn while_label_layout() {
        let vm = compile_ok(
            "class A { function void f(int x) { while (x) { let x = x; } return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             label while_start_A_0\n\
             push argument 0\n\
             not\n\
             if-goto while_end_A_0\n\
             push argument 0\n\
             pop argument 0\n\
             goto while_start_A_0\n\
             label while_end_A_0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn constructor_prologue() {
        let vm = compile_ok(
            "class P { field int x; field int y; constructor P new() { return this; } }",
        );
        assert_eq!(
            vm,
            "function P.new 0\n\
             push constant 2\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn array_write_saves_target_across_rhs() {
        let vm = compile_ok(
            "class A { function void f() { \
                 var Array a; var int i; var int j; \
                 let a[i] = a[j]; return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 3\n\
             push local 0\n\
             push local 1\n\
             add\n\
             pop pointer 1\n\
             push pointer 1\n\
             pop temp 1\n\
             push local 0\n\
             push local 2\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             push temp 1\n\
             pop pointer 1\n\
             pop that 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn method_call_on_variable_vs_function_call() {
        let vm = compile_ok(
            "class A { function void f(int x) { \
                 var Point p; var int q; var int r; \
                 let p = Point.new(); \
                 let q = p.get(); \
                 let r = Math.abs(x); \
                 return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 3\n\
             call Point.new 0\n\
             pop local 0\n\
             push local 0\n\
             call Point.get 1\n\
             pop local 1\n\
             push argument 0\n\
             call Math.abs 1\n\
             pop local 2\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn method_prologue_and_unqualified_call() {
        let vm = compile_ok(
            "class A { field int x; method void bump() { do draw(); return; } }",
        );
        assert_eq!(
            vm,
            "function A.bump 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push pointer 0\n\
             call A.draw 1\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn fields_live_in_the_this_segment() {
        let vm = compile_ok("class A { field int x; method int get() { return x; } }");
        assert_eq!(
            vm,
            "function A.get 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push this 0\n\
             return\n"
        );
    }

    #[test]
    fn parameter_shadows_field_and_follows_receiver() {
        // In a method, user parameters start at argument 1; argument 0 is
        // the receiver.
        let vm = compile_ok("class A { field int x; method int pick(int x) { return x; } }");
        assert_eq!(
            vm,
            "function A.pick 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push argument 1\n\
             return\n"
        );
    }

    #[test]
    fn statics_live_in_the_static_segment() {
        let vm = compile_ok(
            "class C { static int s; function void f() { let s = 7; return; } }",
        );
        assert_eq!(
            vm,
            "function C.f 0\n\
             push constant 7\n\
             pop static 0\n\
             return\n"
        );
    }

    #[test]
    fn string_literal_builds_a_string_object() {
        let vm = compile_ok(
            "class A { function void f() { do Output.printString(\"Hi\"); return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             push constant 2\n\
             call String.new 1\n\
             push constant 72\n\
             call String.appendChar 2\n\
             push constant 105\n\
             call String.appendChar 2\n\
             call Output.printString 1\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn keyword_constants() {
        let vm = compile_ok(
            "class A { function boolean f() { \
                 var boolean b; let b = true; let b = false; return ~b; } }",
        );
        assert_eq!(
            vm,
            "function A.f 1\n\
             push constant 1\n\
             neg\n\
             pop local 0\n\
             push constant 0\n\
             pop local 0\n\
             push local 0\n\
             not\n\
             return\n"
        );
    }

    #[test]
    fn unary_minus_and_grouping() {
        let vm = compile_ok(
            "class A { function int f() { var int n; let n = -5 + 2 * (3 + 4); return n; } }",
        );
        assert_eq!(
            vm,
            "function A.f 1\n\
             push constant 5\n\
             neg\n\
             push constant 2\n\
             add\n\
             push constant 3\n\
             push constant 4\n\
             add\n\
             call Math.multiply 2\n\
             pop local 0\n\
             push local 0\n\
             return\n"
        );
    }

    #[test]
    fn comparisons_and_logic() {
        let vm = compile_ok(
            "class A { function boolean f() { return (1 < 2) & (3 > 2) | (1 = 1); } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             push constant 1\n\
             push constant 2\n\
             lt\n\
             push constant 3\n\
             push constant 2\n\
             gt\n\
             and\n\
             push constant 1\n\
             push constant 1\n\
             eq\n\
             or\n\
             return\n"
        );
    }

    #[test]
    fn array_read() {
        let vm = compile_ok(
            "class A { function int f() { var Array a; var int x; let x = a[3]; return x; } }",
        );
        assert_eq!(
            vm,
            "function A.f 2\n\
             push local 0\n\
             push constant 3\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             pop local 1\n\
             push local 1\n\
             return\n"
        );
    }

    #[test]
    fn do_call_with_arguments_discards_value() {
        let vm = compile_ok(
            "class A { method void go() { do step(1, 2); return; } }",
        );
        assert_eq!(
            vm,
            "function A.go 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push pointer 0\n\
             push constant 1\n\
             push constant 2\n\
             call A.step 3\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn label_ids_are_unique_within_a_class() {
        let vm = compile_ok(
            "class A { function void f(int x) { \
                 if (x) { } \
                 if (x) { } else { } \
                 while (x) { while (x) { } } \
                 return; } }",
        );
        for label in &[
            "if-goto else_A_0",
            "label if_else_end_A_0",
            "if-goto else_A_1",
            "label if_else_end_A_1",
            "label while_start_A_0",
            "label while_end_A_0",
            "label while_start_A_1",
            "label while_end_A_1",
        ] {
            assert!(vm.contains(label), "missing {} in:\n{}", label, vm);
        }
        // No label is defined twice.
        let mut labels: Vec<&str> = vm
            .lines()
            .filter(|l| l.starts_with("label "))
            .collect();
        let total = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }

    #[test]
    fn multi_declarations_share_a_type() {
        let vm = compile_ok(
            "class A { static int a, b; function void f() { \
                 var int x, y, z; let b = 1; let z = 2; return; } }",
        );
        assert_eq!(
            vm,
            "function A.f 3\n\
             push constant 1\n\
             pop static 1\n\
             push constant 2\n\
             pop local 2\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn unresolved_let_target() {
        let err = compile_err("class A { function void f() { let y = 1; return; } }");
        assert!(matches!(err, CompileErrorKind::UnresolvedSymbol(ref n) if n == "y"));
    }

    #[test]
    fn unresolved_variable_in_expression() {
        let err = compile_err(
            "class A { function int f() { var int x; let x = ghost; return x; } }",
        );
        assert!(matches!(err, CompileErrorKind::UnresolvedSymbol(ref n) if n == "ghost"));
    }

    #[test]
    fn array_write_to_non_array() {
        let err = compile_err(
            "class A { function void f() { var int x; let x[0] = 1; return; } }",
        );
        assert!(matches!(err, CompileErrorKind::NotAnArray { ref name, ref ty } if name == "x" && ty == "int"));
    }

    #[test]
    fn redefined_local() {
        let err = compile_err(
            "class A { function void f() { var int x; var boolean x; return; } }",
        );
        assert!(matches!(err, CompileErrorKind::Redefinition(ref n) if n == "x"));
    }

    #[test]
    fn redefined_parameter() {
        let err = compile_err("class A { function void f(int a, int a) { return; } }");
        assert!(matches!(err, CompileErrorKind::Redefinition(ref n) if n == "a"));
    }

    #[test]
    fn trailing_comma_in_parameter_list() {
        let err = compile_err("class A { function void f(int a,) { return; } }");
        assert!(matches!(err, CompileErrorKind::Expected(_)));
    }

    #[test]
    fn missing_semicolon() {
        let err = compile_err("class A { function void f() { let x = 1 } }");
        // `x` is undeclared, so resolution fails before the missing `;` is
        // noticed; declare it to reach the real check.
        assert!(matches!(err, CompileErrorKind::UnresolvedSymbol(_)));
        let err = compile_err("class A { function void f() { var int x; let x = 1 } }");
        assert!(matches!(err, CompileErrorKind::Expected(_)));
    }

    #[test]
    fn trailing_content_after_class_is_rejected() {
        let err = compile_err("class A { } class B { }");
        assert!(matches!(err, CompileErrorKind::Expected(ref what) if what.contains("end of input")));
    }

    #[test]
    fn trailing_trivia_after_class_is_fine() {
        let vm = compile_ok("class A { }  // all done\n");
        assert_eq!(vm, "");
    }

    #[test]
    fn unterminated_comment_in_body() {
        let err = compile_err("class A { function void f() { /* oops");
        assert!(matches!(err, CompileErrorKind::UnterminatedComment));
    }

    #[test]
    fn unterminated_comment_after_class_is_still_an_error() {
        let err = compile_err("class A { } /* never closes");
        assert!(matches!(err, CompileErrorKind::UnterminatedComment));
    }

    #[test]
    fn non_constant_keyword_in_term() {
        let err = compile_err(
            "class A { function int f() { var int x; let x = class; return x; } }",
        );
        assert!(matches!(err, CompileErrorKind::Expected(_)));
    }

    #[test]
    fn errors_carry_a_trace_and_context() {
        let toks = Tokenizer::new(
            b"class A { function void f() { let y = 1; return; } }".to_vec(),
        );
        let mut engine = Engine::new(toks, Emitter::new(Vec::new()));
        let err = engine.run().unwrap_err();
        assert!(!err.trace.is_empty());
        assert_eq!(engine.context(), "A function f");
    }

    #[test]
    fn same_input_same_output() {
        let src = "class A { function int f() { var int x; let x = 1 + 2; return x; } }";
        assert_eq!(compile_ok(src), compile_ok(src));
    }
}
