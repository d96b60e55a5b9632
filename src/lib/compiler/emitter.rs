// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! A thin write-through layer producing the textual VM commands. One
//! newline-terminated command per call, in exactly the order called; the
//! output is a pure function of the call sequence. The only errors that can
//! arise here are IO errors from the sink.

use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::compiler::error::CompileResult;

/// The named regions of a VM stack frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The VM's arithmetic and logic commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl Arith {
    pub fn as_str(self) -> &'static str {
        match self {
            Arith::Add => "add",
            Arith::Sub => "sub",
            Arith::Neg => "neg",
            Arith::Eq => "eq",
            Arith::Gt => "gt",
            Arith::Lt => "lt",
            Arith::And => "and",
            Arith::Or => "or",
            Arith::Not => "not",
        }
    }
}

impl fmt::Display for Arith {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Emitter<W: Write> {
    out: W,
}

impl Emitter<BufWriter<File>> {
    /// An emitter owning the output file at `path`. Buffered writes are
    /// flushed on drop; call [`Emitter::finish`] to surface the final flush
    /// error instead of losing it.
    pub fn to_file(path: &Path) -> CompileResult<Self> {
        Ok(Emitter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Emitter { out }
    }

    pub fn push(&mut self, seg: Segment, index: u16) -> CompileResult<()> {
        Ok(writeln!(self.out, "push {} {}", seg, index)?)
    }

    pub fn pop(&mut self, seg: Segment, index: u16) -> CompileResult<()> {
        Ok(writeln!(self.out, "pop {} {}", seg, index)?)
    }

    pub fn arith(&mut self, op: Arith) -> CompileResult<()> {
        Ok(writeln!(self.out, "{}", op)?)
    }

    pub fn label(&mut self, name: &str) -> CompileResult<()> {
        Ok(writeln!(self.out, "label {}", name)?)
    }

    pub fn goto(&mut self, name: &str) -> CompileResult<()> {
        Ok(writeln!(self.out, "goto {}", name)?)
    }

    pub fn if_goto(&mut self, name: &str) -> CompileResult<()> {
        Ok(writeln!(self.out, "if-goto {}", name)?)
    }

    pub fn function(&mut self, qualified_name: &str, n_locals: u16) -> CompileResult<()> {
        Ok(writeln!(self.out, "function {} {}", qualified_name, n_locals)?)
    }

    pub fn call(&mut self, qualified_name: &str, n_args: u16) -> CompileResult<()> {
        Ok(writeln!(self.out, "call {} {}", qualified_name, n_args)?)
    }

    pub fn ret(&mut self) -> CompileResult<()> {
        Ok(writeln!(self.out, "return")?)
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> CompileResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_surface() {
        let mut emit = Emitter::new(Vec::new());
        emit.push(Segment::Constant, 7).unwrap();
        emit.pop(Segment::That, 0).unwrap();
        emit.arith(Arith::Add).unwrap();
        emit.arith(Arith::Not).unwrap();
        emit.label("while_start_Main_0").unwrap();
        emit.goto("while_start_Main_0").unwrap();
        emit.if_goto("while_end_Main_0").unwrap();
        emit.function("Main.main", 2).unwrap();
        emit.call("Math.multiply", 2).unwrap();
        emit.ret().unwrap();
        let out = String::from_utf8(emit.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "push constant 7\n\
             pop that 0\n\
             add\n\
             not\n\
             label while_start_Main_0\n\
             goto while_start_Main_0\n\
             if-goto while_end_Main_0\n\
             function Main.main 2\n\
             call Math.multiply 2\n\
             return\n"
        );
    }

    #[test]
    fn segment_names() {
        let segs = [
            Segment::Constant,
            Segment::Argument,
            Segment::Local,
            Segment::Static,
            Segment::This,
            Segment::That,
            Segment::Pointer,
            Segment::Temp,
        ];
        let names = [
            "constant", "argument", "local", "static", "this", "that", "pointer", "temp",
        ];
        for (seg, name) in segs.iter().zip(names.iter()) {
            assert_eq!(seg.as_str(), *name);
        }
    }
}
