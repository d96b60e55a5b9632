//! A compiler for [Jack](https://www.nand2tetris.org/), a small statically
//! typed class-based object-oriented language, targeting the textual assembly
//! language of the Hack stack VM. jackal is a strict single-pass compiler:
//! there is no syntax tree, so parsing, name resolution, and code generation
//! are interleaved in one forward walk over the token stream. Each input
//! `.jack` file (one class per file) produces one `.vm` file; executing that
//! file on a conforming VM interpreter reproduces the semantics of the source
//! program.

#![allow(clippy::cognitive_complexity)]

pub mod compiler;
