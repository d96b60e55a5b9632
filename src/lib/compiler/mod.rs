//! A single-pass Jack compiler. The [`engine`] pulls tokens from the
//! [`tokenizer`], records declarations in [`symbols`], and streams VM
//! commands through the [`emitter`]; there is no intermediate representation
//! between the source text and the VM output.

use std::path::{Path, PathBuf};

pub mod emitter;
pub mod engine;
pub mod error;
pub mod symbols;
pub mod tokenizer;

use self::emitter::Emitter;
use self::engine::Engine;
use self::error::CompileResult;
use self::tokenizer::Tokenizer;

/// Compile one `.jack` file into its sibling `.vm` file, returning the
/// output path. The first error aborts compilation of the file; partial
/// output may be left on disk.
pub fn compile_file(path: &Path) -> CompileResult<PathBuf> {
    let toks = Tokenizer::from_path(path)?;
    let out_path = path.with_extension("vm");
    let emit = Emitter::to_file(&out_path)?;
    let mut engine = Engine::new(toks, emit);
    if let Err(e) = engine.run() {
        return Err(e.with_context(engine.context()));
    }
    engine.finish()?;
    Ok(out_path)
}
