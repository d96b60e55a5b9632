use std::{
    fmt,
    io::{self, stderr},
    path::Path,
};

use itertools::Itertools;
use termion::{is_tty, style};

use crate::compiler::tokenizer::TokenType;

/// Records the `file:line` of the expansion site as a `&'static str`. Used to
/// stamp a frame onto a [`CompileError`] at every propagation boundary.
#[macro_export]
macro_rules! here {
    () => {
        concat!(file!(), ":", line!())
    };
}

pub type CompileResult<T> = Result<T, Box<CompileError>>;

#[derive(Debug)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    /// Propagation sites, innermost first, each the `file:line` of a
    /// [`here!`] expansion.
    pub trace: Vec<&'static str>,
    /// The grammar context the engine was in ("ClassName kind subName"),
    /// attached once compilation of a file has failed for good.
    pub context: Option<String>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind) -> Box<Self> {
        Box::new(CompileError {
            kind,
            trace: Vec::new(),
            context: None,
        })
    }

    /// Append a propagation frame and pass the error along.
    pub fn frame(mut self: Box<Self>, loc: &'static str) -> Box<Self> {
        self.trace.push(loc);
        self
    }

    pub fn with_context(mut self: Box<Self>, context: String) -> Box<Self> {
        self.context = Some(context);
        self
    }

    /// Print the single user-visible diagnostic for this error to stderr.
    pub fn console_print(&self, path: &Path) {
        eprintln!("File {}:", path.display());
        if let Some(ctx) = &self.context {
            eprintln!("Compilation error in {}", ctx);
        }
        if is_tty(&stderr()) {
            eprintln!("{}{}.{}", style::Bold, self.kind, style::Reset);
        } else {
            eprintln!("{}.", self.kind);
        }
        if !self.trace.is_empty() {
            eprintln!(
                "Trace (innermost first):\n{}",
                self.trace
                    .iter()
                    .map(|loc| format!("  [error] at {}", loc))
                    .join("\n")
            );
        }
    }
}

impl From<io::Error> for Box<CompileError> {
    fn from(err: io::Error) -> Box<CompileError> {
        CompileError::new(CompileErrorKind::Io(err))
    }
}

#[derive(Debug)]
pub enum CompileErrorKind {
    /// An integer constant outside 0..=32767.
    IntOutOfRange(String),
    /// A string constant still open at end of input.
    UnterminatedString,
    /// A newline inside a string constant.
    StringContainsNewline,
    /// An empty string constant.
    EmptyString,
    /// A `/*` with no matching `*/` before end of input.
    UnterminatedComment,
    /// A byte that cannot start any token.
    IllegalChar(char),
    /// A typed token accessor was called while a different kind of token was
    /// current.
    InvalidAccess {
        expected: TokenType,
        found: TokenType,
        value: String,
    },
    /// The grammar demanded something the input does not provide.
    Expected(String),
    /// The token stream ended while a production still needed input.
    RanOutOfTokens,
    /// `define` was called with a name already present in the target scope.
    Redefinition(String),
    /// A name was used where the symbol table has no entry for it.
    UnresolvedSymbol(String),
    /// `let name[...]` where `name` is not of type `Array`.
    NotAnArray { name: String, ty: String },
    Io(io::Error),
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileErrorKind::IntOutOfRange(lexeme) => write!(
                f,
                "Integer constants must be a decimal number in the range 0..32767 (got {})",
                lexeme
            ),
            CompileErrorKind::UnterminatedString => {
                write!(f, "Hit end of input before string constant terminated")
            }
            CompileErrorKind::StringContainsNewline => {
                write!(f, "String constants cannot contain newline characters")
            }
            CompileErrorKind::EmptyString => {
                write!(f, "Empty string constants are not supported")
            }
            CompileErrorKind::UnterminatedComment => write!(
                f,
                "Found block comment opener \"/*\" without a matching \"*/\""
            ),
            CompileErrorKind::IllegalChar(c) => {
                write!(f, "Encountered invalid character {:?}", c)
            }
            CompileErrorKind::InvalidAccess {
                expected,
                found,
                value,
            } => write!(
                f,
                "Expected a token of type `{}` but found \"{}\" of type `{}`",
                expected, value, found
            ),
            CompileErrorKind::Expected(what) => write!(f, "Expected {}", what),
            CompileErrorKind::RanOutOfTokens => write!(f, "Ran out of tokens"),
            CompileErrorKind::Redefinition(name) => {
                write!(f, "Attempted redefinition of symbol '{}'", name)
            }
            CompileErrorKind::UnresolvedSymbol(name) => {
                write!(f, "Identifier '{}' was not found in any scope", name)
            }
            CompileErrorKind::NotAnArray { name, ty } => write!(
                f,
                "'{}' has type {} but is indexed like an Array",
                name, ty
            ),
            CompileErrorKind::Io(err) => write!(f, "{}", err),
        }
    }
}
