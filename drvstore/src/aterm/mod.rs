//! Building blocks of the [ATerm][] format, which is used to serialize
//! Derivations.
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html
mod escape;
mod parser;
mod scanner;

pub use escape::escape_bytes;
pub(crate) use parser::parse_string_field;
pub use scanner::{Error, Scanner, Token, TokenKind, TokenSource};
