//! Minimal support for the Nix archive format (NAR), enough to wrap a single
//! regular file, as done when exporting a serialized derivation.
mod hashing_writer;
pub(crate) mod wire;
pub mod writer;

pub use hashing_writer::HashingWriter;
