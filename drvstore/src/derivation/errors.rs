//! Contains the error types of the [crate::derivation] module.
use std::fmt;

use thiserror::Error;

use crate::aterm;
use crate::nixhash::{self, HashAlgo};
use crate::store_path::{self, BuildStorePathError, StoreDirectory};

/// The operation a [DerivationError] happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Marshal,
    Export,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Marshal => f.write_str("marshal"),
            Operation::Export => f.write_str("export"),
        }
    }
}

/// Errors that can occur when marshaling or exporting a
/// [crate::derivation::Derivation].
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("{0} derivation: missing name")]
    MissingName(Operation),
    #[error("marshal {name} derivation: invalid output name {output:?}")]
    InvalidOutputName { name: String, output: String },
    #[error("marshal {name} derivation: {source}")]
    OutputPath {
        name: String,
        source: OutputPathError,
    },
    #[error("marshal {name} derivation: inputs: unexpected store directory {got} (using {expected})")]
    UnexpectedStoreDir {
        name: String,
        expected: StoreDirectory,
        got: StoreDirectory,
    },
    #[error("marshal {name} derivation: {source}")]
    Write {
        name: String,
        source: std::io::Error,
    },
    #[error("export derivation {name}: unsupported hash algorithm {algo}")]
    UnsupportedHashAlgo { name: String, algo: HashAlgo },
    #[error("export derivation {name}: {source}")]
    Archive {
        name: String,
        source: std::io::Error,
    },
    #[error("export derivation {name}: {source}")]
    StorePath {
        name: String,
        source: BuildStorePathError,
    },
}

/// Errors returned when asking for the path of a derivation output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputPathError {
    #[error("output path for {0}: no such output")]
    NoSuchOutput(String),
    #[error("output path for {0}: non-fixed output type")]
    NotFixed(String),
    #[error("output path for {0}: {1}")]
    BuildStorePath(String, BuildStorePathError),
}

/// The part of a derivation a [ParseError] occured in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// The surrounding `Derive(…)` tuple.
    Tuple,
    Outputs,
    InputDerivations,
    InputSources,
    System,
    Builder,
    Args,
    Env,
}

impl Field {
    fn prefix(&self) -> &'static str {
        match self {
            Field::Tuple => "",
            Field::Outputs => "outputs: ",
            Field::InputDerivations => "input derivations: ",
            Field::InputSources => "input sources: ",
            Field::System => "system: ",
            Field::Builder => "builder: ",
            Field::Args => "builder args: ",
            Field::Env => "env: ",
        }
    }
}

/// Errors that can occur while parsing a derivation from ATerm.
#[derive(Debug, Error, PartialEq)]
#[error("parse {name} derivation: {}{kind}", .field.prefix())]
pub struct ParseError {
    /// The name of the derivation being parsed.
    pub name: String,
    pub field: Field,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseErrorKind {
    #[error("'Derive' constructor not found")]
    MissingConstructor,
    #[error("trailing data")]
    TrailingData,
    #[error(transparent)]
    Token(#[from] aterm::Error),
    #[error("invalid output name {0:?}")]
    InvalidOutputName(String),
    #[error("multiple outputs named {0:?}")]
    DuplicateOutput(String),
    #[error("{output} output: hash algorithm: {source}")]
    HashAlgo {
        output: String,
        source: nixhash::Error,
    },
    #[error("{output} output: hash: {source}")]
    Hash {
        output: String,
        source: nixhash::Error,
    },
    #[error("{0} output: unknown type")]
    UnknownOutputType(String),
    #[error("{path}: {source}")]
    StorePath {
        path: String,
        source: store_path::Error,
    },
    #[error("multiple input derivations for {0}")]
    DuplicateInputDerivation(store_path::StorePath),
    #[error("multiple entries for {0}")]
    DuplicateEnv(String),
}

/// Errors that can occur when parsing an
/// [crate::derivation::OutputReference] from its string form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputReferenceError {
    #[error("parse output reference {0:?}: missing '!' separator")]
    MissingSeparator(String),
    #[error("parse output reference {reference:?}: invalid output name {output:?}")]
    InvalidOutputName { reference: String, output: String },
    #[error("parse output reference {reference:?}: {source}")]
    InvalidPath {
        reference: String,
        source: store_path::Error,
    },
    #[error("parse output reference {0:?}: not a derivation")]
    NotDerivation(String),
}
