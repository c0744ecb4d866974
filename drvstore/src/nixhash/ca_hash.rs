use std::borrow::Cow;

use crate::nixhash::{self, HashAlgo, NixHash};

/// How content is turned into bytes before hashing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IngestionMethod {
    /// A single regular file, hashed directly.
    Flat,
    /// A whole filesystem subtree, hashed as a NAR.
    Recursive,
    /// Opaque text, as used for serialized derivations.
    Text,
}

impl IngestionMethod {
    /// The prefix used in front of the hash algorithm in output tags.
    pub const fn prefix(&self) -> &'static str {
        match self {
            IngestionMethod::Flat => "",
            IngestionMethod::Recursive => "r:",
            IngestionMethod::Text => "text:",
        }
    }
}

/// A CAHash describes a content-addressed hash of a path.
///
/// There's essentially three modes, `Flat`, `Nar` and `Text`.
/// `Flat` and `Nar` support all 4 algos that [NixHash] supports
/// (sha1, md5, sha256, sha512), `Text` only supports sha256.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CAHash {
    Flat(NixHash),  // "fixed flat"
    Nar(NixHash),   // "fixed recursive"
    Text([u8; 32]), // "text", only supports sha256
}

impl CAHash {
    /// Constructs a [CAHash] from an ingestion method and a hash.
    /// Fails for text content addresses not using sha256.
    pub fn new(method: IngestionMethod, hash: NixHash) -> nixhash::Result<Self> {
        Ok(match method {
            IngestionMethod::Flat => CAHash::Flat(hash),
            IngestionMethod::Recursive => CAHash::Nar(hash),
            IngestionMethod::Text => match hash {
                NixHash::Sha256(digest) => CAHash::Text(digest),
                other => return Err(nixhash::Error::InvalidTextAlgo(other.algo())),
            },
        })
    }

    pub fn hash(&self) -> Cow<'_, NixHash> {
        match *self {
            CAHash::Flat(ref digest) => Cow::Borrowed(digest),
            CAHash::Nar(ref digest) => Cow::Borrowed(digest),
            CAHash::Text(digest) => Cow::Owned(NixHash::Sha256(digest)),
        }
    }

    pub fn method(&self) -> IngestionMethod {
        match self {
            CAHash::Flat(_) => IngestionMethod::Flat,
            CAHash::Nar(_) => IngestionMethod::Recursive,
            CAHash::Text(_) => IngestionMethod::Text,
        }
    }
}

/// Parses the hash algorithm tag of a derivation output, which is a hash
/// algorithm name optionally prefixed by `r:` (recursive) or `text:`.
pub fn parse_ca_tag(s: &str) -> nixhash::Result<(IngestionMethod, HashAlgo)> {
    let (method, algo) = if let Some(rest) = s.strip_prefix("r:") {
        (IngestionMethod::Recursive, rest)
    } else if let Some(rest) = s.strip_prefix("text:") {
        (IngestionMethod::Text, rest)
    } else {
        (IngestionMethod::Flat, s)
    };

    Ok((method, HashAlgo::try_from(algo)?))
}

/// The inverse of [parse_ca_tag].
pub fn format_ca_tag(method: IngestionMethod, algo: HashAlgo) -> String {
    format!("{}{}", method.prefix(), algo)
}
