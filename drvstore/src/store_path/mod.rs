use crate::nixbase32::{self, Nixbase32DecodeError};
use data_encoding::BASE64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{cmp::Ordering, collections::BTreeSet, fmt, str::FromStr};

mod directory;
mod utils;

pub use directory::{StoreDirectory, DEFAULT_STORE_DIR, STORE_DIR_ENV};
pub use utils::*;

pub const DIGEST_SIZE: usize = 20;
pub const ENCODED_DIGEST_SIZE: usize = nixbase32::encode_len(DIGEST_SIZE);

/// Errors that can occur when parsing a literal store path
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Dash is missing between hash and name")]
    MissingDash(),
    #[error("Hash encoding is invalid: {0}")]
    InvalidHashEncoding(Nixbase32DecodeError),
    #[error("Invalid length")]
    InvalidLength(),
    #[error(
        "Invalid name: \"{}\", character at position {} is invalid",
        std::str::from_utf8(.0).unwrap_or(&BASE64.encode(.0)),
        .1,
    )]
    InvalidName(Vec<u8>, usize),
    #[error("Tried to parse a path which was missing the store dir prefix.")]
    MissingStoreDir(),
    #[error("invalid store directory {0:?}")]
    InvalidStoreDir(String),
    #[error("unexpected store directory {got} (using {expected})")]
    UnexpectedStoreDir {
        expected: StoreDirectory,
        got: StoreDirectory,
    },
}

/// Represents a path in a store (a direct child of a [StoreDirectory]).
///
/// It consists of the directory, a digest (20 bytes), and a name, which is a
/// string.
/// The name may only contain ASCII alphanumeric, or one of the following
/// characters: `-`, `_`, `.`, `+`, `?`, `=`.
/// The name is usually used to describe the pname and version of a package.
/// Derivation paths are also store paths, their names just end with the
/// [crate::derivation::DERIVATION_EXT] suffix.
///
/// A [StorePath] does not encode any additional subpath "inside" the store
/// path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorePath {
    dir: StoreDirectory,
    digest: [u8; DIGEST_SIZE],
    name: String,
}

/// Store paths are ordered like their absolute path strings, as long as they
/// share a directory.
impl Ord for StorePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dir
            .cmp(&other.dir)
            .then_with(|| {
                if self.digest == other.digest {
                    Ordering::Equal
                } else {
                    nixbase32::encode(&self.digest).cmp(&nixbase32::encode(&other.digest))
                }
            })
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for StorePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for StorePath {
    type Err = Error;

    /// Construct a [StorePath] from its absolute path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_absolute_path(s)
    }
}

impl StorePath {
    /// Construct a [StorePath] from an absolute path, like
    /// `/nix/store/$digest-$name`.
    /// The directory is everything before the last slash.
    pub fn from_absolute_path(s: &str) -> Result<StorePath, Error> {
        let (dir, base) = s.rsplit_once('/').ok_or(Error::MissingStoreDir())?;
        if dir.is_empty() {
            return Err(Error::MissingStoreDir());
        }
        let dir = StoreDirectory::new(dir)?;
        Self::from_bytes(dir, base.as_bytes())
    }

    /// Construct a [StorePath] by passing the `$digest-$name` string
    /// that comes after the store directory.
    pub fn from_bytes(dir: StoreDirectory, s: &[u8]) -> Result<StorePath, Error> {
        // the whole string needs to be at least:
        //
        // - 32 characters (encoded hash)
        // - 1 dash
        // - 1 character for the name
        if s.len() < ENCODED_DIGEST_SIZE + 2 {
            Err(Error::InvalidLength())?
        }

        let digest = nixbase32::decode_fixed(&s[..ENCODED_DIGEST_SIZE])
            .map_err(Error::InvalidHashEncoding)?;

        if s[ENCODED_DIGEST_SIZE] != b'-' {
            return Err(Error::MissingDash());
        }

        Ok(StorePath {
            dir,
            digest,
            name: validate_name(&s[ENCODED_DIGEST_SIZE + 1..])?,
        })
    }

    /// Construct a [StorePath] from a name and digest.
    pub fn from_name_and_digest(
        dir: StoreDirectory,
        name: &str,
        digest: [u8; DIGEST_SIZE],
    ) -> Result<StorePath, Error> {
        Ok(Self {
            dir,
            digest,
            name: validate_name(name.as_bytes())?,
        })
    }

    pub fn dir(&self) -> &StoreDirectory {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the nixbase32-encoded digest.
    pub fn digest(&self) -> String {
        nixbase32::encode(&self.digest)
    }

    pub fn digest_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }

    /// If the path names a derivation, returns the derivation's name, which
    /// is the name without the `.drv` suffix.
    pub fn derivation_name(&self) -> Option<&str> {
        self.name
            .strip_suffix(crate::derivation::DERIVATION_EXT)
            .filter(|name| !name.is_empty())
    }

    /// Returns the absolute path, like `/nix/store/$digest-$name`.
    pub fn to_absolute_path(&self) -> String {
        self.to_string()
    }
}

/// Checks a given &[u8] to match the restrictions for store path names, and
/// returns the name as string if successful.
pub(crate) fn validate_name(s: &[u8]) -> Result<String, Error> {
    // Empty names are not allowed.
    if s.is_empty() {
        return Err(Error::InvalidLength());
    }

    for (i, c) in s.iter().enumerate() {
        if c.is_ascii_alphanumeric()
            || (*c == b'.' && i != 0) // can't start with a dot
            || *c == b'-'
            || *c == b'_'
            || *c == b'+'
            || *c == b'?'
            || *c == b'='
        {
            continue;
        }

        return Err(Error::InvalidName(s.to_vec(), i));
    }

    // only ASCII was accepted above
    Ok(s.iter().map(|&c| c as char).collect())
}

impl fmt::Display for StorePath {
    /// The string representation of a store path is the store directory,
    /// a slash, the digest (20 bytes) [crate::nixbase32]-encoded, a `-`,
    /// and the name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-{}",
            self.dir,
            nixbase32::encode(&self.digest),
            self.name
        )
    }
}

impl Serialize for StorePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StorePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StorePath::from_absolute_path(&s).map_err(|e| {
            serde::de::Error::invalid_value(serde::de::Unexpected::Str(&s), &e.to_string().as_str())
        })
    }
}

/// The set of other store paths a store object depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct References {
    /// Whether the store object refers to itself.
    pub self_reference: bool,
    pub others: BTreeSet<StorePath>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        !self.self_reference && self.others.is_empty()
    }
}
