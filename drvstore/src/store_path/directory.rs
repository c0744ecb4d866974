use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Error, StorePath};

/// The store dir used if nothing else is configured.
pub const DEFAULT_STORE_DIR: &str = "/nix/store";

/// The environment variable consulted by [StoreDirectory::from_env].
pub const STORE_DIR_ENV: &str = "NIX_STORE_DIR";

/// The directory a store lives in, like `/nix/store`.
///
/// It's an absolute path, without trailing slash. Every [StorePath] carries
/// the directory it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreDirectory(String);

impl StoreDirectory {
    pub fn new(dir: impl Into<String>) -> Result<Self, Error> {
        let dir = dir.into();
        if !dir.starts_with('/') || dir.ends_with('/') || dir.contains('\0') {
            return Err(Error::InvalidStoreDir(dir));
        }
        Ok(Self(dir))
    }

    /// Reads the store directory from `NIX_STORE_DIR`, or returns the default
    /// if it is unset.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(STORE_DIR_ENV) {
            Ok(dir) => Self::new(dir),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(std::env::VarError::NotUnicode(dir)) => {
                Err(Error::InvalidStoreDir(dir.to_string_lossy().into_owned()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses an absolute store path, and ensures it lives in this directory.
    pub fn parse_path(&self, s: &str) -> Result<StorePath, Error> {
        let path = StorePath::from_absolute_path(s)?;
        if path.dir() != self {
            return Err(Error::UnexpectedStoreDir {
                expected: self.clone(),
                got: path.dir().clone(),
            });
        }
        Ok(path)
    }
}

impl Default for StoreDirectory {
    fn default() -> Self {
        Self(DEFAULT_STORE_DIR.to_string())
    }
}

impl fmt::Display for StoreDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoreDirectory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for StoreDirectory {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for StoreDirectory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StoreDirectory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
