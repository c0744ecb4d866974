use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

mod algos;
mod ca_hash;

pub use algos::HashAlgo;
pub use ca_hash::{format_ca_tag, parse_ca_tag, CAHash, IngestionMethod};

/// NixHash represents a digest together with the algorithm that produced it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum NixHash {
    Md5([u8; 16]),
    Sha1([u8; 20]),
    Sha256([u8; 32]),
    Sha512(Box<[u8; 64]>),
}

/// convenience Result type for all nixhash parsing Results.
pub type Result<V> = std::result::Result<V, Error>;

impl NixHash {
    /// returns the algo as [HashAlgo].
    pub fn algo(&self) -> HashAlgo {
        match self {
            NixHash::Md5(_) => HashAlgo::Md5,
            NixHash::Sha1(_) => HashAlgo::Sha1,
            NixHash::Sha256(_) => HashAlgo::Sha256,
            NixHash::Sha512(_) => HashAlgo::Sha512,
        }
    }

    /// returns the digest as variable-length byte slice.
    pub fn digest_as_bytes(&self) -> &[u8] {
        match self {
            NixHash::Md5(digest) => digest,
            NixHash::Sha1(digest) => digest,
            NixHash::Sha256(digest) => digest,
            NixHash::Sha512(digest) => digest.as_ref(),
        }
    }

    /// Formats a [NixHash] as the algo, followed by a colon, then the lower
    /// hex encoded digest. This is the form used in store path fingerprints.
    pub fn to_nix_hex_string(&self) -> String {
        format!("{}:{}", self.algo(), self.to_plain_hex_string())
    }

    /// Returns the digest as a hex string -- without any algorithm prefix.
    pub fn to_plain_hex_string(&self) -> String {
        HEXLOWER.encode(self.digest_as_bytes())
    }

    /// Hashes the given data with SHA-256.
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        NixHash::Sha256(Sha256::digest(data).into())
    }
}

/// Constructs a new [NixHash] by specifying [HashAlgo] and digest.
/// It can fail if the passed digest length doesn't match what's expected for
/// the passed algo.
pub fn from_algo_and_digest(algo: HashAlgo, digest: &[u8]) -> Result<NixHash> {
    let invalid_length = || Error::InvalidDigestLength {
        algo,
        got: digest.len(),
    };

    Ok(match algo {
        HashAlgo::Md5 => NixHash::Md5(digest.try_into().map_err(|_| invalid_length())?),
        HashAlgo::Sha1 => NixHash::Sha1(digest.try_into().map_err(|_| invalid_length())?),
        HashAlgo::Sha256 => NixHash::Sha256(digest.try_into().map_err(|_| invalid_length())?),
        HashAlgo::Sha512 => {
            NixHash::Sha512(Box::new(digest.try_into().map_err(|_| invalid_length())?))
        }
    })
}

/// Errors related to NixHash construction.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid hash algo: {0:?}")]
    InvalidAlgo(String),
    #[error("incorrect size (got {got} bytes but {algo} uses {})", .algo.digest_length())]
    InvalidDigestLength { algo: HashAlgo, got: usize },
    #[error("invalid base16 encoding: {0}")]
    InvalidBase16Encoding(data_encoding::DecodeError),
    #[error("text content addresses must use sha256, not {0}")]
    InvalidTextAlgo(HashAlgo),
}
