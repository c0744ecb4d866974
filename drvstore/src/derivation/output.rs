use data_encoding::HEXLOWER_PERMISSIVE;
use serde::{Deserialize, Serialize};

use crate::nixhash::{self, format_ca_tag, parse_ca_tag, CAHash, HashAlgo, IngestionMethod};

/// Describes the content addressing scheme of an output of a
/// [crate::derivation::Derivation].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutputFields", into = "OutputFields")]
pub enum OutputType {
    /// The output must match the given content address, which is known
    /// before building.
    Fixed(CAHash),
    /// The output is hashed with the given method and algorithm once built.
    Floating {
        method: IngestionMethod,
        algo: HashAlgo,
    },
}

impl OutputType {
    pub fn fixed(ca: CAHash) -> Self {
        OutputType::Fixed(ca)
    }

    /// An output that must be a single file, hashed with the given
    /// algorithm.
    pub fn flat_file_floating(algo: HashAlgo) -> Self {
        OutputType::Floating {
            method: IngestionMethod::Flat,
            algo,
        }
    }

    /// An output that is hashed as a NAR with the given algorithm.
    pub fn recursive_file_floating(algo: HashAlgo) -> Self {
        OutputType::Floating {
            method: IngestionMethod::Recursive,
            algo,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, OutputType::Fixed(_))
    }

    /// Whether the content hash can only be known once the output is built.
    pub fn is_floating(&self) -> bool {
        matches!(self, OutputType::Floating { .. })
    }

    pub fn fixed_ca(&self) -> Option<&CAHash> {
        match self {
            OutputType::Fixed(ca) => Some(ca),
            OutputType::Floating { .. } => None,
        }
    }

    pub fn method(&self) -> IngestionMethod {
        match self {
            OutputType::Fixed(ca) => ca.method(),
            OutputType::Floating { method, .. } => *method,
        }
    }

    pub fn hash_algo(&self) -> HashAlgo {
        match self {
            OutputType::Fixed(ca) => ca.hash().algo(),
            OutputType::Floating { algo, .. } => *algo,
        }
    }

    /// Whether the output is hashed as a NAR.
    pub fn is_recursive_file(&self) -> bool {
        self.method() == IngestionMethod::Recursive
    }

    /// Returns the hash algorithm tag, like `r:sha256`.
    pub fn ca_tag(&self) -> String {
        format_ca_tag(self.method(), self.hash_algo())
    }

    /// Returns the lower hex digest of a fixed output, or an empty string.
    pub fn hash_hex(&self) -> String {
        match self {
            OutputType::Fixed(ca) => ca.hash().to_plain_hex_string(),
            OutputType::Floating { .. } => String::new(),
        }
    }
}

/// Constructs the content address of a fixed output from its method,
/// algorithm and hex-encoded digest.
/// Fails if the digest is not valid hex, or its length doesn't match the
/// algorithm.
pub(crate) fn fixed_ca_from_hex(
    method: IngestionMethod,
    algo: HashAlgo,
    hash_hex: &str,
) -> nixhash::Result<CAHash> {
    let digest = HEXLOWER_PERMISSIVE
        .decode(hash_hex.as_bytes())
        .map_err(nixhash::Error::InvalidBase16Encoding)?;

    CAHash::new(method, nixhash::from_algo_and_digest(algo, &digest)?)
}

/// The JSON representation of an [OutputType].
#[derive(Serialize, Deserialize)]
struct OutputFields {
    #[serde(rename = "hashAlgo")]
    hash_algo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl From<OutputType> for OutputFields {
    fn from(output: OutputType) -> Self {
        Self {
            hash_algo: output.ca_tag(),
            hash: output.fixed_ca().map(|ca| ca.hash().to_plain_hex_string()),
        }
    }
}

impl TryFrom<OutputFields> for OutputType {
    type Error = nixhash::Error;

    fn try_from(fields: OutputFields) -> Result<Self, Self::Error> {
        let (method, algo) = parse_ca_tag(&fields.hash_algo)?;

        Ok(match fields.hash {
            Some(hash_hex) => OutputType::Fixed(fixed_ca_from_hex(method, algo, &hash_hex)?),
            None => OutputType::Floating { method, algo },
        })
    }
}
