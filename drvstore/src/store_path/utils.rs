use crate::nixbase32;
use crate::nixhash::{CAHash, NixHash};
use crate::store_path::{Error, References, StoreDirectory, StorePath, DIGEST_SIZE};
use sha2::{Digest, Sha256};

/// Errors that can occur when creating a content-addressed store path.
///
/// This wraps the main [crate::store_path::Error]..
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildStorePathError {
    #[error("Invalid Store Path: {0}")]
    InvalidStorePath(Error),
    /// This error occurs when we have references outside the SHA-256 +
    /// Recursive case, or a self reference on text. The restriction comes
    /// from upstream Nix.
    #[error("References were not supported as much as requested")]
    InvalidReference(),
    #[error("reference {0} is not in store directory {1}")]
    ForeignReference(StorePath, StoreDirectory),
}

/// compress_hash takes an arbitrarily long sequence of bytes (usually
/// a hash digest), and returns a sequence of bytes of length
/// OUTPUT_SIZE.
///
/// It's calculated by rotating through the bytes in the output buffer
/// (zero- initialized), and XOR'ing with each byte of the passed
/// input. It consumes 1 byte at a time, and XOR's it with the current
/// value in the output buffer.
pub fn compress_hash<const OUTPUT_SIZE: usize>(input: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut output = [0; OUTPUT_SIZE];

    for (ii, ch) in input.iter().enumerate() {
        output[ii % OUTPUT_SIZE] ^= ch;
    }

    output
}

/// This builds a store path for a literal text file (or a serialized
/// derivation) that may contain references.
/// If you already have the digest of the contents, use [build_ca_path]
/// with [CAHash::Text] instead.
pub fn build_text_path<C: AsRef<[u8]>>(
    dir: &StoreDirectory,
    name: &str,
    content: C,
    references: &References,
) -> Result<StorePath, BuildStorePathError> {
    let content_digest = Sha256::new_with_prefix(content).finalize().into();

    build_ca_path(dir, name, &CAHash::Text(content_digest), references)
}

/// This builds a store path in `dir` from a [CAHash] and a set of references.
///
/// Identical inputs always produce the same path.
pub fn build_ca_path(
    dir: &StoreDirectory,
    name: &str,
    ca_hash: &CAHash,
    references: &References,
) -> Result<StorePath, BuildStorePathError> {
    if let Some(foreign) = references.others.iter().find(|p| p.dir() != dir) {
        return Err(BuildStorePathError::ForeignReference(
            foreign.clone(),
            dir.clone(),
        ));
    }

    let (ty, hash) = match ca_hash {
        CAHash::Text(digest) => {
            if references.self_reference {
                return Err(BuildStorePathError::InvalidReference());
            }
            (
                make_references_string("text", references),
                NixHash::Sha256(*digest),
            )
        }
        CAHash::Nar(hash @ NixHash::Sha256(_)) => {
            (make_references_string("source", references), hash.clone())
        }
        // all other fixed outputs use another custom scheme, and may not refer
        // to anything.
        CAHash::Nar(hash) | CAHash::Flat(hash) => {
            if !references.is_empty() {
                return Err(BuildStorePathError::InvalidReference());
            }
            let inner = format!(
                "fixed:out:{}{}:",
                ca_hash.method().prefix(),
                hash.to_nix_hex_string()
            );
            (
                String::from("output:out"),
                NixHash::Sha256(Sha256::digest(inner).into()),
            )
        }
    };

    build_store_path_from_fingerprint_parts(dir, &ty, &hash, name)
        .map_err(BuildStorePathError::InvalidStorePath)
}

/// This builds a store path from fingerprint parts.
///
/// The fingerprint is `$ty:$algo:$hexdigest:$storedir:$name`. It is hashed
/// with sha256, its digest is compressed to 20 bytes, and nixbase32-encoded
/// (32 characters).
fn build_store_path_from_fingerprint_parts(
    dir: &StoreDirectory,
    ty: &str,
    hash: &NixHash,
    name: &str,
) -> Result<StorePath, Error> {
    let fingerprint = format!("{}:{}:{}:{}", ty, hash.to_nix_hex_string(), dir, name);
    let digest = Sha256::digest(fingerprint);

    StorePath::from_name_and_digest(dir.clone(), name, compress_hash::<DIGEST_SIZE>(&digest))
}

/// Concatenates the type with all references (as absolute paths, in order),
/// and `self` if the object refers to itself, separated by `:`.
fn make_references_string(ty: &str, references: &References) -> String {
    let mut s = String::from(ty);

    for reference in &references.others {
        s.push(':');
        s.push_str(&reference.to_absolute_path());
    }

    if references.self_reference {
        s.push_str(":self");
    }

    s
}

/// Placeholders (i.e. values returned by `builtins.placeholder`)
/// are used to populate outputs with paths that must be
/// string-replaced with the actual placeholders later, at runtime.
///
/// The actual placeholder is basically just a SHA256 hash encoded in
/// nixbase32.
pub fn hash_placeholder(name: &str) -> String {
    let digest = Sha256::digest(format!("nix-output:{}", name));

    format!("/{}", nixbase32::encode(&digest))
}
