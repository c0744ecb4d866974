use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::{Derivation, DerivationError, Operation, DERIVATION_EXT};
use crate::nar::{self, HashingWriter};
use crate::nixhash::{CAHash, HashAlgo, NixHash};
use crate::store_path::{build_ca_path, StorePath};

/// Describes the store object of an exported [Derivation].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportTrailer {
    /// The path of the serialized derivation, ending in `.drv`.
    pub store_path: StorePath,
    /// The text content address of the serialization.
    pub content_address: CAHash,
    /// Input sources and input derivation paths.
    pub references: BTreeSet<StorePath>,
    /// The hash of the NAR wrapping the serialization.
    pub nar_hash: NixHash,
    pub nar_size: u64,
}

impl Derivation {
    /// Serializes the derivation, and wraps it as a single file NAR.
    ///
    /// Returns the NAR, and the information needed to add it to a store.
    /// Only [HashAlgo::Sha256] is supported for the NAR hash.
    #[instrument(level = "trace", skip_all, fields(drv.name = %self.name, algo = %algo), err)]
    pub fn export(&self, algo: HashAlgo) -> Result<(Vec<u8>, ExportTrailer), DerivationError> {
        if self.name.is_empty() {
            return Err(DerivationError::MissingName(Operation::Export));
        }
        if algo != HashAlgo::Sha256 {
            return Err(DerivationError::UnsupportedHashAlgo {
                name: self.name.clone(),
                algo,
            });
        }

        let aterm_bytes = self.to_aterm_bytes()?;

        let (nar, nar_hash, nar_size) = wrap_nar(&aterm_bytes).map_err(|source| {
            DerivationError::Archive {
                name: self.name.clone(),
                source,
            }
        })?;

        let content_address = CAHash::Text(Sha256::digest(&aterm_bytes).into());
        let references = self.references();

        let store_path = build_ca_path(
            &self.dir,
            &format!("{}{}", self.name, DERIVATION_EXT),
            &content_address,
            &references,
        )
        .map_err(|source| DerivationError::StorePath {
            name: self.name.clone(),
            source,
        })?;

        debug!(drv.path = %store_path, nar_size, "exported derivation");

        Ok((
            nar,
            ExportTrailer {
                store_path,
                content_address,
                references: references.others,
                nar_hash,
                nar_size,
            },
        ))
    }
}

/// Writes `contents` as the single regular file of a NAR, hashing it along
/// the way.
fn wrap_nar(contents: &[u8]) -> std::io::Result<(Vec<u8>, NixHash, u64)> {
    let mut w = HashingWriter::<_, Sha256>::from(Vec::new());

    nar::writer::open(&mut w)?.file(contents.len() as u64, &mut &contents[..])?;

    let nar_size = w.bytes_written();
    let (nar, digest) = w.finalize();

    Ok((nar, NixHash::Sha256(digest.into()), nar_size))
}
