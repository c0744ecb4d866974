//! Placeholders stand in for store paths that are not known yet, and get
//! substituted once they are.
use sha2::{Digest, Sha256};

use super::{OutputReference, DEFAULT_OUTPUT_NAME, DERIVATION_EXT};
use crate::nixbase32;

pub use crate::store_path::hash_placeholder;

/// Returns the placeholder for an output of a content-addressed input
/// derivation, whose path is not known until that derivation is built.
///
/// Paths without the `.drv` suffix are accepted too.
pub fn unknown_ca_output_placeholder(output: &OutputReference) -> String {
    let name = output.drv_path.name();
    let drv_name = name.strip_suffix(DERIVATION_EXT).unwrap_or(name);

    let mut hasher = Sha256::new();
    hasher.update("nix-upstream-output:");
    hasher.update(output.drv_path.digest());
    hasher.update(":");
    hasher.update(drv_name);
    if output.output_name != DEFAULT_OUTPUT_NAME {
        hasher.update("-");
        hasher.update(&output.output_name);
    }

    format!("/{}", nixbase32::encode(&hasher.finalize()))
}
