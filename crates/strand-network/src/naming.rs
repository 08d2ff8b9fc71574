//! Host-side link names.

use rand::TryRngCore;
use rand::rngs::OsRng;
use strand_common::{StrandError, StrandResult};

/// Prefix of every generated name.
///
/// Recent NetworkManager versions leave links starting with `veth` alone, so
/// the host end never gets picked up and reconfigured.
pub const VETH_PREFIX: &str = "veth";

/// Generate `veth` followed by 8 hex digits from 4 bytes of OS entropy.
pub fn random_veth_name() -> StrandResult<String> {
    let mut entropy = [0u8; 4];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| StrandError::Entropy {
            reason: e.to_string(),
        })?;

    Ok(format!("{VETH_PREFIX}{}", hex::encode(entropy)))
}
