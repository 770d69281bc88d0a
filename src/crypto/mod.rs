//! Cryptographic Operations Module
//!
//! Keccak hashing, the deployer's secp256k1 key, EIP-191 message signing,
//! signature canonicalization and the hashed deployer secret used to salt
//! genesis deployments.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Private keys and deployer secrets must never be logged.

use alloy_primitives::{uint, Address, FixedBytes, B256, U256};
use anyhow::Context;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::config::DeployerConfig;
use crate::error::{DeployError, Result};

pub mod transaction;

/// secp256k1 group order.
pub const SECP256K1_ORDER: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// Largest `s` accepted by the on-chain signature check (`order / 2`).
pub const SECP256K1_HALF_ORDER: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let digest: [u8; 32] = Keccak256::digest(data.as_ref()).into();
    B256::from(digest)
}

/// `keccak256("\x19Ethereum Signed Message:\n32" || hash)`
pub fn eip191_hash(hash: B256) -> B256 {
    let prefix = b"\x19Ethereum Signed Message:\n32";
    let mut prefixed = Vec::with_capacity(prefix.len() + 32);
    prefixed.extend_from_slice(prefix);
    prefixed.extend_from_slice(hash.as_slice());
    keccak256(prefixed)
}

// ============================================================================
// SIGNATURES
// ============================================================================

/// ECDSA signature in the `{r, s, v}` form contracts verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl Signature {
    /// 65 bytes: `r || s || v`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// Parses a 65-byte `r || s || v` signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(DeployError::InvalidInput(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }

    pub fn s_value(&self) -> U256 {
        U256::from_be_bytes(self.s.0)
    }
}

/// Canonicalizes a signature to the low-S form.
///
/// A raw recovery id (`0`/`1`) is lifted to `27`/`28`; any other `v` below 27
/// becomes 27. When `s > n/2` it is replaced by `n - s` and `v` flips between
/// 27 and 28. Applying it twice gives the same result as applying it once.
pub fn strict_ecdsa(signature: Signature) -> Signature {
    let mut v = match signature.v {
        0 | 1 => signature.v + 27,
        v if v < 27 => 27,
        v => v,
    };
    let mut s = signature.s;

    let s_value = signature.s_value();
    if s_value > SECP256K1_HALF_ORDER {
        s = B256::from((SECP256K1_ORDER - s_value).to_be_bytes::<32>());
        v = if v == 27 { 28 } else { 27 };
    }

    Signature { r: signature.r, s, v }
}

/// Recovers the signer of a 32-byte prehash.
pub fn recover_signer(prehash: B256, signature: &Signature) -> Result<Address> {
    let recid = match signature.v {
        27 | 28 => signature.v - 27,
        0 | 1 => signature.v,
        other => {
            return Err(DeployError::InvalidInput(format!(
                "unsupported recovery value v={}",
                other
            )))
        }
    };
    let recid = RecoveryId::from_byte(recid)
        .ok_or_else(|| DeployError::InvalidInput("invalid recovery id".to_string()))?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r.as_slice());
    rs[32..].copy_from_slice(signature.s.as_slice());
    let sig = EcdsaSignature::from_slice(&rs)
        .map_err(|e| DeployError::InvalidInput(format!("malformed signature: {}", e)))?;

    let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &sig, recid)
        .map_err(|e| DeployError::InvalidInput(format!("signature recovery failed: {}", e)))?;
    Ok(address_from_verifying_key(&key))
}

/// Ethereum address of a secp256k1 public key: last 20 bytes of
/// `keccak256(uncompressed_pubkey[1..])`.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

// ============================================================================
// DEPLOYER KEY
// ============================================================================

/// The deployer's secp256k1 key.
#[derive(Clone)]
pub struct DeployerKey {
    signing_key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for DeployerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl DeployerKey {
    /// Parses a 32-byte hex private key (with or without `0x`).
    pub fn from_hex(private_key: &str) -> anyhow::Result<Self> {
        let trimmed = private_key.trim();
        let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_key).context("Invalid deployer private key hex")?;

        if bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            ));
        }

        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Failed to convert private key to array"))?;
        let signing_key = SigningKey::from_bytes(&secret.into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        let address = address_from_verifying_key(signing_key.verifying_key());

        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Loads the key from the environment variable named in the config.
    pub fn from_config(config: &DeployerConfig) -> anyhow::Result<Self> {
        let key = config.get_private_key()?;
        Self::from_hex(&key)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte prehash. `v` is `27 + recovery id`.
    pub fn sign_hash(&self, prehash: B256) -> Result<Signature> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(prehash.as_slice())
            .map_err(|e| anyhow::anyhow!("Failed to sign precomputed hash: {}", e))?;

        let bytes = sig.to_bytes();
        Ok(Signature {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: 27 + recid.to_byte(),
        })
    }

    /// EIP-191 `signMessage` over a 32-byte hash, canonicalized.
    pub fn sign_message(&self, hash: B256) -> Result<Signature> {
        let signature = self.sign_hash(eip191_hash(hash))?;
        Ok(strict_ecdsa(signature))
    }
}

// ============================================================================
// DEPLOYER SECRET
// ============================================================================

/// First 20 bytes of `keccak256(utf8(secret))`.
pub fn deployer_secret_hash(secret: &str) -> FixedBytes<20> {
    let hash = keccak256(secret.as_bytes());
    FixedBytes::<20>::from_slice(&hash[..20])
}

/// Reads the deployer secret for `network_key` through `lookup` and hashes it.
///
/// Localhost networks read the localhost secret variable, all others the
/// public one.
pub fn load_deployer_secret<F>(
    config: &DeployerConfig,
    network_key: &str,
    lookup: F,
) -> Result<FixedBytes<20>>
where
    F: Fn(&str) -> Option<String>,
{
    let var = config.secret_env_for(network_key);
    let secret = lookup(var)
        .filter(|s| !s.is_empty())
        .ok_or(DeployError::MissingSecret)?;
    let hash = deployer_secret_hash(&secret);
    debug!("Deployer secret from {} hashed to {}", var, hash);
    Ok(hash)
}
