//! Primitive adapter
//!
//! The only place that touches the platform random source, the key
//! derivation functions and the AEAD cipher. Everything above this module
//! depends on the contract here, never on the crates underneath.
//!
//! # Building blocks
//!
//! - Randomness: `OsRng` (fallible, surfaced as `EntropySource`)
//! - KDF: PBKDF2-HMAC-SHA256, and Argon2id when built with the `argon2` feature
//! - AEAD: AES-256-GCM, 96-bit nonce, 128-bit detached tag

use std::fmt;

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{HushError, Result};

/// AES-256 key length
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Shortest salt accepted by `derive_key`
pub const MIN_SALT_LEN: usize = 16;

/// Upper bounds on cost parameters, a small margin above the paranoid
/// tier. Costs are read from the header and run before the tag can be
/// checked, so these bound what a forged or bit-flipped header can demand.
pub const PBKDF2_MAX_ITERATIONS: u32 = 2_000_000;
pub const ARGON2_MAX_MEMORY_KIB: u32 = 512 * 1024; // 512 MiB
pub const ARGON2_MAX_PASSES: u32 = 8;
pub const ARGON2_MAX_PARALLELISM: u32 = 8;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes (t_cost)
    pub passes: u32,
    /// Lanes (p_cost)
    pub parallelism: u32,
}

/// Key derivation algorithm together with its cost parameters.
///
/// The parameters travel with the data they protect, so decoding never
/// depends on ambient defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum KdfParams {
    Pbkdf2Sha256 { iterations: u32 },
    Argon2id(Argon2Params),
}

impl KdfParams {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pbkdf2Sha256 { .. } => "pbkdf2-sha256",
            Self::Argon2id(_) => "argon2id",
        }
    }

    /// Describe the first out-of-range parameter, if any.
    pub fn bounds_violation(&self) -> Option<String> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => {
                if iterations == 0 || iterations > PBKDF2_MAX_ITERATIONS {
                    return Some(format!(
                        "pbkdf2 iterations must be in 1..={}",
                        PBKDF2_MAX_ITERATIONS
                    ));
                }
                None
            }
            Self::Argon2id(p) => {
                if p.parallelism == 0 || p.parallelism > ARGON2_MAX_PARALLELISM {
                    return Some(format!(
                        "argon2id parallelism must be in 1..={}",
                        ARGON2_MAX_PARALLELISM
                    ));
                }
                // argon2 needs at least 8 blocks per lane
                if p.memory_kib < 8 * p.parallelism || p.memory_kib > ARGON2_MAX_MEMORY_KIB {
                    return Some(format!(
                        "argon2id memory must be in {}..={} KiB",
                        8 * p.parallelism,
                        ARGON2_MAX_MEMORY_KIB
                    ));
                }
                if p.passes == 0 || p.passes > ARGON2_MAX_PASSES {
                    return Some(format!(
                        "argon2id passes must be in 1..={}",
                        ARGON2_MAX_PASSES
                    ));
                }
                None
            }
        }
    }
}

impl fmt::Display for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pbkdf2Sha256 { iterations } => write!(f, "pbkdf2-sha256 (i={})", iterations),
            Self::Argon2id(p) => write!(
                f,
                "argon2id (m={} KiB, t={}, p={})",
                p.memory_kib, p.passes, p.parallelism
            ),
        }
    }
}

/// Whether this build can derive keys with Argon2id.
pub fn supports_argon2id() -> bool {
    cfg!(feature = "argon2")
}

/// Fill `buf` from the operating system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| HushError::EntropySource(e.to_string()))
}

/// Return `n` cryptographically secure random bytes.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    fill_random(&mut out)?;
    Ok(out)
}

/// Uniform random integer in `0..bound` without modulo bias.
pub fn random_below(bound: u32) -> Result<u32> {
    if bound == 0 {
        return Err(HushError::Configuration(
            "random bound must be positive".to_string(),
        ));
    }

    let range = 1u64 << 32;
    let limit = range - range % u64::from(bound);
    loop {
        let mut buf = [0u8; 4];
        fill_random(&mut buf)?;
        let v = u64::from(u32::from_be_bytes(buf));
        if v < limit {
            return Ok((v % u64::from(bound)) as u32);
        }
    }
}

/// Derive `len` key bytes from a passphrase.
///
/// Fails fast with `UnsupportedAlgorithm` when Argon2id is requested on a
/// build without it; callers should check [`supports_argon2id`] first.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
    len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if salt.len() < MIN_SALT_LEN {
        return Err(HushError::Configuration(format!(
            "salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }
    if let Some(problem) = params.bounds_violation() {
        return Err(HushError::Configuration(problem));
    }

    let mut out = Zeroizing::new(vec![0u8; len]);
    derive_into(passphrase, salt, params, &mut out)?;
    Ok(out)
}

fn derive_into(passphrase: &[u8], salt: &[u8], params: &KdfParams, out: &mut [u8]) -> Result<()> {
    match params {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, *iterations, out);
            Ok(())
        }
        KdfParams::Argon2id(p) => argon2id_into(passphrase, salt, p, out),
    }
}

#[cfg(feature = "argon2")]
fn argon2id_into(passphrase: &[u8], salt: &[u8], p: &Argon2Params, out: &mut [u8]) -> Result<()> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(p.memory_kib, p.passes, p.parallelism, Some(out.len()))
        .map_err(|e| HushError::Configuration(format!("argon2id parameters: {}", e)))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase, salt, out)
        .map_err(|e| HushError::Crypto(format!("argon2id derivation failed: {}", e)))
}

#[cfg(not(feature = "argon2"))]
fn argon2id_into(_: &[u8], _: &[u8], _: &Argon2Params, _: &mut [u8]) -> Result<()> {
    Err(HushError::UnsupportedAlgorithm(
        "argon2id is not available in this build".to_string(),
    ))
}

/// Encrypt with AES-256-GCM, returning ciphertext and detached tag.
pub fn aead_seal(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| HushError::Crypto(format!("key must be {} bytes", KEY_LEN)))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer)
        .map_err(|e| HushError::Crypto(format!("encryption failed: {}", e)))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);
    Ok((buffer, tag_bytes))
}

/// Verify and decrypt. Any mismatch (key, nonce, ciphertext, tag or AAD)
/// is reported as `Authentication` and no plaintext is released.
pub fn aead_open(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| HushError::Crypto(format!("key must be {} bytes", KEY_LEN)))?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            aad,
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| HushError::Authentication)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_PBKDF2: KdfParams = KdfParams::Pbkdf2Sha256 { iterations: 1_000 };

    #[test]
    fn test_random_bytes_length_and_freshness() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b, "two 256-bit draws should never collide");
        assert!(random_bytes(0).unwrap().is_empty());
    }

    #[test]
    fn test_random_below_stays_in_range() {
        for bound in [1u32, 2, 7, 62, 1_000] {
            for _ in 0..200 {
                assert!(random_below(bound).unwrap() < bound);
            }
        }
        assert!(random_below(0).is_err());
    }

    #[test]
    fn test_random_below_covers_small_range() {
        let mut seen = [false; 6];
        for _ in 0..500 {
            seen[random_below(6).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "all 6 values should appear: {:?}", seen);
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        // RFC 7914 section 11, first 32 bytes
        let mut out = [0u8; 32];
        derive_into(
            b"passwd",
            b"salt",
            &KdfParams::Pbkdf2Sha256 { iterations: 1 },
            &mut out,
        )
        .unwrap();
        assert_eq!(
            hex::encode(out),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [7u8; 16];
        let k1 = derive_key(b"pass", &salt, &FAST_PBKDF2, KEY_LEN).unwrap();
        let k2 = derive_key(b"pass", &salt, &FAST_PBKDF2, KEY_LEN).unwrap();
        let k3 = derive_key(b"pass", &[8u8; 16], &FAST_PBKDF2, KEY_LEN).unwrap();
        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
        assert_eq!(k1.len(), KEY_LEN);
    }

    #[test]
    fn test_derive_key_rejects_short_salt() {
        let result = derive_key(b"pass", b"short", &FAST_PBKDF2, KEY_LEN);
        assert!(matches!(result, Err(HushError::Configuration(_))));
    }

    #[test]
    fn test_derive_key_rejects_out_of_range_params() {
        let salt = [1u8; 16];
        let zero = KdfParams::Pbkdf2Sha256 { iterations: 0 };
        assert!(derive_key(b"pass", &salt, &zero, KEY_LEN).is_err());

        let huge = KdfParams::Argon2id(Argon2Params {
            memory_kib: ARGON2_MAX_MEMORY_KIB + 1,
            passes: 1,
            parallelism: 1,
        });
        assert!(derive_key(b"pass", &salt, &huge, KEY_LEN).is_err());
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn test_argon2id_derivation() {
        assert!(supports_argon2id());
        let params = KdfParams::Argon2id(Argon2Params {
            memory_kib: 1024,
            passes: 1,
            parallelism: 1,
        });
        let salt = [3u8; 16];
        let k1 = derive_key(b"pass", &salt, &params, KEY_LEN).unwrap();
        let k2 = derive_key(b"pass", &salt, &params, KEY_LEN).unwrap();
        assert_eq!(*k1, *k2);
        let pbkdf = derive_key(b"pass", &salt, &FAST_PBKDF2, KEY_LEN).unwrap();
        assert_ne!(*k1, *pbkdf);
    }

    #[cfg(not(feature = "argon2"))]
    #[test]
    fn test_argon2id_unsupported_fails_fast() {
        assert!(!supports_argon2id());
        let params = KdfParams::Argon2id(Argon2Params {
            memory_kib: 1024,
            passes: 1,
            parallelism: 1,
        });
        let result = derive_key(b"pass", &[3u8; 16], &params, KEY_LEN);
        assert!(matches!(result, Err(HushError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_aead_roundtrip_and_aad_binding() {
        let key = [9u8; KEY_LEN];
        let nonce = [1u8; NONCE_LEN];
        let (ct, tag) = aead_seal(&key, &nonce, b"hello", b"note-1").unwrap();
        assert_eq!(ct.len(), 5);

        let pt = aead_open(&key, &nonce, &ct, &tag, b"note-1").unwrap();
        assert_eq!(pt.as_slice(), b"hello");

        let wrong_aad = aead_open(&key, &nonce, &ct, &tag, b"note-2");
        assert_eq!(wrong_aad.unwrap_err(), HushError::Authentication);
    }

    #[test]
    fn test_aead_tampered_tag_fails() {
        let key = [9u8; KEY_LEN];
        let nonce = [1u8; NONCE_LEN];
        let (ct, mut tag) = aead_seal(&key, &nonce, b"hello", &[]).unwrap();
        tag[0] ^= 0x01;
        let result = aead_open(&key, &nonce, &ct, &tag, &[]);
        assert_eq!(result.unwrap_err(), HushError::Authentication);
    }

    #[test]
    fn test_aead_rejects_bad_key_length() {
        let result = aead_seal(&[0u8; 16], &[0u8; NONCE_LEN], b"x", &[]);
        assert!(matches!(result, Err(HushError::Crypto(_))));
    }

    #[test]
    fn test_kdf_params_display_and_serde() {
        assert_eq!(FAST_PBKDF2.to_string(), "pbkdf2-sha256 (i=1000)");
        let json = serde_json::to_string(&FAST_PBKDF2).unwrap();
        assert!(json.contains("\"algorithm\":\"pbkdf2-sha256\""), "{}", json);
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FAST_PBKDF2);
    }
}
