//! Passphrase envelopes
//!
//! Self-describing sealed blobs for text and binary payloads. Every blob
//! carries the KDF parameters, salt and nonce needed to open it, so opening
//! is a pure function of the passphrase and the blob.
//!
//! # Wire format
//!
//! ```text
//! "HKE" | version u8 | kdf tag u8 | kdf params (u32 BE each)
//!       | salt_len u8 | salt | nonce[12] | flags u8
//!       | [mime_len u16 | mime] | [name_len u16 | name]
//!       | ct_len u32 | ciphertext | tag[16]
//! ```
//!
//! Everything before `ct_len` is the header. The encoded header, followed by
//! any caller-supplied AAD, is authenticated as AES-GCM associated data, so
//! metadata cannot be altered independently of the ciphertext.
//!
//! The text form is `hk1.` followed by unpadded base64url of the bytes above.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{HushError, Result};
use crate::primitives::{
    aead_open, aead_seal, derive_key, fill_random, random_bytes, supports_argon2id, Argon2Params,
    KdfParams, KEY_LEN, MIN_SALT_LEN, NONCE_LEN, TAG_LEN,
};

/// Current envelope format version
pub const ENVELOPE_VERSION: u8 = 1;

/// Prefix of the armored text form
pub const ARMOR_PREFIX: &str = "hk1.";

const MAGIC: &[u8; 3] = b"HKE";

/// Salt length written by this version
const SALT_LEN: usize = 16;
const MAX_SALT_LEN: usize = 64;

const KDF_TAG_PBKDF2_SHA256: u8 = 1;
const KDF_TAG_ARGON2ID: u8 = 2;

const FLAG_MIME: u8 = 0b0000_0001;
const FLAG_NAME: u8 = 0b0000_0010;
const KNOWN_FLAGS: u8 = FLAG_MIME | FLAG_NAME;

/// Predefined key-derivation cost tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfProfile {
    /// PBKDF2-SHA256, available everywhere
    Compatible,
    /// Argon2id, 64 MiB
    #[default]
    Strong,
    /// Argon2id, 256 MiB
    Paranoid,
    /// Caller-chosen parameters
    Custom(KdfParams),
}

/// Explicit notice that a requested profile could not be honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downgrade {
    pub requested: KdfProfile,
    pub used: KdfParams,
    pub reason: String,
}

impl KdfProfile {
    /// Parameters for this tier, regardless of platform support.
    pub fn params(&self) -> KdfParams {
        match self {
            Self::Compatible => KdfParams::Pbkdf2Sha256 {
                iterations: 600_000,
            },
            Self::Strong => KdfParams::Argon2id(Argon2Params {
                memory_kib: 64 * 1024,
                passes: 3,
                parallelism: 1,
            }),
            Self::Paranoid => KdfParams::Argon2id(Argon2Params {
                memory_kib: 256 * 1024,
                passes: 4,
                parallelism: 1,
            }),
            Self::Custom(params) => *params,
        }
    }

    /// Parameters for this tier, failing fast if this build cannot run them.
    pub fn resolve(&self) -> Result<KdfParams> {
        let params = self.params();
        if let Some(problem) = params.bounds_violation() {
            return Err(HushError::Configuration(problem));
        }
        if matches!(params, KdfParams::Argon2id(_)) && !supports_argon2id() {
            return Err(HushError::UnsupportedAlgorithm(format!(
                "{:?} profile requires argon2id, which is not available in this build",
                self
            )));
        }
        Ok(params)
    }

    /// Like [`resolve`](Self::resolve), but falls back to the compatible tier
    /// when Argon2id is unavailable. The fallback is always reported.
    pub fn resolve_with_fallback(&self) -> Result<(KdfParams, Option<Downgrade>)> {
        match self.resolve() {
            Ok(params) => Ok((params, None)),
            Err(HushError::UnsupportedAlgorithm(reason)) => {
                let used = Self::Compatible.params();
                warn!("Downgrading {:?} envelope profile to {}: {}", self, used, reason);
                Ok((
                    used,
                    Some(Downgrade {
                        requested: *self,
                        used,
                        reason,
                    }),
                ))
            }
            Err(e) => Err(e),
        }
    }
}

/// Optional descriptive fields, authenticated but not encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub mime: Option<String>,
    pub name: Option<String>,
}

/// Everything needed to open an envelope except the passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u8,
    pub kdf: KdfParams,
    pub salt: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub metadata: EnvelopeMetadata,
}

impl EnvelopeHeader {
    /// Canonical header encoding, also used as AEAD associated data.
    ///
    /// # Errors
    /// `Configuration` if the salt or a metadata field does not fit its
    /// length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_encodable()?;
        let mut out = Vec::with_capacity(64);
        self.encode_into(&mut out);
        Ok(out)
    }

    /// Every length the encoder writes must fit its prefix, and the salt
    /// length must be one `decode` accepts.
    fn check_encodable(&self) -> Result<()> {
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt.len()) {
            return Err(HushError::Configuration(format!(
                "salt must be {}..={} bytes",
                MIN_SALT_LEN, MAX_SALT_LEN
            )));
        }
        for (label, field) in [("mime", &self.metadata.mime), ("name", &self.metadata.name)] {
            if field.as_ref().is_some_and(|v| v.len() > u16::MAX as usize) {
                return Err(HushError::Configuration(format!(
                    "{} must be at most {} bytes",
                    label,
                    u16::MAX
                )));
            }
        }
        Ok(())
    }

    /// Callers must have passed `check_encodable`.
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        match self.kdf {
            KdfParams::Pbkdf2Sha256 { iterations } => {
                out.push(KDF_TAG_PBKDF2_SHA256);
                out.extend_from_slice(&iterations.to_be_bytes());
            }
            KdfParams::Argon2id(p) => {
                out.push(KDF_TAG_ARGON2ID);
                out.extend_from_slice(&p.memory_kib.to_be_bytes());
                out.extend_from_slice(&p.passes.to_be_bytes());
                out.extend_from_slice(&p.parallelism.to_be_bytes());
            }
        }
        out.push(self.salt.len() as u8);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);

        let mut flags = 0u8;
        if self.metadata.mime.is_some() {
            flags |= FLAG_MIME;
        }
        if self.metadata.name.is_some() {
            flags |= FLAG_NAME;
        }
        out.push(flags);
        for field in [&self.metadata.mime, &self.metadata.name].into_iter().flatten() {
            out.extend_from_slice(&(field.len() as u16).to_be_bytes());
            out.extend_from_slice(field.as_bytes());
        }
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        if reader.take(MAGIC.len(), "magic")? != MAGIC {
            return Err(format_error("not a hushkit envelope"));
        }
        let version = reader.u8("version")?;
        if version != ENVELOPE_VERSION {
            return Err(format_error(format!("unknown envelope version {}", version)));
        }

        let kdf = match reader.u8("kdf tag")? {
            KDF_TAG_PBKDF2_SHA256 => KdfParams::Pbkdf2Sha256 {
                iterations: reader.u32("pbkdf2 iterations")?,
            },
            KDF_TAG_ARGON2ID => KdfParams::Argon2id(Argon2Params {
                memory_kib: reader.u32("argon2id memory")?,
                passes: reader.u32("argon2id passes")?,
                parallelism: reader.u32("argon2id parallelism")?,
            }),
            other => return Err(format_error(format!("unknown kdf tag {}", other))),
        };
        if let Some(problem) = kdf.bounds_violation() {
            return Err(format_error(problem));
        }

        let salt_len = reader.u8("salt length")? as usize;
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&salt_len) {
            return Err(format_error(format!(
                "salt length must be in {}..={}",
                MIN_SALT_LEN, MAX_SALT_LEN
            )));
        }
        let salt = reader.take(salt_len, "salt")?.to_vec();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(reader.take(NONCE_LEN, "nonce")?);

        let flags = reader.u8("flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(format_error(format!("unknown header flags {:#04x}", flags)));
        }
        let mime = if flags & FLAG_MIME != 0 {
            Some(reader.string("mime")?)
        } else {
            None
        };
        let name = if flags & FLAG_NAME != 0 {
            Some(reader.string("name")?)
        } else {
            None
        };

        Ok(Self {
            version,
            kdf,
            salt,
            nonce,
            metadata: EnvelopeMetadata { mime, name },
        })
    }
}

/// Header, ciphertext and tag. Produced by the seal functions, consumed by
/// the open functions; other code should treat the encoded form as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    header: EnvelopeHeader,
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl SealedEnvelope {
    pub fn header(&self) -> &EnvelopeHeader {
        &self.header
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(96 + self.ciphertext.len());
        self.header.encode_into(&mut out);
        out.extend_from_slice(&(self.ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the binary form. Never panics; any structural problem is a
    /// `Format` error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let header = EnvelopeHeader::decode(&mut reader)?;

        let ct_len = reader.u32("ciphertext length")? as usize;
        let ciphertext = reader.take(ct_len, "ciphertext")?.to_vec();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(reader.take(TAG_LEN, "tag")?);

        if !reader.is_empty() {
            return Err(format_error("trailing bytes after envelope"));
        }

        Ok(Self {
            header,
            ciphertext,
            tag,
        })
    }

    pub fn to_armored(&self) -> String {
        format!("{}{}", ARMOR_PREFIX, URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }

    pub fn from_armored(blob: &str) -> Result<Self> {
        let body = blob
            .trim()
            .strip_prefix(ARMOR_PREFIX)
            .ok_or_else(|| format_error(format!("missing {} prefix", ARMOR_PREFIX)))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| format_error(format!("base64 decode: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Result of sealing a binary payload
#[derive(Debug, Clone)]
pub struct SealedBytes {
    pub blob: String,
    pub header: EnvelopeHeader,
}

/// Result of opening a binary payload
#[derive(Debug, Clone)]
pub struct OpenedBytes {
    pub plaintext: Vec<u8>,
    pub header: EnvelopeHeader,
}

/// Seal UTF-8 text under a passphrase.
pub fn seal_text(passphrase: &str, plaintext: &str, profile: &KdfProfile) -> Result<String> {
    seal_text_with_aad(passphrase, plaintext, profile, &[])
}

/// Seal text bound to external context. The same `aad` must be supplied
/// to [`open_text_with_aad`].
pub fn seal_text_with_aad(
    passphrase: &str,
    plaintext: &str,
    profile: &KdfProfile,
    aad: &[u8],
) -> Result<String> {
    let envelope = seal(
        passphrase,
        plaintext.as_bytes(),
        EnvelopeMetadata::default(),
        profile,
        aad,
    )?;
    Ok(envelope.to_armored())
}

/// Open a blob produced by [`seal_text`].
///
/// # Errors
/// `Authentication` for a wrong passphrase or any tampering, `Format` if the
/// blob does not parse or the payload is not UTF-8.
pub fn open_text(passphrase: &str, blob: &str) -> Result<String> {
    open_text_with_aad(passphrase, blob, &[])
}

/// Open a blob sealed with [`seal_text_with_aad`]. A different `aad` fails
/// as `Authentication`.
pub fn open_text_with_aad(passphrase: &str, blob: &str, aad: &[u8]) -> Result<String> {
    let envelope = SealedEnvelope::from_armored(blob)?;
    let mut plaintext = open(passphrase, &envelope, aad)?;
    String::from_utf8(std::mem::take(&mut *plaintext)).map_err(|e| {
        drop(Zeroizing::new(e.into_bytes()));
        format_error("payload is not UTF-8 text")
    })
}

/// Seal a binary payload with optional metadata.
pub fn seal_bytes(
    passphrase: &str,
    bytes: &[u8],
    metadata: EnvelopeMetadata,
    profile: &KdfProfile,
) -> Result<SealedBytes> {
    seal_bytes_with_aad(passphrase, bytes, metadata, profile, &[])
}

/// Seal a binary payload bound to external context. The same `aad` must be
/// supplied to [`open_bytes_with_aad`].
pub fn seal_bytes_with_aad(
    passphrase: &str,
    bytes: &[u8],
    metadata: EnvelopeMetadata,
    profile: &KdfProfile,
    aad: &[u8],
) -> Result<SealedBytes> {
    let envelope = seal(passphrase, bytes, metadata, profile, aad)?;
    Ok(SealedBytes {
        blob: envelope.to_armored(),
        header: envelope.header,
    })
}

/// Open a blob produced by [`seal_bytes`], returning the payload together
/// with its authenticated header and metadata.
pub fn open_bytes(passphrase: &str, blob: &str) -> Result<OpenedBytes> {
    open_bytes_with_aad(passphrase, blob, &[])
}

/// Open a blob sealed with [`seal_bytes_with_aad`]. A different `aad` fails
/// as `Authentication`.
pub fn open_bytes_with_aad(passphrase: &str, blob: &str, aad: &[u8]) -> Result<OpenedBytes> {
    let envelope = SealedEnvelope::from_armored(blob)?;
    let mut plaintext = open(passphrase, &envelope, aad)?;
    Ok(OpenedBytes {
        plaintext: std::mem::take(&mut *plaintext),
        header: envelope.header,
    })
}

/// Seal `plaintext`. Salt and nonce are fresh random values on every call.
pub fn seal(
    passphrase: &str,
    plaintext: &[u8],
    metadata: EnvelopeMetadata,
    profile: &KdfProfile,
    aad: &[u8],
) -> Result<SealedEnvelope> {
    let kdf = profile.resolve()?;

    if plaintext.len() > u32::MAX as usize {
        return Err(HushError::Configuration(
            "payload exceeds 4 GiB envelope limit".to_string(),
        ));
    }

    let salt = random_bytes(SALT_LEN)?;
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let header = EnvelopeHeader {
        version: ENVELOPE_VERSION,
        kdf,
        salt,
        nonce,
        metadata,
    };
    header.check_encodable()?;

    let key = derive_key(passphrase.as_bytes(), &header.salt, &kdf, KEY_LEN)?;
    let associated = associated_data(&header, aad);
    let (ciphertext, tag) = aead_seal(&key, &header.nonce, plaintext, &associated)?;

    debug!(
        "Sealed {} byte payload with {}{}",
        plaintext.len(),
        kdf,
        if aad.is_empty() { "" } else { " and caller AAD" }
    );

    Ok(SealedEnvelope {
        header,
        ciphertext,
        tag,
    })
}

/// Re-derive the key from the envelope's own parameters and decrypt.
pub fn open(
    passphrase: &str,
    envelope: &SealedEnvelope,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let header = &envelope.header;
    let key = derive_key(passphrase.as_bytes(), &header.salt, &header.kdf, KEY_LEN)?;
    let associated = associated_data(header, aad);

    let plaintext = aead_open(
        &key,
        &header.nonce,
        &envelope.ciphertext,
        &envelope.tag,
        &associated,
    );
    match &plaintext {
        Ok(pt) => debug!("Opened {} byte payload ({})", pt.len(), header.kdf),
        Err(_) => debug!("Envelope authentication failed ({})", header.kdf),
    }
    plaintext
}

/// Header bytes followed by the caller AAD. The header was checked by
/// `seal` or produced by `decode`, so every length fits.
fn associated_data(header: &EnvelopeHeader, aad: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + aad.len());
    header.encode_into(&mut out);
    out.extend_from_slice(aad);
    out
}

fn format_error(msg: impl Into<String>) -> HushError {
    HushError::Format(msg.into())
}

/// Bounds-checked cursor over an untrusted byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| format_error(format!("truncated envelope while reading {}", what)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = self.u16(what)? as usize;
        let raw = self.take(len, what)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| format_error(format!("{} is not valid UTF-8", what)))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
