use std::fmt;

use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Largest digest a [`Multihash`] can hold, identity payloads included.
pub const MAX_DIGEST_LEN: usize = 64;

pub(crate) type RawMultihash = ::multihash::Multihash<MAX_DIGEST_LEN>;

const IDENTITY_CODE: u64 = 0x00;

/// Hash functions blocks may be stored under.
///
/// Identity is not one of them: it embeds the payload in the digest instead
/// of hashing it, and is built with [`Multihash::identity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "sha2-256")]
    Sha2_256,
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlgorithm {
    /// Multicodec code of this hash function.
    pub const fn code(&self) -> u64 {
        match self {
            Self::Sha2_256 => 0x12,
            Self::Blake3 => 0x1e,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x12 => Ok(Self::Sha2_256),
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedHash(other)),
        }
    }

    /// Canonical multicodec name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha2_256 => "sha2-256",
            Self::Blake3 => "blake3",
        }
    }

    pub const fn digest_len(&self) -> usize {
        32
    }

    fn table_code(&self) -> Code {
        match self {
            Self::Sha2_256 => Code::Sha2_256,
            Self::Blake3 => Code::Blake3_256,
        }
    }

    /// Hash `data` into a multihash.
    pub fn digest(&self, data: &[u8]) -> Multihash {
        Multihash(self.table_code().digest(data))
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha2_256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A self-describing hash: the hash function plus its digest.
///
/// Stores are keyed by multihash rather than by full CID, so the same bytes
/// can be requested under different codecs (raw vs dag-pb). Only identity,
/// sha2-256 and blake3 multihashes can be constructed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multihash(RawMultihash);

impl Multihash {
    /// Wrap a precomputed digest, checking its length.
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, TypeError> {
        if digest.len() != algorithm.digest_len() {
            return Err(TypeError::InvalidDigestLength {
                algorithm: algorithm.name(),
                expected: algorithm.digest_len(),
                actual: digest.len(),
            });
        }
        RawMultihash::wrap(algorithm.code(), &digest)
            .map(Self)
            .map_err(|e| TypeError::InvalidMultihash(e.to_string()))
    }

    /// An identity multihash carrying `payload` inline.
    pub fn identity(payload: &[u8]) -> Result<Self, TypeError> {
        if payload.len() > MAX_DIGEST_LEN {
            return Err(TypeError::IdentityTooLarge(payload.len()));
        }
        RawMultihash::wrap(IDENTITY_CODE, payload)
            .map(Self)
            .map_err(|e| TypeError::InvalidMultihash(e.to_string()))
    }

    /// Accept a multihash from the `multihash` crate if its code is supported.
    pub(crate) fn from_raw(raw: RawMultihash) -> Result<Self, TypeError> {
        match raw.code() {
            IDENTITY_CODE => Ok(Self(raw)),
            code => {
                let algorithm = HashAlgorithm::from_code(code)?;
                if raw.digest().len() != algorithm.digest_len() {
                    return Err(TypeError::InvalidDigestLength {
                        algorithm: algorithm.name(),
                        expected: algorithm.digest_len(),
                        actual: raw.digest().len(),
                    });
                }
                Ok(Self(raw))
            }
        }
    }

    pub(crate) fn as_raw(&self) -> &RawMultihash {
        &self.0
    }

    /// The hash function, or `None` for identity.
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_code(self.0.code()).ok()
    }

    pub fn code(&self) -> u64 {
        self.0.code()
    }

    pub fn digest(&self) -> &[u8] {
        self.0.digest()
    }

    pub fn is_identity(&self) -> bool {
        self.0.code() == IDENTITY_CODE
    }

    /// Check that `data` hashes to this multihash.
    pub fn verify(&self, data: &[u8]) -> bool {
        match self.algorithm() {
            Some(algorithm) => algorithm.digest(data) == *self,
            None => self.digest() == data,
        }
    }

    /// Binary form: `varint(code) varint(len) digest`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Parse the binary form, requiring that all of `data` is consumed.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        let raw = RawMultihash::from_bytes(data)
            .map_err(|e| TypeError::InvalidMultihash(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Hex of the binary form. Used as the on-disk store key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// First 4 digest bytes as hex, for logs.
    pub fn short_hex(&self) -> String {
        let digest = self.digest();
        hex::encode(&digest[..digest.len().min(4)])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm() {
            Some(algorithm) => write!(f, "Multihash({algorithm}:{})", self.short_hex()),
            None => write!(f, "Multihash(identity:{})", self.short_hex()),
        }
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Multihash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Multihash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::de::Deserialize::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = HashAlgorithm::Sha2_256.digest(b"hello world");
        let b = HashAlgorithm::Sha2_256.digest(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn sha256_known_vector() {
        let mh = HashAlgorithm::Sha2_256.digest(b"");
        assert_eq!(
            hex::encode(mh.digest()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(mh.to_hex().starts_with("1220"));
        assert_eq!(mh.algorithm(), Some(HashAlgorithm::Sha2_256));
    }

    #[test]
    fn blake3_known_vector() {
        let mh = HashAlgorithm::Blake3.digest(b"");
        assert_eq!(
            hex::encode(mh.digest()),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
        assert!(mh.to_hex().starts_with("1e20"));
    }

    #[test]
    fn verify_detects_tampering() {
        let mh = HashAlgorithm::Sha2_256.digest(b"original");
        assert!(mh.verify(b"original"));
        assert!(!mh.verify(b"tampered"));
    }

    #[test]
    fn identity_embeds_payload() {
        let mh = Multihash::identity(b"tiny").unwrap();
        assert!(mh.is_identity());
        assert_eq!(mh.algorithm(), None);
        assert_eq!(mh.digest(), b"tiny");
        assert!(mh.verify(b"tiny"));
        assert!(!mh.verify(b"tin"));
    }

    #[test]
    fn oversized_identity_rejected() {
        assert_eq!(
            Multihash::identity(&[0u8; 65]).unwrap_err(),
            TypeError::IdentityTooLarge(65)
        );
        assert!(Multihash::identity(&[0u8; 64]).is_ok());
    }

    #[test]
    fn wrong_digest_length_rejected() {
        let err = Multihash::new(HashAlgorithm::Sha2_256, vec![0; 31]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidDigestLength { expected: 32, actual: 31, .. }));
    }

    #[test]
    fn hex_and_serde_roundtrip() {
        let mh = HashAlgorithm::Blake3.digest(b"key");
        assert_eq!(Multihash::from_hex(&mh.to_hex()).unwrap(), mh);
        let encoded = bincode::serialize(&mh).unwrap();
        assert_eq!(bincode::deserialize::<Multihash>(&encoded).unwrap(), mh);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = HashAlgorithm::Sha2_256.digest(b"x").to_bytes();
        bytes.push(0);
        assert!(matches!(
            Multihash::from_bytes(&bytes).unwrap_err(),
            TypeError::InvalidMultihash(_)
        ));
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(
            Multihash::from_bytes(&[0x13, 0x00]).unwrap_err(),
            TypeError::UnsupportedHash(0x13)
        );
    }
}
