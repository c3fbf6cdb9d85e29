// crates/lake-core/src/core/hashing.rs
// ============================================================================
// Module: Lake Key and Content Hashing
// Description: Surrogate key derivation and payload content hashing.
// Purpose: Provide durable, cross-process stable digests for entity storage.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Natural keys map to surrogate keys through SHA-256 over a versioned,
//! type-tagged, length-prefixed encoding, so `("a", "bc")` never collides
//! with `("ab", "c")`. The same encoding feeds [`attrs_hash`], which detects
//! no-op writes.
//!
//! Encoding v1, per value: one tag byte (`Null=0`, `Bool=1`, `Int=2`,
//! `Float=3`, `Text=4`), the payload length as big-endian `u64`, then the
//! payload (`Bool`: one byte, `Int`: `i64` big-endian, `Float`: IEEE bits
//! big-endian with NaN canonicalized, `Text`: UTF-8, `Null`: empty).
//! Surrogate keys are stored durably; the domain prefix must change whenever
//! the encoding does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::SurrogateKey;
use crate::core::value::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Domain prefix for surrogate key derivation.
pub const SURROGATE_KEY_DOMAIN: &[u8] = b"lake.entity-key.v1\0";
/// Domain prefix for payload content hashes.
pub const ATTRS_HASH_DOMAIN: &[u8] = b"lake.attrs.v1\0";

/// Type tag for [`Value::Null`].
const TAG_NULL: u8 = 0;
/// Type tag for [`Value::Bool`].
const TAG_BOOL: u8 = 1;
/// Type tag for [`Value::Int`].
const TAG_INT: u8 = 2;
/// Type tag for [`Value::Float`].
const TAG_FLOAT: u8 = 3;
/// Type tag for [`Value::Text`].
const TAG_TEXT: u8 = 4;

// ============================================================================
// SECTION: Natural Keys
// ============================================================================

/// Ordered natural-key values for an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalKey {
    /// Key parts in schema order.
    parts: Vec<Value>,
}

impl NaturalKey {
    /// Builds a natural key from ordered parts.
    pub fn new<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the key parts.
    #[must_use]
    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// Derives the surrogate key.
    #[must_use]
    pub fn to_surrogate(&self) -> SurrogateKey {
        surrogate_key(&self.parts)
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Derives the surrogate key for ordered natural-key values.
#[must_use]
pub fn surrogate_key(parts: &[Value]) -> SurrogateKey {
    let mut hasher = Sha256::new();
    hasher.update(SURROGATE_KEY_DOMAIN);
    let mut buffer = Vec::with_capacity(64);
    for part in parts {
        buffer.clear();
        encode_value(&mut buffer, part);
        hasher.update(&buffer);
    }
    SurrogateKey::new(hex_encode(&hasher.finalize()))
}

/// Hashes payload values plus the deletion flag into a signed 64-bit digest.
#[must_use]
pub fn attrs_hash(payload: &[Value], is_deleted: bool) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(ATTRS_HASH_DOMAIN);
    let mut buffer = Vec::with_capacity(64);
    for value in payload {
        buffer.clear();
        encode_value(&mut buffer, value);
        hasher.update(&buffer);
    }
    hasher.update([u8::from(is_deleted)]);
    let digest = hasher.finalize();
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[.. 8]);
    i64::from_be_bytes(head)
}

/// Appends the v1 encoding of a value.
pub fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => push_tagged(out, TAG_NULL, &[]),
        Value::Bool(flag) => push_tagged(out, TAG_BOOL, &[u8::from(*flag)]),
        Value::Int(number) => push_tagged(out, TAG_INT, &number.to_be_bytes()),
        Value::Float(number) => {
            let bits = if number.is_nan() { f64::NAN.to_bits() } else { number.to_bits() };
            push_tagged(out, TAG_FLOAT, &bits.to_be_bytes());
        }
        Value::Text(text) => push_tagged(out, TAG_TEXT, text.as_bytes()),
    }
}

/// Appends tag, big-endian length, and payload bytes.
fn push_tagged(out: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    let length = u64::try_from(payload.len()).unwrap_or(u64::MAX);
    out.push(tag);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(payload);
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
