// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Canonical wire envelope: `{nonce, depth, payload, origin}`.
//!
//! Encoding is hand-rolled rather than derived, because the framing rules
//! are part of the contract, not an implementation detail: decode must
//! reject a declared payload length that disagrees with the remaining
//! bytes, and must tolerate (ignore) unknown trailing fields a newer
//! sender might add, while encode never produces them.

use thiserror::Error;

use crate::core::address_book::Address;

/// Maximum payload size accepted by [`Envelope::decode`], independent of
/// the caller-provided `max_envelope_bytes` budget (defence in depth).
pub const HARD_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Envelope codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Buffer too short to contain the fixed header.
    #[error("envelope truncated")]
    Truncated,
    /// Declared payload length disagrees with the remaining bytes.
    #[error("malformed envelope: declared payload length does not match buffer")]
    LengthMismatch,
    /// Declared payload length exceeds the configured maximum.
    #[error("envelope payload exceeds max_envelope_bytes")]
    TooLarge,
}

const HEADER_LEN: usize = 8 /* nonce */ + 4 /* depth */ + 32 /* origin */ + 4 /* payload_len */;

/// The wire message RainTree forwards. Never inspected by the overlay
/// beyond its own fields — `payload` is opaque application data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Dedup key; uniformly random per originated message, unchanged on forwards.
    pub nonce: u64,
    /// Remaining forwarding budget; strictly decreases along any path.
    pub depth: u32,
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Informational: who originated this message. Not part of the dedup key.
    pub origin: Address,
}

impl Envelope {
    /// Canonical length-prefixed encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.depth.to_le_bytes());
        out.extend_from_slice(self.origin.as_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode, rejecting anything whose declared payload length doesn't
    /// match the remaining bytes. Trailing bytes *after* a well-formed
    /// envelope are treated as unknown forward-compatible fields and
    /// silently ignored rather than causing a decode failure.
    pub fn decode(buf: &[u8], max_envelope_bytes: usize) -> Result<Self, EnvelopeError> {
        if buf.len() < HEADER_LEN {
            return Err(EnvelopeError::Truncated);
        }

        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&buf[0..8]);
        let nonce = u64::from_le_bytes(nonce_bytes);

        let mut depth_bytes = [0u8; 4];
        depth_bytes.copy_from_slice(&buf[8..12]);
        let depth = u32::from_le_bytes(depth_bytes);

        let mut origin_bytes = [0u8; 32];
        origin_bytes.copy_from_slice(&buf[12..44]);
        let origin = Address::from_bytes(origin_bytes);

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[44..48]);
        let payload_len = u32::from_le_bytes(len_bytes) as usize;

        let max = max_envelope_bytes.min(HARD_MAX_PAYLOAD_BYTES);
        if payload_len > max {
            return Err(EnvelopeError::TooLarge);
        }

        let remaining = buf.len() - HEADER_LEN;
        if payload_len > remaining {
            return Err(EnvelopeError::LengthMismatch);
        }

        let payload = buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec();
        // Anything past `HEADER_LEN + payload_len` is an unknown trailing
        // field from a newer sender; ignored on purpose.

        Ok(Self {
            nonce,
            depth,
            payload,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Address {
        Address::from_bytes([7u8; 32])
    }

    #[test]
    fn round_trips() {
        let env = Envelope {
            nonce: 0xdead_beef_u64,
            depth: 3,
            payload: b"hello raintree".to_vec(),
            origin: origin(),
        };
        let bytes = env.encode();
        let decoded = Envelope::decode(&bytes, 1 << 20).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn rejects_truncated_header() {
        let err = Envelope::decode(&[1, 2, 3], 1 << 20).unwrap_err();
        assert_eq!(err, EnvelopeError::Truncated);
    }

    #[test]
    fn rejects_length_mismatch() {
        let env = Envelope {
            nonce: 1,
            depth: 1,
            payload: b"abc".to_vec(),
            origin: origin(),
        };
        let mut bytes = env.encode();
        bytes.truncate(bytes.len() - 1); // drop the last payload byte
        let err = Envelope::decode(&bytes, 1 << 20).unwrap_err();
        assert_eq!(err, EnvelopeError::LengthMismatch);
    }

    #[test]
    fn rejects_oversized_payload() {
        let env = Envelope {
            nonce: 1,
            depth: 1,
            payload: vec![0u8; 100],
            origin: origin(),
        };
        let bytes = env.encode();
        let err = Envelope::decode(&bytes, 10).unwrap_err();
        assert_eq!(err, EnvelopeError::TooLarge);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let env = Envelope {
            nonce: 1,
            depth: 1,
            payload: b"abc".to_vec(),
            origin: origin(),
        };
        let mut bytes = env.encode();
        bytes.extend_from_slice(b"future-field-from-newer-sender");
        let decoded = Envelope::decode(&bytes, 1 << 20).unwrap();
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn encode_never_produces_trailing_fields() {
        let env = Envelope {
            nonce: 42,
            depth: 2,
            payload: b"xyz".to_vec(),
            origin: origin(),
        };
        assert_eq!(env.encode().len(), HEADER_LEN + 3);
    }
}
