// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DER primitive codec for the replication feed.
//!
//! The upstream replication driver hands each fork value over as a single
//! ASN.1 DER primitive. Only the length forms the feed produces are
//! accepted: the short form, or the long form with one or two length
//! bytes. The tag byte is never interpreted.

use thiserror::Error;

/// Decode failures for a DER primitive.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerError {
    #[error("truncated DER header")]
    TruncatedHeader,
    #[error("unsupported DER length of {0} length bytes")]
    LengthOfLength(usize),
    #[error("DER payload of {expected} bytes exceeds buffer ({available} left)")]
    TruncatedPayload { expected: usize, available: usize },
    #[error("payload of {0} bytes does not fit a two-byte DER length")]
    Oversize(usize),
}

/// Decode one DER primitive, returning its payload.
///
/// Every read is bounds-checked against the end of `buf`; trailing bytes
/// after the payload are ignored.
pub fn parse(buf: &[u8]) -> Result<&[u8], DerError> {
    let [_tag, len0, rest @ ..] = buf else {
        return Err(DerError::TruncatedHeader);
    };
    let (len, body) = if len0 & 0x80 == 0 {
        (usize::from(*len0), rest)
    } else {
        match (usize::from(len0 & 0x7f), rest) {
            (1, [l0, body @ ..]) => (usize::from(*l0), body),
            (2, [l0, l1, body @ ..]) => ((usize::from(*l0) << 8) | usize::from(*l1), body),
            (1 | 2, _) => return Err(DerError::TruncatedHeader),
            (n, _) => return Err(DerError::LengthOfLength(n)),
        }
    };
    body.get(..len).ok_or(DerError::TruncatedPayload {
        expected: len,
        available: body.len(),
    })
}

/// Encode a payload as a DER OCTET STRING in the shortest length form.
///
/// The inverse of [`parse`], used to build feed values in fixtures and by
/// callers that synthesize forks. Payloads above 65535 bytes have no
/// two-byte length encoding.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, DerError> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(0x04);
    match payload.len() {
        n if n < 0x80 => out.push(n as u8),
        n if n <= 0xff => {
            out.push(0x81);
            out.push(n as u8);
        }
        n if n <= 0xffff => {
            out.push(0x82);
            out.push((n >> 8) as u8);
            out.push(n as u8);
        }
        n => return Err(DerError::Oversize(n)),
    }
    out.extend_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
#[path = "der_tests.rs"]
mod tests;
