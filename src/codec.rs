//! Token id <-> content id conversion.
//!
//! A token id is written as a 32-byte big-endian integer and base64url encoded
//! without padding, which yields the 43-character address shape used by the
//! storage network.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

use crate::models::TokenId;

pub const CONTENT_ID_LEN: usize = 43;
const RAW_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("content id must be {CONTENT_ID_LEN} characters, got {0}")]
    Length(usize),
    #[error("content id is not valid base64url")]
    Encoding,
    #[error("content id is outside the token id range")]
    OutOfRange,
}

pub fn token_to_content_id(token: TokenId) -> String {
    let mut raw = [0u8; RAW_LEN];
    raw[RAW_LEN - 16..].copy_from_slice(&token.0.to_be_bytes());
    URL_SAFE_NO_PAD.encode(raw)
}

pub fn content_id_to_token(id: &str) -> Result<TokenId, CodecError> {
    if id.len() != CONTENT_ID_LEN {
        return Err(CodecError::Length(id.len()));
    }
    let raw = URL_SAFE_NO_PAD.decode(id).map_err(|_| CodecError::Encoding)?;
    if raw.len() != RAW_LEN {
        return Err(CodecError::Encoding);
    }
    if raw[..RAW_LEN - 16].iter().any(|b| *b != 0) {
        return Err(CodecError::OutOfRange);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&raw[RAW_LEN - 16..]);
    Ok(TokenId(u128::from_be_bytes(low)))
}
