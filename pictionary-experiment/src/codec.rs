//! Drawing payloads travel as standard base64 over the live channel and are
//! stored decoded.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

pub fn encode_drawing(svg: &[u8]) -> String {
    STANDARD.encode(svg)
}

pub fn decode_drawing(payload: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(payload.trim())?)
}
