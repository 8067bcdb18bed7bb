//! Chunked upload messages

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ProtocolResult};

/// One chunk of a file, sent as the JSON payload of `SetFile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadChunk {
    pub full_name: String,
    /// Base64 of the chunk bytes
    pub data: String,
    /// 1-based chunk number
    pub chunk_part: u32,
    pub total_chunk: u32,
}

impl UploadChunk {
    pub fn new(full_name: impl Into<String>, chunk: &[u8], chunk_part: u32, total_chunk: u32) -> Self {
        Self {
            full_name: full_name.into(),
            data: BASE64.encode(chunk),
            chunk_part,
            total_chunk,
        }
    }

    /// UTF-8 JSON bytes, ready to be framed as a command payload
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn decode_data(&self) -> ProtocolResult<Vec<u8>> {
        Ok(BASE64.decode(&self.data)?)
    }
}

/// Remote acknowledgment of a chunk: `"<fullFileName>\t<chunkNumber>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    pub full_name: String,
    pub chunk_number: u32,
}

impl UploadAck {
    pub fn parse(param: &[u8]) -> ProtocolResult<Self> {
        let text = String::from_utf8_lossy(param);
        let mut parts = text.split('\t');
        let (Some(name), Some(number), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ProtocolError::MalformedAck(text.to_string()));
        };
        let chunk_number = number
            .trim()
            .parse()
            .map_err(|_| ProtocolError::MalformedAck(text.to_string()))?;

        Ok(Self {
            full_name: name.to_string(),
            chunk_number,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        format!("{}\t{}", self.full_name, self.chunk_number).into_bytes()
    }
}
