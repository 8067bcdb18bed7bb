//! Command framing and length-prefixed parameter blocks

use crate::{ProtocolError, ProtocolResult};

/// Prefix a payload with its little-endian command id
pub fn encode_command(command_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&command_id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Decrypted response body: command id followed by parameter blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub command_id: i32,
    pub body: Vec<u8>,
}

impl ResponseFrame {
    /// Split the 4-byte command header off a decrypted response
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        let header = read_i32_le(data, 0, "response header")?;
        Ok(Self {
            command_id: header,
            body: data[4..].to_vec(),
        })
    }

    /// Parse the body as length-prefixed parameters
    pub fn params(&self) -> ProtocolResult<Vec<Vec<u8>>> {
        split_params(&self.body)
    }
}

/// Split `int32LE(len) ‖ bytes` blocks until the buffer is exhausted
pub fn split_params(data: &[u8]) -> ProtocolResult<Vec<Vec<u8>>> {
    let mut params = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let declared = read_i32_le(data, offset, "parameter length")?;
        offset += 4;

        // Negative lengths become huge and fail the bounds check below.
        let len = declared as u32 as usize;
        let end = offset.saturating_add(len);
        if end > data.len() {
            return Err(ProtocolError::Truncated {
                what: "parameter",
                needed: len,
                actual: data.len() - offset,
            });
        }

        params.push(data[offset..end].to_vec());
        offset = end;
    }

    Ok(params)
}

/// Inverse of [`split_params`]
pub fn join_params(params: &[&[u8]]) -> Vec<u8> {
    let total = params.iter().map(|p| 4 + p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for param in params {
        out.extend_from_slice(&(param.len() as i32).to_le_bytes());
        out.extend_from_slice(param);
    }
    out
}

fn read_i32_le(data: &[u8], offset: usize, what: &'static str) -> ProtocolResult<i32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(ProtocolError::Truncated {
            what,
            needed: 4,
            actual: data.len().saturating_sub(offset),
        })?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_header_is_little_endian() {
        let frame = encode_command(8, b"abc");
        assert_eq!(frame, vec![8, 0, 0, 0, b'a', b'b', b'c']);
        assert_eq!(encode_command(1, &[]), vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_decode_response_frame() {
        let mut data = 2i32.to_le_bytes().to_vec();
        data.extend(join_params(&[b"client", b"", b"iv"]));

        let frame = ResponseFrame::decode(&data).unwrap();
        assert_eq!(frame.command_id, 2);
        let params = frame.params().unwrap();
        assert_eq!(params, vec![b"client".to_vec(), Vec::new(), b"iv".to_vec()]);
    }

    #[test]
    fn test_short_header_is_rejected() {
        let err = ResponseFrame::decode(&[1, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { needed: 4, actual: 2, .. }));
    }

    #[test]
    fn test_overrunning_parameter_is_rejected() {
        let mut data = 10i32.to_le_bytes().to_vec();
        data.extend_from_slice(b"short");
        assert!(matches!(
            split_params(&data),
            Err(ProtocolError::Truncated { needed: 10, actual: 5, .. })
        ));
    }

    #[test]
    fn test_empty_body_has_no_params() {
        assert!(split_params(&[]).unwrap().is_empty());
    }
}
