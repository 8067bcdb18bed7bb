//! Pairing payloads: QR code, RSA exchange, client settings and `Pair`

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::{
    HANDSHAKE_TYPE, PEER_ID_LEN, ProtocolError, ProtocolResult, QR_KEY_LEN, RSA_EXPONENT_LEN,
    RSA_MODULUS_LEN,
};

/// Contents of a scanned pairing QR code
///
/// Layout: `type(1) ‖ qr_key(24) ‖ server_id(8) ‖ entry_point(utf-8)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub qr_key: [u8; QR_KEY_LEN],
    pub server_id: [u8; PEER_ID_LEN],
    pub entry_point: String,
}

impl QrPayload {
    const HEADER_LEN: usize = 1 + QR_KEY_LEN + PEER_ID_LEN;

    /// Decode the base64 text carried by the QR code
    pub fn from_base64(text: &str) -> ProtocolResult<Self> {
        let raw = BASE64.decode(text.trim())?;
        Self::parse(&raw)
    }

    pub fn parse(data: &[u8]) -> ProtocolResult<Self> {
        let kind = *data.first().ok_or(ProtocolError::Truncated {
            what: "QR payload",
            needed: Self::HEADER_LEN,
            actual: 0,
        })?;
        if kind != HANDSHAKE_TYPE {
            return Err(ProtocolError::UnsupportedQrType(kind));
        }
        if data.len() < Self::HEADER_LEN {
            return Err(ProtocolError::Truncated {
                what: "QR payload",
                needed: Self::HEADER_LEN,
                actual: data.len(),
            });
        }

        let mut qr_key = [0u8; QR_KEY_LEN];
        qr_key.copy_from_slice(&data[1..1 + QR_KEY_LEN]);
        let mut server_id = [0u8; PEER_ID_LEN];
        server_id.copy_from_slice(&data[1 + QR_KEY_LEN..Self::HEADER_LEN]);
        let entry_point = String::from_utf8_lossy(&data[Self::HEADER_LEN..]).into_owned();

        Ok(Self {
            qr_key,
            server_id,
            entry_point,
        })
    }

    /// Server id as shown to users and sent in the `sid` query parameter
    pub fn server_id_hex(&self) -> String {
        hex::encode(self.server_id)
    }
}

/// Remote device public key, received XOR-protected under the QR key
///
/// Layout: `type(1) ‖ modulus(256) ‖ exponent(3)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExchangePayload {
    pub modulus: Vec<u8>,
    pub exponent: [u8; RSA_EXPONENT_LEN],
}

impl KeyExchangePayload {
    const LEN: usize = 1 + RSA_MODULUS_LEN + RSA_EXPONENT_LEN;

    pub fn parse(data: &[u8]) -> ProtocolResult<Self> {
        let kind = *data.first().ok_or(ProtocolError::Truncated {
            what: "key exchange payload",
            needed: Self::LEN,
            actual: 0,
        })?;
        if kind != HANDSHAKE_TYPE {
            return Err(ProtocolError::UnsupportedHandshakeType(kind));
        }
        if data.len() < Self::LEN {
            return Err(ProtocolError::Truncated {
                what: "key exchange payload",
                needed: Self::LEN,
                actual: data.len(),
            });
        }

        let modulus = data[1..1 + RSA_MODULUS_LEN].to_vec();
        let mut exponent = [0u8; RSA_EXPONENT_LEN];
        exponent.copy_from_slice(&data[1 + RSA_MODULUS_LEN..Self::LEN]);
        Ok(Self { modulus, exponent })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(HANDSHAKE_TYPE);
        out.extend_from_slice(&self.modulus);
        out.extend_from_slice(&self.exponent);
        out
    }
}

/// Client settings announced with `SetClient`, before RSA encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub chunk_size: u32,
    pub thumbnail_size: u16,
    /// Raw big-endian RSA modulus of this client
    pub public_key: Vec<u8>,
}

impl ClientSettings {
    pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024;
    pub const DEFAULT_THUMBNAIL_SIZE: u16 = 80;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.public_key.len());
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(&self.thumbnail_size.to_le_bytes());
        out.extend_from_slice(&self.public_key);
        out
    }

    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() < 6 {
            return Err(ProtocolError::Truncated {
                what: "client settings",
                needed: 6,
                actual: data.len(),
            });
        }
        Ok(Self {
            chunk_size: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            thumbnail_size: u16::from_le_bytes([data[4], data[5]]),
            public_key: data[6..].to_vec(),
        })
    }
}

/// Parameters of a `Pair` command sent by the remote device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRequest {
    pub client_id: Vec<u8>,
    /// Empty when the remote device falls back to the XOR cipher
    pub device_key: Vec<u8>,
    pub device_iv: Vec<u8>,
    pub challenge: Vec<u8>,
}

impl PairRequest {
    pub fn from_params(params: Vec<Vec<u8>>) -> ProtocolResult<Self> {
        let mut params = params.into_iter();
        let client_id = params
            .next()
            .ok_or(ProtocolError::MissingParameter("client id"))?;
        let device_key = params
            .next()
            .ok_or(ProtocolError::MissingParameter("device key"))?;
        let device_iv = params
            .next()
            .ok_or(ProtocolError::MissingParameter("device iv"))?;
        let challenge = params
            .next()
            .ok_or(ProtocolError::MissingParameter("auth challenge"))?;

        Ok(Self {
            client_id,
            device_key,
            device_iv,
            challenge,
        })
    }

    pub fn client_id_hex(&self) -> String {
        hex::encode(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_qr() -> Vec<u8> {
        let mut qr = vec![2u8];
        qr.extend_from_slice(&[0u8; QR_KEY_LEN]);
        qr.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        qr.extend_from_slice(b"relay.example");
        qr
    }

    #[test]
    fn test_parse_qr_payload() {
        let qr = QrPayload::parse(&sample_qr()).unwrap();
        assert_eq!(qr.qr_key, [0u8; QR_KEY_LEN]);
        assert_eq!(qr.server_id_hex(), "0102030405060708");
        assert_eq!(qr.entry_point, "relay.example");
    }

    #[test]
    fn test_parse_qr_from_base64() {
        let text = BASE64.encode(sample_qr());
        let qr = QrPayload::from_base64(&text).unwrap();
        assert_eq!(qr.entry_point, "relay.example");
    }

    #[test]
    fn test_qr_with_wrong_type_is_unsupported() {
        let mut qr = sample_qr();
        qr[0] = 1;
        assert!(matches!(
            QrPayload::parse(&qr),
            Err(ProtocolError::UnsupportedQrType(1))
        ));
    }

    #[test]
    fn test_truncated_qr_is_rejected() {
        assert!(matches!(
            QrPayload::parse(&[2, 0, 0]),
            Err(ProtocolError::Truncated { actual: 3, .. })
        ));
        assert!(QrPayload::parse(&[]).is_err());
    }

    #[test]
    fn test_key_exchange_payload() {
        let payload = KeyExchangePayload {
            modulus: vec![0xAB; RSA_MODULUS_LEN],
            exponent: [1, 0, 1],
        };
        let bytes = payload.encode();
        assert_eq!(bytes.len(), 260);
        assert_eq!(KeyExchangePayload::parse(&bytes).unwrap(), payload);

        let mut wrong = bytes.clone();
        wrong[0] = 7;
        assert!(matches!(
            KeyExchangePayload::parse(&wrong),
            Err(ProtocolError::UnsupportedHandshakeType(7))
        ));
        assert!(KeyExchangePayload::parse(&bytes[..100]).is_err());
    }

    #[test]
    fn test_client_settings_layout() {
        let settings = ClientSettings {
            chunk_size: ClientSettings::DEFAULT_CHUNK_SIZE,
            thumbnail_size: ClientSettings::DEFAULT_THUMBNAIL_SIZE,
            public_key: vec![9, 9],
        };
        let bytes = settings.encode();
        assert_eq!(bytes, vec![0x00, 0x00, 0x04, 0x00, 80, 0, 9, 9]);
        assert_eq!(ClientSettings::decode(&bytes).unwrap(), settings);
    }

    #[test]
    fn test_pair_request_needs_four_params() {
        let params = vec![vec![0xAA; 8], Vec::new(), vec![1; 16], vec![2; 16]];
        let pair = PairRequest::from_params(params).unwrap();
        assert_eq!(pair.client_id_hex(), "aaaaaaaaaaaaaaaa");
        assert!(pair.device_key.is_empty());

        let short = vec![vec![0xAA; 8], Vec::new()];
        assert!(matches!(
            PairRequest::from_params(short),
            Err(ProtocolError::MissingParameter("device iv"))
        ));
    }
}
