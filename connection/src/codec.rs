//! Message body codecs.
//!
//! The transport treats frame bodies as opaque bytes and hands them to a
//! [`FrameCodec`] for decoding. Which shape the codec decodes depends on
//! whether the handshake layer has marked the connection authenticated.
//!
//! [`EnvelopeCodec`] is a small concrete codec for the overlay envelope:
//!
//! * pre-authentication [`Message`]: `kind (u32 BE) || payload`
//! * [`AuthenticatedMessage`]: `sequence (u64 BE) || Message || mac (32 bytes)`

use std::fmt;

/// Size of the message authentication code trailing an authenticated envelope.
pub const MAC_SIZE: usize = 32;

const KIND_SIZE: usize = 4;
const SEQUENCE_SIZE: usize = 8;

/// Errors raised by a codec rejecting a frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body ended before the structure was complete.
    Truncated {
        /// Minimum number of bytes the structure requires.
        needed: usize,
        /// Number of bytes that were available.
        available: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "Truncated message body: needed {needed} bytes, got {available}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encodes and decodes message bodies carried in frames.
///
/// Implementations must be pure functions of their input; the transport may
/// call them from any connection task.
pub trait FrameCodec: Send + Sync + 'static {
    /// Decoded message type handed to the dispatcher.
    type Message: Send + 'static;

    /// Decode a frame body.
    ///
    /// `authenticated` selects between the pre-authentication shape and the
    /// authenticated envelope.
    fn decode(&self, body: &[u8], authenticated: bool) -> Result<Self::Message, DecodeError>;

    /// Encode a message into a frame body (without the length header).
    fn encode(&self, message: &Self::Message) -> Vec<u8>;
}

/// A bare overlay message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type discriminant.
    pub kind: u32,
    /// Type specific payload.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message of type `kind`.
    pub fn new(kind: u32, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kind.to_be_bytes());
        out.extend_from_slice(&self.payload);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < KIND_SIZE {
            return Err(DecodeError::Truncated {
                needed: KIND_SIZE,
                available: bytes.len(),
            });
        }
        let (kind, payload) = bytes.split_at(KIND_SIZE);
        Ok(Self {
            kind: u32::from_be_bytes([kind[0], kind[1], kind[2], kind[3]]),
            payload: payload.to_vec(),
        })
    }
}

/// A message wrapped with authentication metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedMessage {
    /// Per-connection sequence number.
    pub sequence: u64,
    /// The wrapped message.
    pub message: Message,
    /// Authentication code over sequence and message.
    pub mac: [u8; MAC_SIZE],
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Sent before the handshake completes.
    Plain(Message),
    /// Sent once the connection is authenticated.
    Authenticated(AuthenticatedMessage),
}

/// Codec for the overlay [`Envelope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create the codec. It holds no state.
    pub fn new() -> Self {
        Self
    }
}

impl FrameCodec for EnvelopeCodec {
    type Message = Envelope;

    fn decode(&self, body: &[u8], authenticated: bool) -> Result<Envelope, DecodeError> {
        if !authenticated {
            return Message::decode(body).map(Envelope::Plain);
        }

        let minimum = SEQUENCE_SIZE + KIND_SIZE + MAC_SIZE;
        if body.len() < minimum {
            return Err(DecodeError::Truncated {
                needed: minimum,
                available: body.len(),
            });
        }

        let (sequence, rest) = body.split_at(SEQUENCE_SIZE);
        let (message, mac_bytes) = rest.split_at(rest.len() - MAC_SIZE);
        let mut sequence_bytes = [0u8; SEQUENCE_SIZE];
        sequence_bytes.copy_from_slice(sequence);
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(mac_bytes);

        Ok(Envelope::Authenticated(AuthenticatedMessage {
            sequence: u64::from_be_bytes(sequence_bytes),
            message: Message::decode(message)?,
            mac,
        }))
    }

    fn encode(&self, envelope: &Envelope) -> Vec<u8> {
        match envelope {
            Envelope::Plain(message) => {
                let mut out = Vec::with_capacity(KIND_SIZE + message.payload.len());
                message.encode_into(&mut out);
                out
            }
            Envelope::Authenticated(authenticated) => {
                let mut out = Vec::with_capacity(
                    SEQUENCE_SIZE + KIND_SIZE + authenticated.message.payload.len() + MAC_SIZE,
                );
                out.extend_from_slice(&authenticated.sequence.to_be_bytes());
                authenticated.message.encode_into(&mut out);
                out.extend_from_slice(&authenticated.mac);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_decode() {
        let codec = EnvelopeCodec::new();
        let body = [0, 0, 0, 7, 0xde, 0xad];
        let decoded = codec.decode(&body, false).unwrap();
        assert_eq!(decoded, Envelope::Plain(Message::new(7, vec![0xde, 0xad])));
    }

    #[test]
    fn test_authenticated_message_decode() {
        let codec = EnvelopeCodec::new();
        let envelope = Envelope::Authenticated(AuthenticatedMessage {
            sequence: 9,
            message: Message::new(3, b"hello".to_vec()),
            mac: [0xab; MAC_SIZE],
        });
        let body = codec.encode(&envelope);
        assert_eq!(body.len(), 8 + 4 + 5 + MAC_SIZE);
        assert_eq!(codec.decode(&body, true).unwrap(), envelope);
    }

    #[test]
    fn test_authentication_flag_selects_shape() {
        let codec = EnvelopeCodec::new();
        // A plain body is too short to be an authenticated envelope.
        let body = codec.encode(&Envelope::Plain(Message::new(1, vec![1, 2, 3])));
        assert_eq!(
            codec.decode(&body, true),
            Err(DecodeError::Truncated {
                needed: 8 + 4 + MAC_SIZE,
                available: 7,
            })
        );
        assert!(codec.decode(&body, false).is_ok());
    }

    #[test]
    fn test_empty_body_is_corrupt() {
        let codec = EnvelopeCodec::new();
        assert_eq!(
            codec.decode(&[], false),
            Err(DecodeError::Truncated {
                needed: 4,
                available: 0,
            })
        );
    }
}
