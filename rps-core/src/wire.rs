//! Framing: `<sender>: RPS:<purpose><version><NNN>[payload]\r\n`, ASCII, one frame per radio packet.

use tracing::warn;

use crate::protocol::{
    Body, GameNumber, Message, Purpose, WireMove, MAX_MESSAGE_LEN, PROTOCOL_TAG, PROTOCOL_VERSION,
};

const ESC: u8 = 0x1B;
/// `ESC [ 0 m`, the colour reset some chat clients put before the colon.
const COLOR_RESET_LEN: usize = 4;
/// `ESC [ n ; n n m`, the colour escape some chat clients put before the name.
const COLOR_PREFIX_LEN: usize = 7;
const LINE_END: &[u8] = b"\r\n";
/// purpose + version + three digits
const FIXED_FIELDS_LEN: usize = 5;

/// Encode a message into a single frame. Only a Join/Join-Acknowledge contact is ever shortened
/// to fit `MAX_MESSAGE_LEN`; fixed-width fields are never cut.
pub fn encode(msg: &Message) -> Result<Vec<u8>, EncodeError> {
    if msg.sender.bytes().any(|b| b == b':' || b == b'\r' || b == b'\n') {
        return Err(EncodeError::InvalidSender);
    }
    let mut out = Vec::with_capacity(MAX_MESSAGE_LEN);
    out.extend_from_slice(msg.sender.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(PROTOCOL_TAG.as_bytes());
    out.push(b':');
    out.push(msg.purpose().code());
    out.push(msg.version);
    out.extend_from_slice(msg.game_number.to_string().as_bytes());

    let fixed_payload = usize::from(matches!(msg.body, Body::Move(_)));
    if out.len() + fixed_payload + LINE_END.len() > MAX_MESSAGE_LEN {
        return Err(EncodeError::HeaderTooLong(out.len()));
    }

    match &msg.body {
        Body::Move(m) => out.push(m.code()),
        Body::Join { contact } | Body::JoinAck { contact } => {
            if contact.bytes().any(|b| b == b'\r' || b == b'\n') {
                return Err(EncodeError::InvalidContact);
            }
            let room = MAX_MESSAGE_LEN - LINE_END.len() - out.len();
            let kept = truncate_on_char_boundary(contact, room);
            if kept.len() < contact.len() {
                warn!(
                    "outgoing {:?} frame longer than {} bytes, contact truncated",
                    msg.purpose(),
                    MAX_MESSAGE_LEN
                );
            }
            out.extend_from_slice(kept.as_bytes());
        }
        Body::Beacon | Body::WithdrawBeacon | Body::PlayAgain | Body::Quit => {}
    }
    out.extend_from_slice(LINE_END);
    Ok(out)
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Error encoding a message into a frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("sender name must not contain ':' or line breaks")]
    InvalidSender,
    #[error("contact must not contain line breaks")]
    InvalidContact,
    #[error("fixed fields need {0} bytes, frame cannot fit them")]
    HeaderTooLong(usize),
}

/// Decode one frame. Bytes past `MAX_MESSAGE_LEN` are ignored.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let buf = &bytes[..bytes.len().min(MAX_MESSAGE_LEN)];
    let colon = buf
        .iter()
        .position(|&b| b == b':')
        .ok_or(DecodeError::MissingNameSeparator)?;

    let (name, mut index) = if colon > 10 && has_color_prefix(buf) {
        let end = buf[COLOR_PREFIX_LEN..]
            .iter()
            .position(|&b| b == b':' || b == ESC)
            .map_or(buf.len(), |p| p + COLOR_PREFIX_LEN);
        let mut index = end;
        if buf.get(index) == Some(&ESC) {
            index += COLOR_RESET_LEN;
        }
        (&buf[COLOR_PREFIX_LEN..end], index)
    } else {
        (&buf[..colon], colon)
    };

    if buf.get(index) != Some(&b':') {
        return Err(DecodeError::MissingNameSeparator);
    }
    index += 1;
    if buf.get(index) != Some(&b' ') {
        return Err(DecodeError::MissingSpace);
    }
    index += 1;

    let tag = PROTOCOL_TAG.as_bytes();
    if !buf[index..].starts_with(tag) || buf.get(index + tag.len()) != Some(&b':') {
        return Err(DecodeError::WrongTag);
    }
    index += tag.len() + 1;

    let (purpose_code, version) = match buf.get(index..index + 2) {
        Some(&[p, v]) => (p, v),
        _ => return Err(DecodeError::Truncated),
    };
    index += 2;

    let digits = buf
        .get(index..index + 3)
        .filter(|d| d.iter().all(u8::is_ascii_digit))
        .ok_or(DecodeError::BadGameNumber)?;
    let n = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    let game_number = GameNumber::new(n).ok_or(DecodeError::BadGameNumber)?;
    index += FIXED_FIELDS_LEN - 2;

    let purpose = Purpose::from_code(purpose_code).ok_or(DecodeError::UnknownPurpose {
        purpose: purpose_code,
        version,
    })?;

    let body = match purpose {
        Purpose::Move => {
            let code = *buf.get(index).ok_or(DecodeError::Truncated)?;
            Body::Move(WireMove::from_code(code).ok_or(DecodeError::BadMove(code))?)
        }
        Purpose::Beacon => Body::Beacon,
        Purpose::WithdrawBeacon => Body::WithdrawBeacon,
        Purpose::PlayAgain => Body::PlayAgain,
        Purpose::Quit => Body::Quit,
        Purpose::Join => Body::Join {
            contact: read_contact(buf, index)?,
        },
        Purpose::JoinAck => Body::JoinAck {
            contact: read_contact(buf, index)?,
        },
    };

    Ok(Message {
        sender: String::from_utf8_lossy(name).into_owned(),
        version,
        game_number,
        body,
    })
}

fn has_color_prefix(buf: &[u8]) -> bool {
    buf.len() > COLOR_PREFIX_LEN
        && buf[0] == ESC
        && buf[1] == b'['
        && buf[3] == b';'
        && buf[6] == b'm'
}

fn read_contact(buf: &[u8], start: usize) -> Result<String, DecodeError> {
    if start >= buf.len() {
        return Err(DecodeError::Truncated);
    }
    let rest = &buf[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Why a frame was dropped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no ':' after sender name")]
    MissingNameSeparator,
    #[error("missing ' ' after sender name")]
    MissingSpace,
    #[error("not an RPS frame")]
    WrongTag,
    #[error("frame ends early")]
    Truncated,
    #[error("game number is not three digits")]
    BadGameNumber,
    #[error("unknown move code {0:#04x}")]
    BadMove(u8),
    #[error("unknown purpose {purpose:#04x} at version {version:#04x}")]
    UnknownPurpose { purpose: u8, version: u8 },
}

impl DecodeError {
    /// An unknown purpose from a newer protocol version is expected noise, not a fault.
    pub fn is_forward_compatible(&self) -> bool {
        matches!(self, DecodeError::UnknownPurpose { version, .. } if *version > PROTOCOL_VERSION)
    }

    /// Unknown purpose at a version we should fully understand.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, DecodeError::UnknownPurpose { version, .. } if *version <= PROTOCOL_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Hand;

    fn game(n: u16) -> GameNumber {
        GameNumber::new(n).unwrap()
    }

    fn every_body() -> Vec<Body> {
        let mut bodies = vec![
            Body::Beacon,
            Body::WithdrawBeacon,
            Body::PlayAgain,
            Body::Quit,
            Body::Move(WireMove::Count1),
            Body::Move(WireMove::Count2),
            Body::Join {
                contact: "NAlice".to_string(),
            },
            Body::JoinAck {
                contact: String::new(),
            },
        ];
        bodies.extend(Hand::ALL.map(|h| Body::Move(WireMove::Throw(h))));
        bodies
    }

    #[test]
    fn roundtrip_every_purpose() {
        for body in every_body() {
            for n in [0, 7, 42, 999] {
                let msg = Message::new("Flipper1", game(n), body.clone());
                let frame = encode(&msg).unwrap();
                assert!(frame.len() <= MAX_MESSAGE_LEN);
                assert_eq!(decode(&frame).unwrap(), msg);
            }
        }
    }

    #[test]
    fn encodes_expected_text() {
        let msg = Message::new("YourFlip", game(42), Body::Move(WireMove::Throw(Hand::Rock)));
        assert_eq!(encode(&msg).unwrap(), b"YourFlip: RPS:MA042R\r\n");
        let msg = Message::new(
            "YourFlip",
            game(42),
            Body::Join {
                contact: "NYourNameHere".to_string(),
            },
        );
        assert_eq!(encode(&msg).unwrap(), b"YourFlip: RPS:JA042NYourNameHere\r\n");
    }

    #[test]
    fn missing_colon_is_dropped() {
        assert_eq!(
            decode(b"Bob NO_COLON_HERE"),
            Err(DecodeError::MissingNameSeparator)
        );
    }

    #[test]
    fn missing_space_is_dropped() {
        assert_eq!(decode(b"Bob:RPS:BA042\r\n"), Err(DecodeError::MissingSpace));
    }

    #[test]
    fn wrong_tag_is_dropped() {
        assert_eq!(decode(b"Bob: hello there\r\n"), Err(DecodeError::WrongTag));
        assert_eq!(decode(b"Bob: RPSX:BA042\r\n"), Err(DecodeError::WrongTag));
    }

    #[test]
    fn bad_game_number_is_dropped() {
        assert_eq!(decode(b"Bob: RPS:BA4x2\r\n"), Err(DecodeError::BadGameNumber));
        assert_eq!(decode(b"Bob: RPS:BA42"), Err(DecodeError::BadGameNumber));
    }

    #[test]
    fn truncated_fields_are_dropped() {
        assert_eq!(decode(b"Bob: RPS:B"), Err(DecodeError::Truncated));
        assert_eq!(decode(b"Bob: RPS:MA042"), Err(DecodeError::Truncated));
        assert_eq!(decode(b"Bob: RPS:JA042"), Err(DecodeError::Truncated));
        assert_eq!(decode(b"Bob: RPS:MA042X"), Err(DecodeError::BadMove(b'X')));
    }

    #[test]
    fn unknown_purpose_is_classified_by_version() {
        let known = decode(b"Bob: RPS:ZA042\r\n").unwrap_err();
        assert!(known.is_protocol_error());
        assert!(!known.is_forward_compatible());

        let older = decode(b"Bob: RPS:Z0042\r\n").unwrap_err();
        assert!(older.is_protocol_error());

        let newer = decode(b"Bob: RPS:ZB042\r\n").unwrap_err();
        assert!(newer.is_forward_compatible());
        assert!(!newer.is_protocol_error());
    }

    #[test]
    fn newer_version_with_known_purpose_still_decodes() {
        let msg = decode(b"Bob: RPS:BB042\r\n").unwrap();
        assert_eq!(msg.version, b'B');
        assert_eq!(msg.body, Body::Beacon);
    }

    #[test]
    fn color_wrapped_sender_is_unwrapped() {
        let frame = b"\x1b[0;33mChatUser\x1b[0m: RPS:BA007\r\n";
        let msg = decode(frame).unwrap();
        assert_eq!(msg.sender, "ChatUser");
        assert_eq!(msg.game_number, game(7));
        assert_eq!(msg.body, Body::Beacon);
    }

    #[test]
    fn contact_stops_at_line_break() {
        let msg = decode(b"Bob: RPS:AA042NBob\rtrailing").unwrap();
        assert_eq!(
            msg.body,
            Body::JoinAck {
                contact: "NBob".to_string()
            }
        );
    }

    #[test]
    fn oversized_contact_is_truncated_to_frame() {
        let msg = Message::new(
            "Bob",
            game(1),
            Body::Join {
                contact: "x".repeat(100),
            },
        );
        let frame = encode(&msg).unwrap();
        assert_eq!(frame.len(), MAX_MESSAGE_LEN);
        assert!(frame.ends_with(b"\r\n"));
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.game_number, game(1));
        match decoded.body {
            Body::Join { contact } => assert!(contact.len() < 100),
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn oversized_header_is_refused() {
        let msg = Message::new("n".repeat(55), game(1), Body::Beacon);
        assert!(matches!(encode(&msg), Err(EncodeError::HeaderTooLong(_))));
    }

    #[test]
    fn invalid_sender_is_refused() {
        let msg = Message::new("a:b", game(1), Body::Beacon);
        assert_eq!(encode(&msg), Err(EncodeError::InvalidSender));
    }

    #[test]
    fn bytes_past_max_len_are_ignored() {
        let mut frame = b"Bob: RPS:JA042".to_vec();
        frame.extend(std::iter::repeat(b'c').take(100));
        let msg = decode(&frame).unwrap();
        match msg.body {
            Body::Join { contact } => assert_eq!(contact.len(), MAX_MESSAGE_LEN - 14),
            other => panic!("expected Join, got {other:?}"),
        }
    }
}
