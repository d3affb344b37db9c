//! Minimal BER wire codec for SNMPv2c trap messages.
//!
//! Only the encoding surface a trap emitter needs: OIDs, the value types
//! that appear in a notification, and the v2c message framing. Uses a
//! reverse buffer that writes from the end backwards, so constructed
//! types never need their content length pre-calculated.

use std::str::FromStr;

/// BER version field for a community-based SNMPv2c message.
pub const VERSION_V2C: i32 = 1;

/// BER tags used by trap messages (X.690 / RFC 3416).
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const TIMETICKS: u8 = 0x43;
    /// SNMPv2-Trap PDU (context-specific, constructed).
    pub const TRAP_V2: u8 = 0xA7;
}

/// An object identifier as a sequence of arcs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oid(Vec<u32>);

/// Error parsing a dotted-decimal OID string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid OID {input:?}: {reason}")]
pub struct OidParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Oid {
    /// Build an OID from raw arcs. Minimum two arcs, first arc 0-2.
    pub fn from_arcs(arcs: Vec<u32>) -> Result<Self, OidParseError> {
        let invalid = |reason| OidParseError {
            input: arcs
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join("."),
            reason,
        };
        if arcs.len() < 2 {
            return Err(invalid("an OID needs at least two arcs"));
        }
        if arcs[0] > 2 {
            return Err(invalid("first arc must be 0, 1, or 2"));
        }
        if arcs[0] < 2 && arcs[1] >= 40 {
            return Err(invalid("second arc must be below 40 for first arc 0 or 1"));
        }
        Ok(Self(arcs))
    }

    /// Known-good OID from static arcs. Callers guarantee validity.
    pub(crate) fn from_static(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// BER content bytes (without tag and length).
    pub fn to_ber(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 4);
        // First two arcs share one subidentifier.
        push_base128(&mut out, self.0[0] * 40 + self.0[1]);
        for arc in &self.0[2..] {
            push_base128(&mut out, *arc);
        }
        out
    }
}

fn push_base128(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
        return;
    }
    let mut chunks = [0u8; 5];
    let mut n = 0;
    let mut v = value;
    while v > 0 {
        chunks[n] = (v & 0x7F) as u8;
        v >>= 7;
        n += 1;
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(chunks[i] | continuation);
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(OidParseError {
                input: s.to_string(),
                reason: "empty OID",
            });
        }
        let mut arcs = Vec::new();
        for part in trimmed.split('.') {
            let arc = part.parse::<u32>().map_err(|_| OidParseError {
                input: s.to_string(),
                reason: "arc is not an unsigned integer",
            })?;
            arcs.push(arc);
        }
        Self::from_arcs(arcs).map_err(|e| OidParseError {
            input: s.to_string(),
            reason: e.reason,
        })
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

/// Value types that appear in an outgoing trap notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    TimeTicks(u32),
}

impl Value {
    fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::TIMETICKS, *v),
        }
    }
}

/// Buffer for BER encoding that writes backwards.
///
/// Content is written first, then wrapped with length and tag, so nested
/// SEQUENCEs cost nothing extra. [`EncodeBuf::finish`] reverses into wire
/// order.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Push bytes so they appear in the given order in the final output.
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    fn push_length(&mut self, len: usize) {
        if len < 0x80 {
            self.buf.push(len as u8);
            return;
        }
        // Long form: significant big-endian bytes after a count octet.
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let significant = &bytes[skip..];
        for byte in significant.iter().rev() {
            self.buf.push(*byte);
        }
        self.buf.push(0x80 | significant.len() as u8);
    }

    /// Encode a constructed type: the closure writes the contents (in
    /// reverse field order), then length and tag are prepended.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start_len = self.len();
        f(self);
        let content_len = self.len() - start_len;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::SEQUENCE, f);
    }

    /// Encode a signed INTEGER in minimal two's-complement form.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        if value >= 0 {
            while start < 3 && bytes[start] == 0 && bytes[start + 1] & 0x80 == 0 {
                start += 1;
            }
        } else {
            while start < 3 && bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0 {
                start += 1;
            }
        }
        self.push_bytes(&bytes[start..]);
        self.push_length(4 - start);
        self.push_tag(tag::INTEGER);
    }

    /// Encode an unsigned 32-bit value under an application tag.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        if value == 0 {
            self.push_bytes(&[0]);
            self.push_length(1);
            self.push_tag(tag);
            return;
        }
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let needs_pad = bytes[skip] & 0x80 != 0;
        if needs_pad {
            self.push_bytes(&bytes[skip..]);
            self.buf.push(0);
            self.push_length(4 - skip + 1);
        } else {
            self.push_bytes(&bytes[skip..]);
            self.push_length(4 - skip);
        }
        self.push_tag(tag);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::OCTET_STRING);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber();
        self.push_bytes(&ber);
        self.push_length(ber.len());
        self.push_tag(tag::OBJECT_IDENTIFIER);
    }

    /// Finalize into wire order.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode one complete SNMPv2c trap message.
///
/// The varbinds go on the wire in the order given; error-status and
/// error-index are always zero in an outgoing trap.
pub fn encode_trap_message(
    community: &str,
    request_id: i32,
    varbinds: &[(Oid, Value)],
) -> Vec<u8> {
    let mut buf = EncodeBuf::new();
    buf.push_sequence(|buf| {
        buf.push_constructed(tag::TRAP_V2, |buf| {
            buf.push_sequence(|buf| {
                for (oid, value) in varbinds.iter().rev() {
                    buf.push_sequence(|buf| {
                        value.encode(buf);
                        buf.push_oid(oid);
                    });
                }
            });
            buf.push_integer(0); // error-index
            buf.push_integer(0); // error-status
            buf.push_integer(request_id);
        });
        buf.push_octet_string(community.as_bytes());
        buf.push_integer(VERSION_V2C);
    });
    buf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_parse_and_display_roundtrip() {
        let oid: Oid = "1.3.6.1.4.1.11307.10".parse().unwrap();
        assert_eq!(oid.to_string(), "1.3.6.1.4.1.11307.10");
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 4, 1, 11307, 10]);
    }

    #[test]
    fn oid_parse_rejects_garbage() {
        assert!("".parse::<Oid>().is_err());
        assert!("enterprise".parse::<Oid>().is_err());
        assert!("1".parse::<Oid>().is_err());
        assert!("4.1.2".parse::<Oid>().is_err());
        assert!("1.3.6.x.1".parse::<Oid>().is_err());
    }

    #[test]
    fn oid_ber_encoding() {
        let oid: Oid = "1.3.6.1".parse().unwrap();
        assert_eq!(oid.to_ber(), vec![0x2B, 0x06, 0x01]);

        // 11307 = 0x2C2B needs two base-128 bytes: 0xD8 0x2B
        let oid: Oid = "1.3.6.1.4.1.11307".parse().unwrap();
        assert_eq!(oid.to_ber(), vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0xD8, 0x2B]);
    }

    #[test]
    fn integer_encoding_is_minimal() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x02, 0x01, 0x00]),
            (1, &[0x02, 0x01, 0x01]),
            (127, &[0x02, 0x01, 0x7F]),
            (128, &[0x02, 0x02, 0x00, 0x80]),
            (-1, &[0x02, 0x01, 0xFF]),
            (-129, &[0x02, 0x02, 0xFF, 0x7F]),
        ];
        for (value, expected) in cases {
            let mut buf = EncodeBuf::new();
            buf.push_integer(*value);
            assert_eq!(buf.finish(), *expected, "integer {}", value);
        }
    }

    #[test]
    fn unsigned32_high_bit_gets_padded() {
        let mut buf = EncodeBuf::new();
        buf.push_unsigned32(tag::TIMETICKS, 0);
        assert_eq!(buf.finish(), vec![0x43, 0x01, 0x00]);

        let mut buf = EncodeBuf::new();
        buf.push_unsigned32(tag::TIMETICKS, 0x80);
        assert_eq!(buf.finish(), vec![0x43, 0x02, 0x00, 0x80]);
    }

    #[test]
    fn octet_string_encoding() {
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(b"down");
        assert_eq!(buf.finish(), vec![0x04, 0x04, b'd', b'o', b'w', b'n']);
    }

    #[test]
    fn long_form_length() {
        let data = vec![0xAA; 200];
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(&data);
        let out = buf.finish();
        assert_eq!(&out[..3], &[0x04, 0x81, 200]);
        assert_eq!(out.len(), 203);
    }

    #[test]
    fn nested_sequence_encoding() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            // Reverse field order inside the closure.
            buf.push_integer(2);
            buf.push_integer(1);
        });
        assert_eq!(
            buf.finish(),
            vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn trap_message_golden_bytes() {
        let uptime: Oid = "1.3.6.1.2.1.1.3.0".parse().unwrap();
        let message =
            encode_trap_message("pub", 1, &[(uptime, Value::TimeTicks(0))]);
        let expected: Vec<u8> = vec![
            0x30, 0x24, // message SEQUENCE
            0x02, 0x01, 0x01, // version: v2c
            0x04, 0x03, b'p', b'u', b'b', // community
            0xA7, 0x1A, // SNMPv2-Trap PDU
            0x02, 0x01, 0x01, // request-id
            0x02, 0x01, 0x00, // error-status
            0x02, 0x01, 0x00, // error-index
            0x30, 0x0F, // varbind list
            0x30, 0x0D, // varbind
            0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x03, 0x00, // sysUpTime.0
            0x43, 0x01, 0x00, // TimeTicks 0
        ];
        assert_eq!(message, expected);
    }

    #[test]
    fn varbind_order_is_preserved_on_the_wire() {
        let a: Oid = "1.3.6.1.4.1.11307.10.1".parse().unwrap();
        let b: Oid = "1.3.6.1.4.1.11307.10.2".parse().unwrap();
        let message = encode_trap_message(
            "public",
            7,
            &[
                (a, Value::OctetString(b"first".to_vec())),
                (b, Value::OctetString(b"second".to_vec())),
            ],
        );
        let first = message
            .windows(5)
            .position(|w| w == b"first")
            .expect("first value on the wire");
        let second = message
            .windows(6)
            .position(|w| w == b"second")
            .expect("second value on the wire");
        assert!(first < second);
    }
}
