//! Minimal TLS ClientHello reader and JA3 fingerprint builder.
//!
//! Only the fields JA3 needs are extracted; anything else in the record is
//! skipped without allocating. GREASE values (reserved cipher/extension/
//! group codepoints of the form `0x?A?A`) are excluded from the fingerprint
//! per the published JA3 definition.

use md5::{Digest, Md5};

const HANDSHAKE_CONTENT_TYPE: u8 = 0x16;
const CLIENT_HELLO_TYPE: u8 = 0x01;
const EXT_SERVER_NAME: u16 = 0;
const EXT_SUPPORTED_GROUPS: u16 = 10;
const EXT_EC_POINT_FORMATS: u16 = 11;

fn is_grease(value: u16) -> bool {
    // GREASE values repeat a nibble across both bytes: 0x0A0A, 0x1A1A, ...
    (value & 0x0f0f) == 0x0a0a && (value >> 8) as u8 == value as u8
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }
}

/// Parses a single TLS record's handshake body as a ClientHello and returns
/// `(sni, ja3_md5_hex)`. Returns `None` when the segment is not a
/// ClientHello (callers cache `("", "")` in that case so retries are O(1)).
pub fn parse_client_hello(segment: &[u8]) -> Option<(String, String)> {
    let mut rec = Cursor::new(segment);
    if rec.u8()? != HANDSHAKE_CONTENT_TYPE {
        return None;
    }
    rec.skip(2)?; // legacy record version
    let record_len = rec.u16()? as usize;
    let record_body = rec.take(record_len.min(rec.remaining()))?;

    let mut hs = Cursor::new(record_body);
    if hs.u8()? != CLIENT_HELLO_TYPE {
        return None;
    }
    let len_bytes = hs.take(3)?;
    let body_len = ((len_bytes[0] as usize) << 16) | ((len_bytes[1] as usize) << 8) | len_bytes[2] as usize;
    let body = hs.take(body_len.min(hs.remaining()))?;

    let mut c = Cursor::new(body);
    let version = c.u16()?;
    c.skip(32)?; // client random

    let session_id_len = c.u8()? as usize;
    c.skip(session_id_len)?;

    let cipher_len = c.u16()? as usize;
    let cipher_bytes = c.take(cipher_len)?;
    let mut ciphers = Vec::new();
    for chunk in cipher_bytes.chunks_exact(2) {
        let v = u16::from_be_bytes([chunk[0], chunk[1]]);
        if !is_grease(v) {
            ciphers.push(v.to_string());
        }
    }

    let compression_len = c.u8()? as usize;
    c.skip(compression_len)?;

    let mut sni = String::new();
    let mut extensions = Vec::new();
    let mut curves = Vec::new();
    let mut point_formats = Vec::new();

    if c.remaining() >= 2 {
        let ext_total_len = c.u16()? as usize;
        let ext_bytes = c.take(ext_total_len.min(c.remaining()))?;
        let mut ec = Cursor::new(ext_bytes);
        while ec.remaining() >= 4 {
            let ext_type = ec.u16()?;
            let ext_len = ec.u16()? as usize;
            let ext_data = ec.take(ext_len.min(ec.remaining()))?;

            if !is_grease(ext_type) {
                extensions.push(ext_type.to_string());
            }

            match ext_type {
                EXT_SERVER_NAME => {
                    sni = parse_sni(ext_data).unwrap_or_default();
                }
                EXT_SUPPORTED_GROUPS => {
                    let mut gc = Cursor::new(ext_data);
                    if let Some(list_len) = gc.u16() {
                        if let Some(list) = gc.take((list_len as usize).min(gc.remaining())) {
                            for chunk in list.chunks_exact(2) {
                                let v = u16::from_be_bytes([chunk[0], chunk[1]]);
                                if !is_grease(v) {
                                    curves.push(v.to_string());
                                }
                            }
                        }
                    }
                }
                EXT_EC_POINT_FORMATS => {
                    let mut pc = Cursor::new(ext_data);
                    if let Some(list_len) = pc.u8() {
                        if let Some(list) = pc.take((list_len as usize).min(pc.remaining())) {
                            point_formats.extend(list.iter().map(|b| b.to_string()));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let ja3_string = format!(
        "{},{},{},{},{}",
        version,
        ciphers.join("-"),
        extensions.join("-"),
        curves.join("-"),
        point_formats.join("-"),
    );
    let digest = Md5::digest(ja3_string.as_bytes());
    let ja3 = hex::encode(digest);

    Some((sni, ja3))
}

fn parse_sni(ext_data: &[u8]) -> Option<String> {
    let mut c = Cursor::new(ext_data);
    let _list_len = c.u16()?;
    let name_type = c.u8()?;
    if name_type != 0 {
        return None;
    }
    let name_len = c.u16()? as usize;
    let name = c.take(name_len)?;
    std::str::from_utf8(name).ok().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_handshake_segment_is_not_a_client_hello() {
        assert!(parse_client_hello(&[0x17, 0x03, 0x03, 0x00, 0x01, 0x00]).is_none());
    }

    #[test]
    fn grease_values_are_excluded_from_fingerprint() {
        assert!(is_grease(0x0a0a));
        assert!(is_grease(0xfafa));
        assert!(!is_grease(0x1301));
    }
}
