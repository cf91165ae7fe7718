//! Minimal RFC1035 message reader: just enough to pull question names and
//! CNAME answer names back out of a UDP/TCP DNS payload, including pointer
//! (message-compression) follow-through.

const MAX_POINTER_HOPS: usize = 16;
const CNAME_TYPE: u16 = 5;

fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
    buf.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// Reads a (possibly pointer-compressed) name starting at `start`, returning
/// the name and the offset immediately after it in the *uncompressed*
/// reading path (pointers do not advance the caller's cursor).
fn read_name(buf: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut end_pos = None;
    let mut hops = 0;

    loop {
        let len = *buf.get(pos)?;
        if len == 0 {
            if end_pos.is_none() {
                end_pos = Some(pos + 1);
            }
            break;
        }
        if len & 0xc0 == 0xc0 {
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return None;
            }
            let lo = *buf.get(pos + 1)?;
            if end_pos.is_none() {
                end_pos = Some(pos + 2);
            }
            pos = (((len & 0x3f) as usize) << 8) | lo as usize;
            continue;
        }
        let len = len as usize;
        let label = buf.get(pos + 1..pos + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += 1 + len;
    }

    Some((labels.join("."), end_pos.unwrap_or(pos)))
}

/// Returns the reversed-domain-ready question names and CNAME answer names
/// found in one DNS message. Malformed messages yield an empty list rather
/// than an error: DNS extraction is best-effort, not load-bearing for the
/// packet decode itself.
pub fn extract_domains(buf: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    if buf.len() < 12 {
        return names;
    }
    let qdcount = match read_u16(buf, 4) {
        Some(v) => v,
        None => return names,
    };
    let ancount = read_u16(buf, 6).unwrap_or(0);

    let mut pos = 12;
    for _ in 0..qdcount {
        let Some((name, after_name)) = read_name(buf, pos) else {
            return names;
        };
        if !name.is_empty() {
            names.push(name);
        }
        pos = after_name + 4; // qtype + qclass
        if pos > buf.len() {
            return names;
        }
    }

    for _ in 0..ancount {
        let Some((_, after_name)) = read_name(buf, pos) else {
            break;
        };
        let Some(rtype) = read_u16(buf, after_name) else {
            break;
        };
        let Some(rdlength) = read_u16(buf, after_name + 8) else {
            break;
        };
        let rdata_start = after_name + 10;
        if rtype == CNAME_TYPE {
            if let Some((cname, _)) = read_name(buf, rdata_start) {
                if !cname.is_empty() {
                    names.push(cname);
                }
            }
        }
        pos = rdata_start + rdlength as usize;
        if pos > buf.len() {
            break;
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name(labels: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for label in labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    #[test]
    fn extracts_single_question_name() {
        let mut msg = vec![0u8; 12];
        msg[4..6].copy_from_slice(&1u16.to_be_bytes()); // qdcount=1
        msg.extend(encode_name(&["example", "com"]));
        msg.extend_from_slice(&1u16.to_be_bytes()); // qtype A
        msg.extend_from_slice(&1u16.to_be_bytes()); // qclass IN

        let names = extract_domains(&msg);
        assert_eq!(names, vec!["example.com".to_string()]);
    }

    #[test]
    fn malformed_header_returns_empty() {
        assert!(extract_domains(&[0u8; 4]).is_empty());
    }
}
