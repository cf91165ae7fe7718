mod dns;
mod tls;

use std::cell::{OnceCell, RefCell};
use std::net::Ipv4Addr;

use crate::error::FirewallError;
use crate::list::{Asn, AsnList};

const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const DNS_PORT: u16 = 53;

/// Lazy, zero-copy view over one raw IPv4 packet.
///
/// Every accessor memoizes its result on first successful parse; later
/// calls return the cached value instead of re-parsing. The view owns no
/// thread-safety of its own — it is built, consulted, and dropped by a
/// single worker for the lifetime of one packet, matching the "move-only
/// value handed to a worker by channel" ownership model.
pub struct PacketView<'a> {
    payload: &'a [u8],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    transport_proto: u8,
    transport_payload: &'a [u8],

    ports: OnceCell<Option<(u16, u16)>>,
    dns_domains: OnceCell<Vec<String>>,
    sni_ja3: OnceCell<(String, String)>,
    asn: RefCell<Option<Asn>>,
}

impl<'a> PacketView<'a> {
    /// Parses the outer IPv4 layer. Interior (TCP/UDP/DNS/TLS) layers are
    /// left for lazy, best-effort parsing by the relevant accessor.
    pub fn new(payload: &'a [u8]) -> Result<Self, FirewallError> {
        let ipv4 = etherparse::Ipv4HeaderSlice::from_slice(payload)
            .map_err(|err| FirewallError::DecodeFailed(err.to_string()))?;
        let ihl = ipv4.ihl() as usize * 4;
        let transport_payload = payload.get(ihl..).unwrap_or(&[]);

        Ok(Self {
            payload,
            src_ip: ipv4.source_addr(),
            dst_ip: ipv4.destination_addr(),
            transport_proto: ipv4.protocol().0,
            transport_payload,
            ports: OnceCell::new(),
            dns_domains: OnceCell::new(),
            sni_ja3: OnceCell::new(),
            asn: RefCell::new(None),
        })
    }

    pub fn raw(&self) -> &'a [u8] {
        self.payload
    }

    pub fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }

    /// `(src_port, dst_port)`, for TCP/UDP only.
    pub fn ports(&self) -> Option<(u16, u16)> {
        *self.ports.get_or_init(|| self.parse_ports())
    }

    fn parse_ports(&self) -> Option<(u16, u16)> {
        match self.transport_proto {
            PROTO_TCP => {
                let hdr = etherparse::TcpHeaderSlice::from_slice(self.transport_payload).ok()?;
                Some((hdr.source_port(), hdr.destination_port()))
            }
            PROTO_UDP => {
                let hdr = etherparse::UdpHeaderSlice::from_slice(self.transport_payload).ok()?;
                Some((hdr.source_port(), hdr.destination_port()))
            }
            _ => None,
        }
    }

    /// DNS question + CNAME-answer names, reversed-domain ready callers do
    /// the reversal themselves via `DomainList::lookup`.
    pub fn dns_domains(&self) -> &[String] {
        self.dns_domains.get_or_init(|| self.parse_dns_domains())
    }

    fn parse_dns_domains(&self) -> Vec<String> {
        let Some((_, dst_port)) = self.ports() else {
            return Vec::new();
        };
        if dst_port != DNS_PORT {
            return Vec::new();
        }
        let dns_payload = match self.transport_proto {
            PROTO_UDP => self.transport_payload.get(8..).unwrap_or(&[]),
            PROTO_TCP => {
                let tcp_hdr_len = etherparse::TcpHeaderSlice::from_slice(self.transport_payload)
                    .map(|h| h.slice().len())
                    .unwrap_or(0);
                self.transport_payload.get(tcp_hdr_len..).unwrap_or(&[])
            }
            _ => &[],
        };
        dns::extract_domains(dns_payload)
    }

    /// SNI + JA3 fingerprint parsed together from a TLS ClientHello carried
    /// in the TCP payload. If the segment is not a ClientHello, returns
    /// `("", "")`, cached so repeat lookups on the same packet are O(1).
    pub fn sni_and_ja3(&self) -> (&str, &str) {
        let (sni, ja3) = self.sni_ja3.get_or_init(|| {
            if self.transport_proto != PROTO_TCP {
                return (String::new(), String::new());
            }
            let tcp_hdr_len = etherparse::TcpHeaderSlice::from_slice(self.transport_payload)
                .map(|h| h.slice().len())
                .unwrap_or(0);
            let tls_segment = self.transport_payload.get(tcp_hdr_len..).unwrap_or(&[]);
            tls::parse_client_hello(tls_segment).unwrap_or_default()
        });
        (sni.as_str(), ja3.as_str())
    }

    pub fn sni(&self) -> &str {
        self.sni_and_ja3().0
    }

    pub fn ja3(&self) -> &str {
        self.sni_and_ja3().1
    }

    /// All domains relevant to a packet: DNS question/answer names plus a
    /// non-empty SNI.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.dns_domains().to_vec();
        let sni = self.sni();
        if !sni.is_empty() {
            domains.push(sni.to_string());
        }
        domains
    }

    /// Returns the cached ASN if present; otherwise, if `list` is given,
    /// resolves via longest-prefix lookup on the source address and caches
    /// the result (including a cached "unresolved" outcome is not stored,
    /// so a later call with a freshly-updated list can still resolve it).
    pub fn asn(&self, list: Option<&AsnList>) -> Option<Asn> {
        if let Some(cached) = *self.asn.borrow() {
            return Some(cached);
        }
        let resolved = list.and_then(|l| l.lookup(self.src_ip))?;
        *self.asn.borrow_mut() = Some(resolved);
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ipv4_udp(src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len();
        let total_len = 20 + udp_len;
        let mut buf = vec![0u8; total_len];
        buf[0] = 0x45; // version 4, ihl 5
        buf[2] = (total_len >> 8) as u8;
        buf[3] = total_len as u8;
        buf[8] = 64; // ttl
        buf[9] = PROTO_UDP;
        buf[12..16].copy_from_slice(&src);
        buf[16..20].copy_from_slice(&dst);
        // checksum left zero; etherparse does not require a valid checksum to parse the header
        buf[20..22].copy_from_slice(&12345u16.to_be_bytes()); // src port
        buf[22..24].copy_from_slice(&DNS_PORT.to_be_bytes()); // dst port
        buf[24..26].copy_from_slice(&(udp_len as u16).to_be_bytes());
        buf[28..].copy_from_slice(payload);
        buf
    }

    #[test]
    fn malformed_ipv4_fails_decode() {
        let garbage = [0xFFu8, 0xFF, 0xFF];
        assert!(PacketView::new(&garbage).is_err());
    }

    #[test]
    fn parses_src_and_dst_ip() {
        let pkt = build_ipv4_udp([10, 1, 2, 3], [8, 8, 8, 8], &[]);
        let view = PacketView::new(&pkt).unwrap();
        assert_eq!(view.src_ip(), Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(view.dst_ip(), Ipv4Addr::new(8, 8, 8, 8));
    }

    #[test]
    fn non_tls_tcp_payload_has_empty_sni_and_ja3() {
        let pkt = build_ipv4_udp([1, 2, 3, 4], [5, 6, 7, 8], &[]);
        let view = PacketView::new(&pkt).unwrap();
        assert_eq!(view.sni_and_ja3(), ("", ""));
    }

    fn build_ipv4_tcp(src: [u8; 4], dst: [u8; 4], tcp_payload: &[u8]) -> Vec<u8> {
        let tcp_len = 20 + tcp_payload.len();
        let total_len = 20 + tcp_len;
        let mut buf = vec![0u8; total_len];
        buf[0] = 0x45;
        buf[2] = (total_len >> 8) as u8;
        buf[3] = total_len as u8;
        buf[8] = 64;
        buf[9] = PROTO_TCP;
        buf[12..16].copy_from_slice(&src);
        buf[16..20].copy_from_slice(&dst);

        let tcp = &mut buf[20..];
        tcp[0..2].copy_from_slice(&54321u16.to_be_bytes());
        tcp[2..4].copy_from_slice(&443u16.to_be_bytes());
        tcp[12] = 5 << 4; // data offset = 5 words, no options
        tcp[14..16].copy_from_slice(&65535u16.to_be_bytes());
        tcp[20..].copy_from_slice(tcp_payload);
        buf
    }

    /// Builds a minimal ClientHello record: one non-GREASE cipher suite, no
    /// compression, and a single SNI extension carrying `hostname`.
    fn build_client_hello(hostname: &str) -> Vec<u8> {
        let name = hostname.as_bytes();
        let mut sni_ext_data = Vec::new();
        sni_ext_data.extend_from_slice(&((1 + 2 + name.len()) as u16).to_be_bytes());
        sni_ext_data.push(0); // host_name
        sni_ext_data.extend_from_slice(&(name.len() as u16).to_be_bytes());
        sni_ext_data.extend_from_slice(name);

        let mut extensions = Vec::new();
        extensions.extend_from_slice(&0u16.to_be_bytes()); // server_name
        extensions.extend_from_slice(&(sni_ext_data.len() as u16).to_be_bytes());
        extensions.extend_from_slice(&sni_ext_data);

        let mut body = Vec::new();
        body.extend_from_slice(&0x0303u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 32]);
        body.push(0); // session id len
        body.extend_from_slice(&2u16.to_be_bytes());
        body.extend_from_slice(&0x1301u16.to_be_bytes()); // non-GREASE cipher
        body.push(1);
        body.push(0); // null compression
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(&extensions);

        let mut handshake = vec![0x01u8];
        let body_len = body.len() as u32;
        handshake.push((body_len >> 16) as u8);
        handshake.push((body_len >> 8) as u8);
        handshake.push(body_len as u8);
        handshake.extend_from_slice(&body);

        let mut record = vec![0x16u8, 0x03, 0x03];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);
        record
    }

    #[test]
    fn sni_is_extracted_past_the_tcp_header() {
        let hello = build_client_hello("login.evil.example");
        let pkt = build_ipv4_tcp([9, 9, 9, 9], [1, 1, 1, 1], &hello);
        let view = PacketView::new(&pkt).unwrap();
        assert_eq!(view.sni(), "login.evil.example");
        assert!(!view.ja3().is_empty());
        assert_eq!(view.domains(), vec!["login.evil.example".to_string()]);
    }

    #[test]
    fn asn_memoizes_after_first_resolution() {
        let list = AsnList::new();
        let prefix: ipnetwork::Ipv4Network = "10.0.0.0/8".parse().unwrap();
        list.replace_all(&[(prefix, Asn::new(64500, "us"))]);

        let pkt = build_ipv4_udp([10, 1, 2, 3], [8, 8, 8, 8], &[]);
        let view = PacketView::new(&pkt).unwrap();
        assert_eq!(view.asn(Some(&list)).unwrap().asn, 64500);
        // Even without the list on the second call, the cached value wins.
        assert_eq!(view.asn(None).unwrap().asn, 64500);
    }
}
