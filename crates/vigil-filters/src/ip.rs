use ipnetwork::Ipv4Network;
use vigil_core::{Filter, FilterContext, FilterKind, FirewallError, PacketView, SubnetList};

/// Whether a list hit should accept (allow-list) or drop (deny-list) the
/// packet. Shared between the IP list filters and the domain list filters,
/// since both wrap the same "lookup, then act" contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    Drop,
}

/// Admin-managed source-IP allow/deny list. `load`/`update` are no-ops: the
/// list is mutated directly by the control plane, not refreshed from a feed.
pub struct IpListFilter {
    name: &'static str,
    kind: FilterKind,
    disposition: Disposition,
    list: SubnetList,
}

impl IpListFilter {
    pub fn allow_list(name: &'static str) -> Self {
        Self {
            name,
            kind: FilterKind::Ip,
            disposition: Disposition::Accept,
            list: SubnetList::new(),
        }
    }

    pub fn deny_list(name: &'static str) -> Self {
        Self {
            name,
            kind: FilterKind::Ip,
            disposition: Disposition::Drop,
            list: SubnetList::new(),
        }
    }

    pub fn list(&self) -> &SubnetList {
        &self.list
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// Convenience for the engine's short-circuit steps, which need to know
    /// whether the packet's source matched at all, not just the resulting
    /// verdict.
    pub fn matches(&self, packet: &PacketView<'_>) -> bool {
        let prefix = Ipv4Network::new(packet.src_ip(), 32).expect("/32 is always valid");
        self.list.lookup(prefix)
    }
}

#[async_trait::async_trait]
impl Filter for IpListFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FilterKind {
        self.kind
    }

    async fn load(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }

    fn check(&self, packet: &PacketView<'_>) -> bool {
        // The allow-list's accept short-circuit is applied by the engine via
        // `matches`, not through this generic check: as a pipeline stage it
        // never itself drops a packet.
        match self.disposition {
            Disposition::Accept => true,
            Disposition::Drop => !self.matches(packet),
        }
    }

    async fn update(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use vigil_core::parse_prefix;

    fn udp_packet(src: Ipv4Addr) -> Vec<u8> {
        let mut buf = vec![0u8; 28];
        buf[0] = 0x45;
        buf[2] = 0;
        buf[3] = 28;
        buf[9] = 17;
        buf[12..16].copy_from_slice(&src.octets());
        buf[16..20].copy_from_slice(&[8, 8, 8, 8]);
        buf
    }

    #[test]
    fn deny_list_drops_on_match() {
        let filter = IpListFilter::deny_list("deny");
        filter
            .list()
            .upsert(&[parse_prefix("185.220.101.0/24").unwrap()])
            .unwrap();

        let pkt = udp_packet(Ipv4Addr::new(185, 220, 101, 7));
        let view = PacketView::new(&pkt).unwrap();
        assert!(!filter.check(&view));
    }

    #[test]
    fn deny_list_accepts_on_no_match() {
        let filter = IpListFilter::deny_list("deny");
        let pkt = udp_packet(Ipv4Addr::new(1, 2, 3, 4));
        let view = PacketView::new(&pkt).unwrap();
        assert!(filter.check(&view));
    }

    #[test]
    fn allow_list_matches_flag_is_queryable_for_short_circuit() {
        let filter = IpListFilter::allow_list("allow");
        filter
            .list()
            .upsert(&[parse_prefix("10.0.0.0/8").unwrap()])
            .unwrap();
        let pkt = udp_packet(Ipv4Addr::new(10, 1, 1, 1));
        let view = PacketView::new(&pkt).unwrap();
        assert!(filter.matches(&view));
    }
}
