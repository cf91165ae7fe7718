use vigil_core::{DomainList, Filter, FilterContext, FilterKind, FirewallError, PacketView};

use crate::ip::Disposition;

/// Admin-managed domain allow/deny list, consulted against every DNS
/// question/answer name and the TLS SNI on the packet.
pub struct DomainListFilter {
    name: &'static str,
    kind: FilterKind,
    disposition: Disposition,
    list: DomainList,
}

impl DomainListFilter {
    pub fn allow_list(name: &'static str) -> Self {
        Self {
            name,
            kind: FilterKind::Domain,
            disposition: Disposition::Accept,
            list: DomainList::new(),
        }
    }

    pub fn deny_list(name: &'static str) -> Self {
        Self {
            name,
            kind: FilterKind::Domain,
            disposition: Disposition::Drop,
            list: DomainList::new(),
        }
    }

    pub fn list(&self) -> &DomainList {
        &self.list
    }

    pub fn matches(&self, packet: &PacketView<'_>) -> bool {
        packet.domains().iter().any(|d| self.list.lookup(d))
    }
}

#[async_trait::async_trait]
impl Filter for DomainListFilter {
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
        match self.disposition {
            Disposition::Accept => true,
            Disposition::Drop => !self.matches(packet),
        }
    }

    async fn update(&self, _ctx: &FilterContext) -> Result<(), FirewallError> {
        Ok(())
    }
}
