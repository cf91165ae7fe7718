//! The five admin-managed lists the control plane exposes, named exactly
//! as the URL path segments under `/v1/lists/{kind}`.

use std::str::FromStr;
use std::sync::Arc;

use vigil_core::CountryList;
use vigil_filters::{DomainListFilter, IpListFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    SubnetAllow,
    SubnetDeny,
    DomainAllow,
    DomainDeny,
    CountryDeny,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::SubnetAllow => "subnet-allow",
            ListKind::SubnetDeny => "subnet-deny",
            ListKind::DomainAllow => "domain-allow",
            ListKind::DomainDeny => "domain-deny",
            ListKind::CountryDeny => "country-deny",
        }
    }

    /// Table name backing this list in the SQLite store.
    pub fn table(&self) -> &'static str {
        match self {
            ListKind::SubnetAllow => "subnet_allow",
            ListKind::SubnetDeny => "subnet_deny",
            ListKind::DomainAllow => "domain_allow",
            ListKind::DomainDeny => "domain_deny",
            ListKind::CountryDeny => "country_deny",
        }
    }

    pub const ALL: [ListKind; 5] = [
        ListKind::SubnetAllow,
        ListKind::SubnetDeny,
        ListKind::DomainAllow,
        ListKind::DomainDeny,
        ListKind::CountryDeny,
    ];
}

impl FromStr for ListKind {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "subnet-allow" => Ok(ListKind::SubnetAllow),
            "subnet-deny" => Ok(ListKind::SubnetDeny),
            "domain-allow" => Ok(ListKind::DomainAllow),
            "domain-deny" => Ok(ListKind::DomainDeny),
            "country-deny" => Ok(ListKind::CountryDeny),
            _ => Err(()),
        }
    }
}

/// Handles to the live lists the daemon's pipeline filters also read
/// from. The control plane holds the same `Arc<IpListFilter>` /
/// `Arc<DomainListFilter>` instances wired into the pipeline, so a write
/// here is visible to `check` on the very next packet; it is just
/// another writer against the same atomic-swap list, same as a feed's
/// `update`.
#[derive(Clone)]
pub struct ListHandles {
    pub subnet_allow: Arc<IpListFilter>,
    pub subnet_deny: Arc<IpListFilter>,
    pub domain_allow: Arc<DomainListFilter>,
    pub domain_deny: Arc<DomainListFilter>,
    pub country_deny: Arc<CountryList>,
}
