mod asn;
mod country;
mod domain;
mod subnet;

pub use asn::{Asn, AsnList};
pub use country::CountryList;
pub use domain::DomainList;
pub use subnet::{parse_prefix, SubnetList};
