//! Admin HTTP API: Basic-auth-guarded CRUD over the five admin-managed
//! lists, backed by SQLite for restart durability. The lists themselves
//! are the exact `Arc`-wrapped instances the daemon's pipeline filters
//! hold, so a write here takes effect on the very next packet.

pub mod auth;
pub mod lists;
pub mod routes;
pub mod store;

pub use auth::Credentials;
pub use lists::{ListHandles, ListKind};
pub use store::Store;

use axum::Router;
use vigil_core::FirewallError;

#[derive(Clone)]
pub struct AppState {
    pub lists: ListHandles,
    pub store: Store,
    pub credentials: Credentials,
}

/// Loads every list's persisted entries from `state.store` into the live
/// `state.lists` handles. Called once at daemon startup, before the
/// pipeline starts accepting packets, so admin-managed lists survive a
/// restart.
pub async fn hydrate(state: &AppState) -> Result<(), FirewallError> {
    for kind in ListKind::ALL {
        let values = state.store.load_all(kind).await?;
        if values.is_empty() {
            continue;
        }
        match kind {
            ListKind::SubnetAllow => {
                let prefixes: Vec<_> = values.iter().filter_map(|v| vigil_core::parse_prefix(v).ok()).collect();
                state.lists.subnet_allow.list().upsert(&prefixes)?;
            }
            ListKind::SubnetDeny => {
                let prefixes: Vec<_> = values.iter().filter_map(|v| vigil_core::parse_prefix(v).ok()).collect();
                state.lists.subnet_deny.list().upsert(&prefixes)?;
            }
            ListKind::DomainAllow => state.lists.domain_allow.list().upsert(&values)?,
            ListKind::DomainDeny => state.lists.domain_deny.list().upsert(&values)?,
            ListKind::CountryDeny => state.lists.country_deny.upsert(&values)?,
        }
    }
    Ok(())
}

pub fn router(state: AppState) -> Router {
    routes::router()
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_basic_auth))
        .with_state(state)
}

/// Binds `addr` and serves the admin API until the process is killed. The
/// daemon runs this as a background task alongside the packet pipeline.
pub async fn serve(addr: &str, state: AppState) -> Result<(), FirewallError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| FirewallError::InvalidInput(format!("failed to bind control API to {addr}: {err}")))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|err| FirewallError::InvalidInput(format!("control API server error: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_core::CountryList;
    use vigil_filters::{DomainListFilter, IpListFilter};

    async fn test_state() -> AppState {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let lists = ListHandles {
            subnet_allow: Arc::new(IpListFilter::allow_list("subnet-allow")),
            subnet_deny: Arc::new(IpListFilter::deny_list("subnet-deny")),
            domain_allow: Arc::new(DomainListFilter::allow_list("domain-allow")),
            domain_deny: Arc::new(DomainListFilter::deny_list("domain-deny")),
            country_deny: Arc::new(CountryList::new()),
        };
        let credentials = Credentials::for_test("admin", "hunter2");
        AppState { lists, store, credentials }
    }

    #[tokio::test]
    async fn hydrate_populates_lists_from_store() {
        let state = test_state().await;
        state.store.persist_upsert(ListKind::CountryDeny, "ru").await.unwrap();
        hydrate(&state).await.unwrap();
        assert!(state.lists.country_deny.lookup("ru"));
    }

    #[tokio::test]
    async fn hydrate_skips_empty_tables() {
        let state = test_state().await;
        hydrate(&state).await.unwrap();
        assert!(state.lists.country_deny.get_all().is_empty());
    }
}
