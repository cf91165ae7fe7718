//! `/v1/lists/{kind}` handlers: GET returns the canonical-form entries,
//! POST/DELETE apply a batch. Validation happens before anything is
//! committed; persistence happens after the in-memory commit, so a
//! persistence failure never leaves the in-memory list out of sync with
//! what the caller was told succeeded at the `422` stage.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use vigil_core::parse_prefix;

use crate::lists::ListKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/lists/:kind", get(get_list).post(post_list).delete(delete_list))
        .route("/v1/lists/:kind/:value", get(get_one))
}

#[derive(Serialize)]
struct Found {
    found: bool,
}

fn parse_kind(raw: &str) -> Result<ListKind, Response> {
    raw.parse::<ListKind>()
        .map_err(|_| (StatusCode::NOT_FOUND, format!("no such list: {raw}")).into_response())
}

async fn get_list(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let values = match kind {
        ListKind::SubnetAllow => state.lists.subnet_allow.list().get_all().iter().map(ToString::to_string).collect(),
        ListKind::SubnetDeny => state.lists.subnet_deny.list().get_all().iter().map(ToString::to_string).collect(),
        ListKind::DomainAllow => state.lists.domain_allow.list().get_all(),
        ListKind::DomainDeny => state.lists.domain_deny.list().get_all(),
        ListKind::CountryDeny => state.lists.country_deny.get_all(),
    };

    Json(values).into_response()
}

/// Per-item lookup: `{"found": bool}`, matching the contract's "GET one"
/// behavior. Subnet lists reject a value that doesn't parse as an IPv4
/// address or prefix with `400`; domain and country lookups take the raw
/// path segment as-is, since any string is a valid (if never-matching)
/// lookup key for those.
async fn get_one(State(state): State<AppState>, Path((kind, value)): Path<(String, String)>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let found = match kind {
        ListKind::SubnetAllow => match parse_prefix(&value) {
            Ok(prefix) => state.lists.subnet_allow.list().lookup(prefix),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        },
        ListKind::SubnetDeny => match parse_prefix(&value) {
            Ok(prefix) => state.lists.subnet_deny.list().lookup(prefix),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        },
        ListKind::DomainAllow => state.lists.domain_allow.list().lookup(&value),
        ListKind::DomainDeny => state.lists.domain_deny.list().lookup(&value),
        ListKind::CountryDeny => state.lists.country_deny.lookup(&value),
    };

    Json(Found { found }).into_response()
}

async fn post_list(State(state): State<AppState>, Path(kind): Path<String>, Json(values): Json<Vec<String>>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    apply_batch(state, kind, values, Mutation::Upsert).await
}

async fn delete_list(State(state): State<AppState>, Path(kind): Path<String>, Json(values): Json<Vec<String>>) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    apply_batch(state, kind, values, Mutation::Remove).await
}

#[derive(Clone, Copy)]
enum Mutation {
    Upsert,
    Remove,
}

async fn apply_batch(state: AppState, kind: ListKind, values: Vec<String>, mutation: Mutation) -> Response {
    let canonical = match canonicalize(kind, &values) {
        Ok(canonical) => canonical,
        Err(message) => return (StatusCode::UNPROCESSABLE_ENTITY, message).into_response(),
    };

    let commit_result = match (kind, mutation) {
        (ListKind::SubnetAllow, Mutation::Upsert) => state.lists.subnet_allow.list().upsert(&parse_prefixes(&canonical)),
        (ListKind::SubnetAllow, Mutation::Remove) => state.lists.subnet_allow.list().remove(&parse_prefixes(&canonical)),
        (ListKind::SubnetDeny, Mutation::Upsert) => state.lists.subnet_deny.list().upsert(&parse_prefixes(&canonical)),
        (ListKind::SubnetDeny, Mutation::Remove) => state.lists.subnet_deny.list().remove(&parse_prefixes(&canonical)),
        (ListKind::DomainAllow, Mutation::Upsert) => state.lists.domain_allow.list().upsert(&canonical),
        (ListKind::DomainAllow, Mutation::Remove) => state.lists.domain_allow.list().remove(&canonical),
        (ListKind::DomainDeny, Mutation::Upsert) => state.lists.domain_deny.list().upsert(&canonical),
        (ListKind::DomainDeny, Mutation::Remove) => state.lists.domain_deny.list().remove(&canonical),
        (ListKind::CountryDeny, Mutation::Upsert) => state.lists.country_deny.upsert(&canonical),
        (ListKind::CountryDeny, Mutation::Remove) => state.lists.country_deny.remove(&canonical),
    };
    if let Err(err) = commit_result {
        return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response();
    }

    for value in &canonical {
        let persisted = match mutation {
            Mutation::Upsert => state.store.persist_upsert(kind, value).await,
            Mutation::Remove => state.store.persist_remove(kind, value).await,
        };
        if let Err(err) = persisted {
            tracing::error!(%err, kind = kind.as_str(), "persistence failed, in-memory commit stands");
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Validates every member up front so a batch either fully applies or
/// fails before anything is committed. For subnet lists this means
/// confirming each entry parses as a prefix; domain/country entries are
/// taken as-is (the list's own `upsert` rejects malformed domains).
fn canonicalize(kind: ListKind, values: &[String]) -> Result<Vec<String>, String> {
    match kind {
        ListKind::SubnetAllow | ListKind::SubnetDeny => {
            let mut canonical = Vec::with_capacity(values.len());
            for value in values {
                match parse_prefix(value) {
                    Ok(prefix) => canonical.push(prefix.to_string()),
                    Err(_) => return Err(format!("not a prefix or IPv4 address: {value}")),
                }
            }
            Ok(canonical)
        }
        ListKind::DomainAllow | ListKind::DomainDeny | ListKind::CountryDeny => Ok(values.to_vec()),
    }
}

fn parse_prefixes(values: &[String]) -> Vec<ipnetwork::Ipv4Network> {
    values.iter().filter_map(|v| parse_prefix(v).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_core::CountryList;
    use vigil_filters::{DomainListFilter, IpListFilter};

    async fn test_state() -> AppState {
        let store = crate::Store::connect("sqlite::memory:").await.unwrap();
        let lists = crate::ListHandles {
            subnet_allow: Arc::new(IpListFilter::allow_list("subnet-allow")),
            subnet_deny: Arc::new(IpListFilter::deny_list("subnet-deny")),
            domain_allow: Arc::new(DomainListFilter::allow_list("domain-allow")),
            domain_deny: Arc::new(DomainListFilter::deny_list("domain-deny")),
            country_deny: Arc::new(CountryList::new()),
        };
        let credentials = crate::Credentials::for_test("admin", "hunter2");
        AppState { lists, store, credentials }
    }

    async fn found_body(resp: Response) -> bool {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["found"].as_bool().unwrap()
    }

    #[tokio::test]
    async fn get_one_reports_found_for_a_denied_subnet() {
        let state = test_state().await;
        state.lists.subnet_deny.list().upsert(&[parse_prefix("10.0.0.0/8").unwrap()]).unwrap();

        let resp = get_one(State(state), Path(("subnet-deny".to_string(), "10.1.2.3".to_string()))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(found_body(resp).await);
    }

    #[tokio::test]
    async fn get_one_reports_not_found_for_an_absent_domain() {
        let state = test_state().await;
        let resp = get_one(State(state), Path(("domain-deny".to_string(), "evil.example".to_string()))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!found_body(resp).await);
    }

    #[tokio::test]
    async fn get_one_rejects_an_unparseable_subnet_value() {
        let state = test_state().await;
        let resp = get_one(State(state), Path(("subnet-allow".to_string(), "not-an-ip".to_string()))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_one_404s_on_an_unknown_list_kind() {
        let state = test_state().await;
        let resp = get_one(State(state), Path(("nope".to_string(), "x".to_string()))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
