// src/core/rpc/mod.rs
//
// The common RPC envelope and reply metadata every method shares
// (spec.md §6), plus pagination and the error wire format. Method-specific
// shapes live in `methods`; the authenticate -> forward -> handle prologue
// lives in `dispatch`.

pub mod dispatch;
pub mod methods;

use crate::core::blocking::QueryOptions;
use crate::core::domain::{Credential, Namespace, Region};
use crate::core::errors::OrchError;
use serde::{Deserialize, Serialize};

/// `query_options` on the common request envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestQueryOptions {
    pub min_query_index: u64,
    pub max_query_time_ms: Option<u64>,
    pub allow_stale: bool,
    pub prefix: Option<String>,
    pub per_page: u32,
    pub next_token: Option<String>,
    pub reverse: bool,
}

impl From<&RequestQueryOptions> for QueryOptions {
    fn from(opts: &RequestQueryOptions) -> Self {
        QueryOptions {
            min_query_index: opts.min_query_index,
            max_query_time: opts.max_query_time_ms.map(std::time::Duration::from_millis),
            allow_stale: opts.allow_stale,
        }
    }
}

/// Every request's common envelope fields (spec.md §6), ahead of the
/// method-specific body in `methods`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub region: Region,
    pub namespace: Namespace,
    pub auth_token: Credential,
    pub query_options: RequestQueryOptions,
}

/// Every reply's common metadata (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMeta {
    pub index: u64,
    pub last_contact_ms: u64,
    pub known_leader: bool,
    pub next_token: Option<String>,
}

/// The next-page token: built from the last row's `(namespace, id,
/// create_index)` tuple (spec.md §6 Pagination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageToken {
    pub namespace: String,
    pub id: String,
    pub create_index: u64,
}

impl PageToken {
    pub fn encode(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(raw: &str) -> Option<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Paginates `rows` (already sorted by the caller's desired order) against
/// `opts.next_token`/`opts.per_page`. `per_page == 0` returns every
/// remaining row. Builds the `next_token` for the following call from the
/// last returned row.
pub fn paginate<T: Clone>(
    rows: Vec<T>,
    opts: &RequestQueryOptions,
    namespace_of: impl Fn(&T) -> String,
    id_of: impl Fn(&T) -> String,
    create_index_of: impl Fn(&T) -> u64,
) -> (Vec<T>, Option<String>) {
    let start = match opts.next_token.as_deref().and_then(PageToken::decode) {
        Some(token) => rows
            .iter()
            .position(|r| {
                namespace_of(r) == token.namespace
                    && id_of(r) == token.id
                    && create_index_of(r) == token.create_index
            })
            .map(|i| i + 1)
            .unwrap_or(0),
        None => 0,
    };

    let remaining = &rows[start.min(rows.len())..];
    if opts.per_page == 0 || remaining.len() <= opts.per_page as usize {
        return (remaining.to_vec(), None);
    }

    let page: Vec<T> = remaining[..opts.per_page as usize].to_vec();
    let last = page.last().unwrap();
    let next_token = Some(
        PageToken {
            namespace: namespace_of(last),
            id: id_of(last),
            create_index: create_index_of(last),
        }
        .encode(),
    );
    (page, next_token)
}

/// Maps an `OrchError` to the HTTP-compatible wire code + message pair
/// (spec.md §6 Error wire format). Thin wrapper so callers at the RPC
/// boundary don't reach into `core::errors` directly.
pub fn to_wire_error(err: &OrchError) -> (u16, String) {
    (err.wire_code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Row {
        ns: String,
        id: String,
        create_index: u64,
    }

    #[test]
    fn paginate_splits_and_resumes() {
        let rows: Vec<Row> = (0..5)
            .map(|i| Row {
                ns: "default".into(),
                id: format!("r{i}"),
                create_index: i,
            })
            .collect();
        let opts = RequestQueryOptions {
            per_page: 2,
            ..Default::default()
        };
        let (page1, token1) = paginate(rows.clone(), &opts, |r| r.ns.clone(), |r| r.id.clone(), |r| r.create_index);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].id, "r0");
        assert!(token1.is_some());

        let opts2 = RequestQueryOptions {
            per_page: 2,
            next_token: token1,
            ..Default::default()
        };
        let (page2, _) = paginate(rows, &opts2, |r| r.ns.clone(), |r| r.id.clone(), |r| r.create_index);
        assert_eq!(page2[0].id, "r2");
    }

    #[test]
    fn per_page_zero_returns_all_remaining() {
        let rows: Vec<Row> = (0..5)
            .map(|i| Row {
                ns: "default".into(),
                id: format!("r{i}"),
                create_index: i,
            })
            .collect();
        let opts = RequestQueryOptions::default();
        let (page, token) = paginate(rows, &opts, |r| r.ns.clone(), |r| r.id.clone(), |r| r.create_index);
        assert_eq!(page.len(), 5);
        assert!(token.is_none());
    }
}
