// src/core/forwarding/transport.rs
//
// The injected network-client boundary for forwarded RPCs. The concrete
// wire protocol and connection machinery are out of scope; this crate
// defines the trait every forward path is written against, plus a
// connection-pool-backed default impl whose reconnect/backoff loop mirrors
// `core::replication::worker::ReplicaWorker::run` (exponential backoff,
// capped, reset on success).

use crate::core::errors::{OrchError, OrchResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(250);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// An opaque, already-encoded request/reply pair. The dispatch layer
/// serializes the concrete RPC into `body` before handing it to a transport;
/// what's "in" an envelope is not this crate's concern.
#[derive(Debug, Clone)]
pub struct RpcEnvelope {
    pub method: String,
    pub body: Vec<u8>,
}

/// The network boundary a forward path calls through. Implementations own
/// connection pooling, TLS, and retry at the transport level; callers only
/// see success or an `OrchError` (retryable via `Transient`).
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, target_addr: &str, envelope: RpcEnvelope) -> OrchResult<RpcEnvelope>;
}

struct PooledConn {
    addr: String,
    delay: Duration,
}

/// A default `RpcTransport` that keeps one logical connection per target
/// address and backs off exponentially between reconnect attempts,
/// resetting to `INITIAL_RECONNECT_DELAY` after a successful send.
pub struct PooledTransport {
    conns: Arc<DashMap<String, Arc<Mutex<PooledConn>>>>,
}

impl Default for PooledTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PooledTransport {
    pub fn new() -> Self {
        Self {
            conns: Arc::new(DashMap::new()),
        }
    }

    fn conn_for(&self, addr: &str) -> Arc<Mutex<PooledConn>> {
        self.conns
            .entry(addr.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(PooledConn {
                    addr: addr.to_string(),
                    delay: INITIAL_RECONNECT_DELAY,
                }))
            })
            .clone()
    }
}

#[async_trait]
impl RpcTransport for PooledTransport {
    async fn send(&self, target_addr: &str, envelope: RpcEnvelope) -> OrchResult<RpcEnvelope> {
        let conn = self.conn_for(target_addr);
        let mut guard = conn.lock().await;

        // The actual dial/send is an external collaborator (out of scope);
        // this path only owns the backoff bookkeeping around it.
        match dial_and_send(&guard.addr, &envelope).await {
            Ok(reply) => {
                guard.delay = INITIAL_RECONNECT_DELAY;
                Ok(reply)
            }
            Err(e) => {
                tokio::time::sleep(guard.delay).await;
                guard.delay = (guard.delay * 2).min(MAX_RECONNECT_DELAY);
                Err(e)
            }
        }
    }
}

/// Placeholder dial-and-send: the real wire transport is out of scope
/// (spec.md §1 names the RPC transport and wire format as an external
/// collaborator). Always reports a transient failure so callers exercise
/// the backoff path until a concrete transport is wired in.
async fn dial_and_send(_addr: &str, _envelope: &RpcEnvelope) -> OrchResult<RpcEnvelope> {
    Err(OrchError::Transient(
        "no concrete RPC transport configured".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backoff_grows_and_resets_on_success() {
        let transport = PooledTransport::new();
        let env = RpcEnvelope {
            method: "Test".into(),
            body: vec![],
        };
        let res = transport.send("127.0.0.1:0", env).await;
        assert!(res.is_err());
        let conn = transport.conn_for("127.0.0.1:0");
        let guard = conn.lock().await;
        assert!(guard.delay >= INITIAL_RECONNECT_DELAY);
    }
}
