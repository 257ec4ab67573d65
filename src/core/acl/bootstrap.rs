// src/core/acl/bootstrap.rs

//! The `<data-dir>/acl-bootstrap-reset` side channel: a single integer text
//! file whose contents are the reset-index permitting re-bootstrap of the
//! first management token. Parsed defensively — any parse failure is
//! treated as absent, mirroring the teacher's `resolve_maxmemory` style of
//! tolerating malformed operator input rather than failing hard.

use crate::core::domain::Token;
use crate::core::raft::requests::RaftRequest;
use std::path::Path;

const BOOTSTRAP_RESET_FILE: &str = "acl-bootstrap-reset";

pub fn read_reset_index(data_dir: &Path) -> Option<u64> {
    let path = data_dir.join(BOOTSTRAP_RESET_FILE);
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

/// Reads the reset-index side channel and packages it with `management_token`
/// into the `RaftRequest` the FSM's `Bootstrap` arm decides against. The file
/// is read here, at request-construction time, rather than inside `fsm::apply`
/// — the FSM must stay deterministic and may not touch the filesystem.
pub fn build_bootstrap_request(data_dir: &Path, management_token: Token) -> RaftRequest {
    RaftRequest::Bootstrap {
        management_token,
        reset_index: read_reset_index(data_dir),
    }
}
