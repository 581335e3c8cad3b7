// SPDX-License-Identifier: AGPL-3.0-or-later

//! The session registry: one mutex-guarded (here, lock-free `DashMap`) set
//! held by the acceptor, tracking every live Session so shutdown can tell
//! them all to terminate (§4.G, §5 "Session registry").

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// A registry-owned handle to one live Session. Cloning shares the same
/// underlying cancellation token; dropping the last clone does not, by
/// itself, terminate the session (the session's own I/O loop observes
/// `terminate.is_cancelled()` at its own pace, matching §9's "registry
/// removal does not immediately destroy the session if work is
/// outstanding").
#[derive(Clone)]
pub struct SessionHandle {
    pub id: u64,
    terminate: CancellationToken,
}

impl SessionHandle {
    pub fn request_terminate(&self) {
        self.terminate.cancel();
    }

    pub fn terminate_token(&self) -> CancellationToken {
        self.terminate.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.is_cancelled()
    }
}

/// Registers and deregisters live sessions by id. `register` allocates the
/// id; callers use the returned handle both to check for shutdown and to
/// deregister themselves when their I/O loop exits.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, SessionHandle>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle { id, terminate: CancellationToken::new() };
        self.sessions.insert(id, handle.clone());
        handle
    }

    pub fn deregister(&self, id: u64) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tells every live session to terminate (§4.J shutdown step 4).
    pub fn terminate_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().request_terminate();
        }
    }
}
