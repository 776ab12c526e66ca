//! Session registry
//!
//! Maps server-generated session ids to their transports. Backed by a sharded
//! `DashMap` so concurrent turns against different sessions never contend on
//! one lock. Entries are removed by the transport itself when it closes.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::mcp::{ProcedureRegistry, Transport};

pub(crate) type SessionMap = DashMap<SessionId, Arc<Session>>;

/// Opaque session identifier (UUID v4, always minted by the server)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One live protocol session
pub struct Session {
    id: SessionId,
    transport: Arc<Transport>,
    created_at: DateTime<Utc>,
    client_id: String,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Client that initialized the session
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.transport.state())
            .field("created_at", &self.created_at)
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    procedures: Arc<ProcedureRegistry>,
}

impl SessionRegistry {
    pub fn new(procedures: ProcedureRegistry) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            procedures: Arc::new(procedures),
        }
    }

    pub fn procedures(&self) -> &ProcedureRegistry {
        &self.procedures
    }

    /// Allocate a fresh id and register an uninitialized transport under it
    pub fn create_session(&self, client_id: &str) -> Arc<Session> {
        self.create_session_with(client_id, SessionId::generate)
    }

    pub(crate) fn create_session_with(
        &self,
        client_id: &str,
        mut next_id: impl FnMut() -> SessionId,
    ) -> Arc<Session> {
        loop {
            let id = next_id();
            match self.sessions.entry(id) {
                Entry::Occupied(occupied) => {
                    warn!(
                        session_id = %occupied.key(),
                        "[Session] Generated id already in use, regenerating"
                    );
                }
                Entry::Vacant(vacant) => {
                    let id = vacant.key().clone();
                    let transport = Arc::new(Transport::new(
                        id.clone(),
                        self.procedures.clone(),
                        Arc::downgrade(&self.sessions),
                    ));
                    let session = Arc::new(Session {
                        id: id.clone(),
                        transport,
                        created_at: Utc::now(),
                        client_id: client_id.to_string(),
                    });
                    vacant.insert(session.clone());
                    info!(
                        session_id = %id,
                        client = %client_id,
                        "[Session] Created"
                    );
                    return session;
                }
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Drop the entry without touching its transport. Idempotent.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Close the session's transport, which removes the entry.
    ///
    /// Returns false when the id is unknown.
    pub fn close(&self, id: &str) -> bool {
        // The map guard must be released before the transport removes itself
        let Some(session) = self.lookup(id) else {
            return false;
        };
        session.transport().close();
        true
    }

    /// Close every session (host shutdown)
    pub fn close_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let count = sessions.len();
        for session in sessions {
            session.transport().close();
        }
        if count > 0 {
            info!("[Session] Closed {} session(s) on shutdown", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ProcedureRegistry::with_defaults())
    }
}
