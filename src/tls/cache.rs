use std::{
    borrow::Borrow,
    collections::hash_map::Entry,
    hash::{Hash, Hasher},
};

use boring2::ssl::{SslSession, SslSessionRef, SslVersion};
use schnellru::ByLength;

use crate::hash::{HashMap, LruMap, HASHER};

/// Sessions are looked up by the `host:port` they were negotiated with.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub(crate) struct SessionKey(pub(crate) String);

/// Hashes and compares an `SslSession` by its session ID.
#[derive(Clone)]
struct HashSession(SslSession);

impl PartialEq for HashSession {
    fn eq(&self, other: &HashSession) -> bool {
        self.0.id() == other.0.id()
    }
}

impl Eq for HashSession {}

impl Hash for HashSession {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.0.id().hash(state);
    }
}

impl Borrow<[u8]> for HashSession {
    fn borrow(&self) -> &[u8] {
        self.0.id()
    }
}

/// Resumable sessions per origin, oldest evicted first.
pub(crate) struct SessionCache {
    reverse: HashMap<HashSession, SessionKey>,
    per_host_sessions: HashMap<SessionKey, LruMap<HashSession, ()>>,
    per_host_session_capacity: usize,
}

impl SessionCache {
    pub(crate) fn with_capacity(per_host_session_capacity: usize) -> SessionCache {
        SessionCache {
            per_host_sessions: HashMap::with_hasher(HASHER),
            reverse: HashMap::with_hasher(HASHER),
            per_host_session_capacity,
        }
    }

    pub(crate) fn insert(&mut self, key: SessionKey, session: SslSession) {
        log::trace!("tls: caching session for {}", key.0);

        let capacity = self.per_host_session_capacity;
        let per_host_sessions = self
            .per_host_sessions
            .entry(key.clone())
            .or_insert_with(|| LruMap::with_hasher(ByLength::new(capacity as u32), HASHER));

        if per_host_sessions.len() >= capacity {
            if let Some((evicted_session, _)) = per_host_sessions.pop_oldest() {
                self.reverse.remove(&evicted_session);
            }
        }

        let session = HashSession(session);
        per_host_sessions.insert(session.clone(), ());
        self.reverse.insert(session, key);
    }

    pub(crate) fn get(&mut self, key: &SessionKey) -> Option<SslSession> {
        let session = {
            let per_host_sessions = self.per_host_sessions.get_mut(key)?;
            per_host_sessions.peek_oldest()?.0.clone().0
        };

        // TLS 1.3 tickets are single use (RFC 8446 C.4); two concurrent handshakes
        // must not resume from the same one.
        if session.protocol_version() == SslVersion::TLS1_3 {
            self.remove(&session);
        }

        Some(session)
    }

    fn remove(&mut self, session: &SslSessionRef) {
        let Some(key) = self.reverse.remove(session.id()) else {
            return;
        };

        if let Entry::Occupied(mut per_host_sessions) = self.per_host_sessions.entry(key) {
            per_host_sessions
                .get_mut()
                .remove(&HashSession(session.to_owned()));
            if per_host_sessions.get().is_empty() {
                per_host_sessions.remove();
            }
        }
    }
}
