//! Idle connection pool.
//!
//! Connections are keyed by scheme, host, port and the fingerprint profile
//! that established them. A checked out connection is owned by exactly one
//! request through its [`Pooled`] guard; dropping the guard either returns
//! the connection (when it was marked reusable) or closes it.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use crate::{
    connect::Connection,
    hash::{HashMap, HASHER},
    profile::ProfileId,
    sync::Mutex,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    pub(crate) https: bool,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) profile: ProfileId,
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.https { "https" } else { "http" };
        write!(f, "{scheme}://{}:{} ({})", self.host, self.port, self.profile)
    }
}

#[derive(Clone)]
pub(crate) struct Pool {
    inner: Arc<Mutex<PoolInner>>,
}

struct PoolInner {
    idle: HashMap<PoolKey, Vec<Idle>>,
    idle_timeout: Option<Duration>,
    max_idle_per_host: usize,
}

struct Idle {
    conn: Connection,
    since: Instant,
}

/// A connection checked out of the pool.
pub(crate) struct Pooled {
    value: Option<Connection>,
    key: PoolKey,
    pool: Weak<Mutex<PoolInner>>,
    reusable: bool,
    is_reused: bool,
}

impl Pool {
    pub(crate) fn new(idle_timeout: Option<Duration>, max_idle_per_host: usize) -> Pool {
        Pool {
            inner: Arc::new(Mutex::new(PoolInner {
                idle: HashMap::with_hasher(HASHER),
                idle_timeout,
                max_idle_per_host,
            })),
        }
    }

    /// Takes the most recently returned live connection for `key`.
    ///
    /// Expired and closed connections of every key are dropped first.
    pub(crate) fn checkout(&self, key: &PoolKey) -> Option<Pooled> {
        let mut inner = self.inner.lock();
        inner.clear_expired();

        let found = inner.idle.get_mut(key).and_then(Vec::pop);
        if inner.idle.get(key).is_some_and(Vec::is_empty) {
            inner.idle.remove(key);
        }
        drop(inner);

        match found {
            Some(idle) => {
                log::debug!("pool: reuse idle connection for {key}");
                Some(Pooled {
                    value: Some(idle.conn),
                    key: key.clone(),
                    pool: Arc::downgrade(&self.inner),
                    reusable: false,
                    is_reused: true,
                })
            }
            None => {
                log::trace!("pool: no idle connection for {key}");
                None
            }
        }
    }

    /// Wraps a freshly established connection so it can be returned later.
    pub(crate) fn pooled(&self, key: PoolKey, conn: Connection) -> Pooled {
        Pooled {
            value: Some(conn),
            key,
            pool: Arc::downgrade(&self.inner),
            reusable: false,
            is_reused: false,
        }
    }

    /// Number of idle connections for `key`.
    #[cfg(test)]
    pub(crate) fn idle_count(&self, key: &PoolKey) -> usize {
        self.inner.lock().idle.get(key).map_or(0, Vec::len)
    }

    fn put(inner: &Mutex<PoolInner>, key: PoolKey, conn: Connection) {
        let mut inner = inner.lock();
        let max = inner.max_idle_per_host;
        if max == 0 {
            log::trace!("pool: idle connections disabled, closing {key}");
            return;
        }
        inner.clear_expired();

        let list = inner.idle.entry(key.clone()).or_default();
        if list.len() >= max {
            log::debug!("pool: max idle per host reached for {key}, closing");
            return;
        }
        log::trace!("pool: connection for {key} returned");
        list.push(Idle {
            conn,
            since: Instant::now(),
        });
    }
}

impl PoolInner {
    /// Drops expired and closed idle connections under every key.
    fn clear_expired(&mut self) {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;

        self.idle.retain(|key, list| {
            list.retain(|idle| {
                let age = now.saturating_duration_since(idle.since);
                if idle_timeout.is_some_and(|timeout| age > timeout) {
                    log::debug!("pool: removing expired connection for {key}");
                    return false;
                }
                if !idle.conn.conn.is_open() {
                    log::debug!("pool: removing closed connection for {key}");
                    return false;
                }
                true
            });
            !list.is_empty()
        });
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pool")
            .field("idle_timeout", &inner.idle_timeout)
            .field("max_idle_per_host", &inner.max_idle_per_host)
            .field("hosts", &inner.idle.len())
            .finish()
    }
}

impl Pooled {
    /// Lets the connection go back to the pool when this guard drops.
    pub(crate) fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    /// Whether the connection came from the pool rather than a fresh connect.
    pub(crate) fn is_reused(&self) -> bool {
        self.is_reused
    }
}

impl Deref for Pooled {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.value.as_ref().expect("not dropped")
    }
}

impl DerefMut for Pooled {
    fn deref_mut(&mut self) -> &mut Connection {
        self.value.as_mut().expect("not dropped")
    }
}

impl Drop for Pooled {
    fn drop(&mut self) {
        let Some(conn) = self.value.take() else {
            return;
        };

        if !self.reusable {
            log::debug!("pool: discarding connection for {}", self.key);
            return;
        }

        if let Some(pool) = self.pool.upgrade() {
            Pool::put(&pool, self.key.clone(), conn);
        }
    }
}

impl fmt::Debug for Pooled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("key", &self.key)
            .field("reusable", &self.reusable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};

    use super::*;
    use crate::connect::Conn;

    fn key(host: &str) -> PoolKey {
        PoolKey {
            https: false,
            host: host.to_owned(),
            port: 80,
            profile: ProfileId::from("chrome_120"),
        }
    }

    fn connection(listener: &TcpListener) -> (Connection, TcpStream) {
        let addr = listener.local_addr().unwrap();
        let tcp = TcpStream::connect(addr).unwrap();
        let (peer, _) = listener.accept().unwrap();
        let conn = Connection {
            conn: Conn::Http(tcp),
            remote_addr: addr,
            tls: None,
        };
        (conn, peer)
    }

    #[test]
    fn reusable_connection_returns_to_pool() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let pool = Pool::new(Some(Duration::from_secs(90)), 4);
        let (conn, _peer) = connection(&listener);

        let mut pooled = pool.pooled(key("a"), conn);
        assert!(!pooled.is_reused());
        pooled.mark_reusable();
        drop(pooled);
        assert_eq!(pool.idle_count(&key("a")), 1);

        let pooled = pool.checkout(&key("a")).expect("idle connection");
        assert!(pooled.is_reused());
        assert_eq!(pool.idle_count(&key("a")), 0);
        assert!(pool.checkout(&key("b")).is_none());
    }

    #[test]
    fn unmarked_connection_is_discarded() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let pool = Pool::new(None, 4);
        let (conn, _peer) = connection(&listener);

        drop(pool.pooled(key("a"), conn));
        assert_eq!(pool.idle_count(&key("a")), 0);
    }

    #[test]
    fn keys_differ_by_profile() {
        let mut other = key("a");
        other.profile = ProfileId::from("firefox_121");
        assert_ne!(key("a"), other);
        assert_eq!(key("a").to_string(), "http://a:80 (chrome_120)");
    }

    #[test]
    fn max_idle_per_host_is_respected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let pool = Pool::new(None, 1);
        let mut peers = Vec::new();

        for _ in 0..2 {
            let (conn, peer) = connection(&listener);
            peers.push(peer);
            let mut pooled = pool.pooled(key("a"), conn);
            pooled.mark_reusable();
        }
        assert_eq!(pool.idle_count(&key("a")), 1);
    }

    #[test]
    fn expired_and_closed_connections_are_skipped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        let pool = Pool::new(Some(Duration::from_millis(1)), 4);
        let (conn, _peer) = connection(&listener);
        let mut pooled = pool.pooled(key("a"), conn);
        pooled.mark_reusable();
        drop(pooled);
        std::thread::sleep(Duration::from_millis(20));
        assert!(pool.checkout(&key("a")).is_none());

        let pool = Pool::new(None, 4);
        let (conn, peer) = connection(&listener);
        let mut pooled = pool.pooled(key("a"), conn);
        pooled.mark_reusable();
        drop(pooled);
        drop(peer);
        std::thread::sleep(Duration::from_millis(50));
        assert!(pool.checkout(&key("a")).is_none());
        assert_eq!(pool.idle_count(&key("a")), 0);
    }

    #[test]
    fn stale_connections_of_other_keys_are_cleared() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let pool = Pool::new(Some(Duration::from_millis(30)), 4);

        let (conn, _peer_a) = connection(&listener);
        let mut pooled = pool.pooled(key("a"), conn);
        pooled.mark_reusable();
        drop(pooled);
        std::thread::sleep(Duration::from_millis(60));

        let (conn, _peer_b) = connection(&listener);
        let mut pooled = pool.pooled(key("b"), conn);
        pooled.mark_reusable();
        drop(pooled);
        assert_eq!(pool.idle_count(&key("a")), 0);
        assert_eq!(pool.idle_count(&key("b")), 1);

        let pool = Pool::new(None, 4);
        let (conn, peer_c) = connection(&listener);
        let mut pooled = pool.pooled(key("c"), conn);
        pooled.mark_reusable();
        drop(pooled);
        let (conn, _peer_d) = connection(&listener);
        let mut pooled = pool.pooled(key("d"), conn);
        pooled.mark_reusable();
        drop(pooled);

        drop(peer_c);
        std::thread::sleep(Duration::from_millis(50));
        assert!(pool.checkout(&key("d")).is_some());
        assert_eq!(pool.idle_count(&key("c")), 0);
        assert!(pool.inner.lock().idle.is_empty());
    }

    #[test]
    fn concurrent_checkouts_never_share_a_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peers = Arc::new(Mutex::new(Vec::new()));
        std::thread::spawn({
            let peers = peers.clone();
            move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    peers.lock().push(stream);
                }
            }
        });

        let pool = Pool::new(None, 2);
        let in_use = Arc::new(Mutex::new(std::collections::HashSet::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let in_use = in_use.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let mut pooled = pool.checkout(&key("a")).unwrap_or_else(|| {
                            let conn = Connection {
                                conn: Conn::Http(TcpStream::connect(addr).unwrap()),
                                remote_addr: addr,
                                tls: None,
                            };
                            pool.pooled(key("a"), conn)
                        });
                        let port = match pooled.conn {
                            Conn::Http(ref tcp) => tcp.local_addr().unwrap().port(),
                            Conn::Https(_) => unreachable!(),
                        };
                        assert!(in_use.lock().insert(port), "port {port} checked out twice");
                        std::thread::yield_now();
                        assert!(in_use.lock().remove(&port));

                        pooled.mark_reusable();
                        drop(pooled);
                        assert!(pool.idle_count(&key("a")) <= 2);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.idle_count(&key("a")) <= 2);
        assert!(in_use.lock().is_empty());
    }

    #[test]
    fn dropped_pool_closes_returned_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let pool = Pool::new(None, 4);
        let (conn, _peer) = connection(&listener);
        let mut pooled = pool.pooled(key("a"), conn);
        pooled.mark_reusable();
        drop(pool);
        drop(pooled);
    }
}
