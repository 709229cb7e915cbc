//! Blocking TCP and TLS transport.
//!
//! A [`Connector`] resolves the target host (honouring `resolve` overrides),
//! connects over TCP and, for `https`, runs the fingerprinted handshake of the
//! client's [`TlsConnector`].

use std::{
    error::Error as StdError,
    fmt,
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    time::{Duration, Instant},
};

use boring2::ssl::SslStream;

use crate::{
    error::{BoxError, TimedOut},
    hash::{HashMap, HASHER},
    tls::{TlsConnector, TlsInfo},
    Error, Result,
};

/// An established transport, plain or TLS.
pub(crate) enum Conn {
    Http(TcpStream),
    Https(Box<SslStream<TcpStream>>),
}

/// A transport together with what is known about how it was established.
pub(crate) struct Connection {
    pub(crate) conn: Conn,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) tls: Option<TlsInfo>,
}

impl Conn {
    fn tcp(&self) -> &TcpStream {
        match self {
            Conn::Http(tcp) => tcp,
            Conn::Https(tls) => tls.get_ref(),
        }
    }

    /// Applies the time left until `deadline` to both socket directions.
    ///
    /// Fails right away when the deadline already passed.
    pub(crate) fn set_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        let timeout = remaining(deadline)?;
        let tcp = self.tcp();
        tcp.set_read_timeout(timeout).map_err(Error::request)?;
        tcp.set_write_timeout(timeout).map_err(Error::request)?;
        Ok(())
    }

    /// Checks that an idle connection was not closed by the peer.
    ///
    /// A connection with unread bytes is unusable too: the server sent
    /// something no request asked for.
    pub(crate) fn is_open(&self) -> bool {
        let tcp = self.tcp();
        if tcp.set_nonblocking(true).is_err() {
            return false;
        }

        let mut byte = [0u8; 1];
        let open = match tcp.peek(&mut byte) {
            Ok(_) => false,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        };

        tcp.set_nonblocking(false).is_ok() && open
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Http(tcp) => tcp.read(buf),
            Conn::Https(tls) => tls.read(buf),
        }
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Conn::Http(tcp) => tcp.write(buf),
            Conn::Https(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Conn::Http(tcp) => tcp.flush(),
            Conn::Https(tls) => tls.flush(),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote_addr", &self.remote_addr)
            .field("tls", &self.tls.as_ref().map(TlsInfo::version))
            .finish()
    }
}

/// Time left until `deadline`, `None` meaning no limit.
pub(crate) fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>> {
    match deadline {
        None => Ok(None),
        Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(Some(left)),
            _ => Err(Error::request(TimedOut)),
        },
    }
}

#[derive(Clone)]
pub(crate) struct Connector {
    tls: TlsConnector,
    config: Arc<Config>,
}

pub(crate) struct Config {
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) nodelay: bool,
    pub(crate) overrides: HashMap<String, Vec<SocketAddr>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout: None,
            nodelay: true,
            overrides: HashMap::with_hasher(HASHER),
        }
    }
}

impl Connector {
    pub(crate) fn new(tls: TlsConnector, config: Config) -> Connector {
        Connector {
            tls,
            config: Arc::new(config),
        }
    }

    pub(crate) fn tls(&self) -> &TlsConnector {
        &self.tls
    }

    /// Opens a new connection to `host:port`, running the TLS handshake when
    /// `https` is set.
    pub(crate) fn connect(
        &self,
        https: bool,
        host: &str,
        port: u16,
        deadline: Option<Instant>,
    ) -> Result<Connection> {
        let (tcp, remote_addr) = self.connect_tcp(host, port, deadline)?;

        if !https {
            return Ok(Connection {
                conn: Conn::Http(tcp),
                remote_addr,
                tls: None,
            });
        }

        // The handshake runs under the overall deadline.
        let timeout = remaining(deadline)?;
        tcp.set_read_timeout(timeout).map_err(Error::connect)?;
        tcp.set_write_timeout(timeout).map_err(Error::connect)?;
        let (stream, info) = self.tls.connect(host, port, tcp)?;

        Ok(Connection {
            conn: Conn::Https(Box::new(stream)),
            remote_addr,
            tls: Some(info),
        })
    }

    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if let Some(addrs) = self.config.overrides.get(host) {
            let mut addrs = addrs.clone();
            for addr in &mut addrs {
                addr.set_port(port);
            }
            log::trace!("resolve override for {host}: {addrs:?}");
            return Ok(addrs);
        }

        let name = host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = (name, port)
            .to_socket_addrs()
            .map_err(|e| Error::connect(ConnectError::dns(e)))?
            .collect();

        if addrs.is_empty() {
            return Err(Error::connect(ConnectError::dns(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses resolved",
            ))));
        }
        Ok(addrs)
    }

    fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        deadline: Option<Instant>,
    ) -> Result<(TcpStream, SocketAddr)> {
        let addrs = self.resolve(host, port)?;

        // The connect timeout is shared between all resolved addresses.
        let per_addr = self
            .config
            .connect_timeout
            .and_then(|t| t.checked_div(addrs.len() as u32));

        let mut err = None;
        for addr in addrs {
            let left = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(Error::connect(TimedOut)),
                },
                None => None,
            };
            let timeout = match (per_addr, left) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            log::debug!("connecting to {addr}");
            let res = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match res {
                Ok(tcp) => {
                    log::debug!("connected to {addr}");
                    if let Err(e) = tcp.set_nodelay(self.config.nodelay) {
                        log::warn!("tcp set_nodelay error: {e}");
                    }
                    return Ok((tcp, addr));
                }
                Err(e) => {
                    // Only keep the first error; it is the most relevant.
                    if err.is_none() {
                        err = Some(ConnectError::new("tcp connect error", e).with_addr(addr));
                    }
                }
            }
        }

        Err(Error::connect(err.unwrap_or_else(|| {
            ConnectError::new(
                "tcp connect error",
                io::Error::new(io::ErrorKind::NotConnected, "Network unreachable"),
            )
        })))
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("tls", &self.tls)
            .field("connect_timeout", &self.config.connect_timeout)
            .field("nodelay", &self.config.nodelay)
            .finish()
    }
}

pub(crate) struct ConnectError {
    msg: &'static str,
    addr: Option<SocketAddr>,
    cause: Option<BoxError>,
}

impl ConnectError {
    fn new<E>(msg: &'static str, cause: E) -> ConnectError
    where
        E: Into<BoxError>,
    {
        ConnectError {
            msg,
            addr: None,
            cause: Some(cause.into()),
        }
    }

    fn dns<E>(cause: E) -> ConnectError
    where
        E: Into<BoxError>,
    {
        ConnectError::new("dns error", cause)
    }

    fn with_addr(mut self, addr: SocketAddr) -> ConnectError {
        self.addr = Some(addr);
        self
    }
}

impl fmt::Debug for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = f.debug_tuple("ConnectError");
        b.field(&self.msg);
        if let Some(ref addr) = self.addr {
            b.field(addr);
        }
        if let Some(ref cause) = self.cause {
            b.field(cause);
        }
        b.finish()
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.msg)?;
        if let Some(ref addr) = self.addr {
            write!(f, " ({addr})")?;
        }
        Ok(())
    }
}

impl StdError for ConnectError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| &**e as _)
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;
    use crate::{
        profile::Catalog,
        tls::TlsOptions,
    };

    fn connector(config: Config) -> Connector {
        let profile = Catalog::builtin().get("chrome_120").unwrap().clone();
        let tls = TlsConnector::new(profile, &TlsOptions::default()).unwrap();
        Connector::new(tls, config)
    }

    #[test]
    fn remaining_fails_after_deadline() {
        assert_eq!(remaining(None).unwrap(), None);
        let past = Instant::now() - Duration::from_millis(5);
        assert!(remaining(Some(past)).unwrap_err().is_timeout());
        let future = Instant::now() + Duration::from_secs(60);
        assert!(remaining(Some(future)).unwrap().is_some());
    }

    #[test]
    fn connects_through_resolve_override() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = Config::default();
        config
            .overrides
            .insert("fake.test".to_owned(), vec!["127.0.0.1:0".parse().unwrap()]);

        let conn = connector(config)
            .connect(false, "fake.test", port, None)
            .unwrap();
        assert_eq!(conn.remote_addr.port(), port);
        assert!(conn.tls.is_none());
        assert!(conn.conn.is_open());
    }

    #[test]
    fn override_port_is_replaced_by_url_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let unused = if port == 1 { 2 } else { 1 };

        let mut config = Config::default();
        config.overrides.insert(
            "fake.test".to_owned(),
            vec![SocketAddr::from(([127, 0, 0, 1], unused))],
        );

        let conn = connector(config)
            .connect(false, "fake.test", port, None)
            .unwrap();
        assert_eq!(conn.remote_addr.port(), port);
    }

    #[test]
    fn refused_is_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connector(Config::default())
            .connect(false, "127.0.0.1", port, None)
            .unwrap_err();
        assert!(err.is_connect(), "{err:?}");
    }

    #[test]
    fn closed_peer_is_not_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let conn = connector(Config::default())
            .connect(false, "127.0.0.1", port, None)
            .unwrap();
        let (accepted, _) = listener.accept().unwrap();
        drop(accepted);

        // Give the FIN time to arrive.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!conn.conn.is_open());
    }
}
