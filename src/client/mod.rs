//! The blocking [`Client`] and its builder.

mod body;
mod decoder;
mod exec;
mod request;
mod response;

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use http::Method;

pub use self::{body::Body, request::RequestBuilder, response::Response};
use self::decoder::{Accepts, DEFAULT_MAX_DECODED_LEN};
use crate::{
    connect::{self, Connector},
    hash::{HashMap, HASHER},
    header::{parse_header, HeaderMap, HeaderValue, OrigHeaderMap, ACCEPT, ACCEPT_ENCODING},
    into_url::IntoUrl,
    pool::Pool,
    profile::{Catalog, FingerprintProfile, ProfileId, ProfileSelector},
    redirect::{self, MethodRewrite},
    tls::{Certificate, RootCerts, TlsConnector, TlsOptions},
    util::replace_headers,
    Error, Result,
};

/// A blocking `Client` to make Requests with.
///
/// A `Client` is bound to one [`FingerprintProfile`] for its whole life: every
/// TLS handshake it makes offers that profile's ClientHello, and every request
/// carries the profile's default headers in the profile's order. Build a new
/// client to get a new profile.
///
/// Configuration methods such as [`Client::headers`] and [`Client::follow`]
/// never change the receiver; they return a new `Client` sharing the same
/// profile and connection pool. A `Client` is cheap to clone and safe to use
/// from many threads at once.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

#[derive(Clone)]
pub(crate) struct ClientRef {
    pub(crate) headers: HeaderMap,
    pub(crate) casing: OrigHeaderMap,
    pub(crate) order: OrigHeaderMap,
    pub(crate) redirect: redirect::Policy,
    pub(crate) rewrite: MethodRewrite,
    pub(crate) referer: bool,
    pub(crate) https_only: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) json_defaults: bool,
    pub(crate) accepts: Accepts,
    pub(crate) connector: Connector,
    pub(crate) pool: Pool,
}

/// A `ClientBuilder` can be used to create a `Client` with custom configuration.
#[must_use]
pub struct ClientBuilder {
    config: Config,
}

struct Config {
    profile: Option<ProfileId>,
    catalog: Catalog,
    selector: ProfileSelector,
    headers: HeaderMap,
    casing: OrigHeaderMap,
    json_defaults: bool,
    max_decoded_len: usize,
    redirect: redirect::Policy,
    rewrite: MethodRewrite,
    referer: bool,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    pool_idle_timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
    nodelay: bool,
    dns_overrides: HashMap<String, Vec<SocketAddr>>,
    tls: TlsOptions,
    https_only: bool,
    error: Option<Error>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Constructs a new `ClientBuilder`.
    ///
    /// This is the same as `Client::builder()`.
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            config: Config {
                profile: None,
                catalog: Catalog::builtin(),
                selector: ProfileSelector::default(),
                headers: HeaderMap::new(),
                casing: OrigHeaderMap::new(),
                json_defaults: false,
                max_decoded_len: DEFAULT_MAX_DECODED_LEN,
                redirect: redirect::Policy::default(),
                rewrite: MethodRewrite::default(),
                referer: true,
                connect_timeout: None,
                timeout: None,
                pool_idle_timeout: Some(Duration::from_secs(90)),
                pool_max_idle_per_host: usize::MAX,
                nodelay: true,
                dns_overrides: HashMap::with_hasher(HASHER),
                tls: TlsOptions::default(),
                https_only: false,
                error: None,
            },
        }
    }

    /// Returns a `Client` that uses this `ClientBuilder` configuration.
    ///
    /// The fingerprint profile is chosen here: the pinned one when
    /// [`ClientBuilder::profile`] was called, otherwise one picked by the
    /// selector from the catalog.
    ///
    /// # Errors
    ///
    /// This method fails if a header or option given earlier was invalid, the
    /// pinned profile is not in the catalog, or the TLS context cannot be
    /// initialized.
    pub fn build(self) -> Result<Client> {
        let mut config = self.config;

        if let Some(err) = config.error {
            return Err(err);
        }

        let profile = match config.profile {
            Some(id) => config.catalog.get(id.as_str()).cloned().ok_or_else(|| {
                Error::builder(format!("profile `{id}` is not in the catalog"))
            })?,
            None => config.selector.select(&config.catalog),
        };

        let (mut headers, mut casing) = profile.default_headers()?;
        let accepts = Accepts {
            max_decoded_len: config.max_decoded_len,
        };
        if let Some(value) = headers.get(ACCEPT_ENCODING) {
            match accepts.filter(value) {
                Some(value) => {
                    headers.insert(ACCEPT_ENCODING, value);
                }
                None => {
                    headers.remove(ACCEPT_ENCODING);
                }
            }
        }
        if config.json_defaults && !config.headers.contains_key(ACCEPT) {
            config
                .headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        replace_headers(&mut headers, config.headers);
        casing.extend(&config.casing);

        let tls = TlsConnector::new(profile.clone(), &config.tls)?;
        let connector = Connector::new(
            tls,
            connect::Config {
                connect_timeout: config.connect_timeout,
                nodelay: config.nodelay,
                overrides: config.dns_overrides,
            },
        );

        log::debug!("client built with fingerprint profile {}", profile.id());

        Ok(Client {
            inner: Arc::new(ClientRef {
                headers,
                casing,
                order: profile.header_order(),
                redirect: config.redirect,
                rewrite: config.rewrite,
                referer: config.referer,
                https_only: config.https_only,
                timeout: config.timeout,
                json_defaults: config.json_defaults,
                accepts,
                connector,
                pool: Pool::new(config.pool_idle_timeout, config.pool_max_idle_per_host),
            }),
        })
    }

    // Fingerprint options

    /// Pins the fingerprint profile with the given id instead of letting the
    /// selector pick one.
    pub fn profile<I>(mut self, id: I) -> ClientBuilder
    where
        I: Into<ProfileId>,
    {
        self.config.profile = Some(id.into());
        self
    }

    /// Replaces the built-in catalog the profile is chosen from.
    pub fn catalog(mut self, catalog: Catalog) -> ClientBuilder {
        self.config.catalog = catalog;
        self
    }

    /// Sets the selector used when no profile is pinned.
    ///
    /// Default is the process-wide selector. Use [`ProfileSelector::seeded`]
    /// for a reproducible choice.
    pub fn selector(mut self, selector: ProfileSelector) -> ClientBuilder {
        self.config.selector = selector;
        self
    }

    // Header options

    /// Sets the default headers for every request.
    ///
    /// They are layered over the profile's browser headers; a name given here
    /// replaces the profile's value.
    pub fn default_headers(mut self, headers: HeaderMap) -> ClientBuilder {
        replace_headers(&mut self.config.headers, headers);
        self
    }

    /// Adds one default header, sent with the exact spelling of `name`.
    pub fn header<K, V>(mut self, name: K, value: V) -> ClientBuilder
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        match parse_header(name, value) {
            Ok((name, orig, value)) => {
                self.config.headers.insert(name, value);
                self.config.casing.set(orig);
            }
            Err(e) => {
                self.config.error.get_or_insert(e);
            }
        }
        self
    }

    /// Makes JSON the default media type.
    ///
    /// When enabled, requests send `Accept: application/json` instead of the
    /// profile's `Accept` unless an `Accept` header is given to this builder,
    /// and `POST`, `PUT` and `PATCH` requests send
    /// `Content-Type: application/json` unless they set a content type.
    ///
    /// Default is `false`, which keeps the browser's headers.
    pub fn json_defaults(mut self, enabled: bool) -> ClientBuilder {
        self.config.json_defaults = enabled;
        self
    }

    // Redirect options

    /// Set a `RedirectPolicy` for this client.
    ///
    /// Default will follow redirects up to a maximum of 10.
    pub fn redirect(mut self, policy: redirect::Policy) -> ClientBuilder {
        self.config.redirect = policy;
        self
    }

    /// Sets how `301` and `302` redirects change the request method.
    ///
    /// Default is [`MethodRewrite::Legacy`].
    pub fn redirect_rewrite(mut self, rewrite: MethodRewrite) -> ClientBuilder {
        self.config.rewrite = rewrite;
        self
    }

    /// Enable or disable automatic setting of the `Referer` header.
    ///
    /// Default is `true`.
    pub fn referer(mut self, enable: bool) -> ClientBuilder {
        self.config.referer = enable;
        self
    }

    // Timeout options

    /// Enables a request timeout.
    ///
    /// The timeout is applied from when the request starts connecting until the
    /// response body has finished, across every redirect hop.
    ///
    /// Default is no timeout.
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set a timeout for only the connect phase of a `Client`.
    ///
    /// Default is `None`.
    pub fn connect_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.config.connect_timeout = Some(timeout);
        self
    }

    // Pool options

    /// Set an optional timeout for idle sockets being kept-alive.
    ///
    /// Pass `None` to disable timeout.
    ///
    /// Default is 90 seconds.
    pub fn pool_idle_timeout<D>(mut self, val: D) -> ClientBuilder
    where
        D: Into<Option<Duration>>,
    {
        self.config.pool_idle_timeout = val.into();
        self
    }

    /// Sets the maximum idle connection per host allowed in the pool.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> ClientBuilder {
        self.config.pool_max_idle_per_host = max;
        self
    }

    // Response options

    /// Sets the largest body a compressed response may decode to.
    ///
    /// A response that inflates beyond this fails with a decode error.
    ///
    /// Default is 64 MiB.
    pub fn max_decoded_body_size(mut self, max: usize) -> ClientBuilder {
        self.config.max_decoded_len = max;
        self
    }

    // TCP options

    /// Set whether sockets have `TCP_NODELAY` enabled.
    ///
    /// Default is `true`.
    pub fn tcp_nodelay(mut self, enabled: bool) -> ClientBuilder {
        self.config.nodelay = enabled;
        self
    }

    /// Override DNS resolution for specific domains to a particular IP address.
    ///
    /// The port of `addr` is ignored: connections use the port in the URL, or the
    /// conventional port for the scheme (e.g. 80 for http) when the URL has none.
    pub fn resolve(self, domain: &str, addr: SocketAddr) -> ClientBuilder {
        self.resolve_to_addrs(domain, &[addr])
    }

    /// Override DNS resolution for specific domains to particular IP addresses.
    ///
    /// The ports of `addrs` are ignored: connections use the port in the URL, or the
    /// conventional port for the scheme (e.g. 80 for http) when the URL has none.
    pub fn resolve_to_addrs(mut self, domain: &str, addrs: &[SocketAddr]) -> ClientBuilder {
        self.config
            .dns_overrides
            .insert(domain.to_ascii_lowercase(), addrs.to_vec());
        self
    }

    // TLS options

    /// Enables or disables TLS session resumption.
    ///
    /// Default is `true`.
    pub fn tls_session_cache(mut self, enabled: bool) -> ClientBuilder {
        self.config.tls.session_cache = enabled;
        self
    }

    /// Controls the use of certificate validation.
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// You should think very carefully before using this method. If
    /// invalid certificates are trusted, *any* certificate for *any* site
    /// will be trusted for use. This includes expired certificates. This
    /// introduces significant vulnerabilities, and should only be used
    /// as a last resort.
    pub fn danger_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> ClientBuilder {
        self.config.tls.verify = !accept_invalid_certs;
        self
    }

    /// Adds a trusted root certificate.
    ///
    /// This can be used to connect to a server that has a self-signed
    /// certificate for example.
    pub fn add_root_certificate(mut self, cert: Certificate) -> ClientBuilder {
        self.config.tls.roots.extra.push(cert);
        self
    }

    /// Controls the use of the system's built-in root certificates.
    ///
    /// Defaults to `true`.
    pub fn tls_built_in_root_certs(mut self, enabled: bool) -> ClientBuilder {
        self.config.tls.roots.built_in = enabled;
        self
    }

    /// Restrict the Client to be used with HTTPS only requests.
    ///
    /// Defaults to false.
    pub fn https_only(mut self, enabled: bool) -> ClientBuilder {
        self.config.https_only = enabled;
        self
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.config;
        f.debug_struct("ClientBuilder")
            .field("profile", &config.profile)
            .field("catalog", &config.catalog.len())
            .field("headers", &config.headers)
            .field("json_defaults", &config.json_defaults)
            .field("max_decoded_len", &config.max_decoded_len)
            .field("redirect", &config.redirect)
            .field("rewrite", &config.rewrite)
            .field("referer", &config.referer)
            .field("connect_timeout", &config.connect_timeout)
            .field("timeout", &config.timeout)
            .field("pool_idle_timeout", &config.pool_idle_timeout)
            .field("pool_max_idle_per_host", &config.pool_max_idle_per_host)
            .field("nodelay", &config.nodelay)
            .field("dns_overrides", &config.dns_overrides)
            .field("tls", &config.tls)
            .field("https_only", &config.https_only)
            .finish()
    }
}

impl Client {
    /// Constructs a new `Client` with the default configuration and a
    /// profile picked at random from the built-in catalog.
    ///
    /// # Errors
    ///
    /// Fails when the TLS context cannot be initialized.
    pub fn new() -> Result<Client> {
        ClientBuilder::new().build()
    }

    /// Creates a `ClientBuilder` to configure a `Client`.
    ///
    /// This is the same as `ClientBuilder::new()`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The fingerprint profile this client was built with.
    pub fn profile(&self) -> &Arc<FingerprintProfile> {
        self.inner.connector.tls().profile()
    }

    /// Returns a new client with `headers` merged over this client's headers.
    ///
    /// Names compare case-insensitively; a name given here replaces every
    /// value the client had for it and is sent with the spelling given here.
    ///
    /// # Errors
    ///
    /// Fails when a name or value is not a valid header.
    pub fn headers<I, K, V>(&self, headers: I) -> Result<Client>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut merged = HeaderMap::new();
        let mut casing = OrigHeaderMap::new();
        for (name, value) in headers {
            let (name, orig, value) = parse_header(name, value)?;
            merged.append(name, value);
            casing.set(orig);
        }

        Ok(self.with(|inner| {
            replace_headers(&mut inner.headers, merged);
            inner.casing.extend(&casing);
        }))
    }

    /// Returns a new client that also sends the header `name: value`.
    ///
    /// # Errors
    ///
    /// Fails when `name` or `value` is not a valid header.
    pub fn with_header<K, V>(&self, name: K, value: V) -> Result<Client>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.headers([(name, value)])
    }

    /// Returns a new client that follows redirects (up to 10 hops) when
    /// `follow` is true, and returns redirect responses as they are otherwise.
    pub fn follow(&self, follow: bool) -> Client {
        let policy = if follow {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        self.redirect(policy)
    }

    /// Returns a new client using `policy` for redirects.
    pub fn redirect(&self, policy: redirect::Policy) -> Client {
        self.with(|inner| inner.redirect = policy)
    }

    /// Start building a `Request` with the `Method` and `Url`.
    ///
    /// Returns a `RequestBuilder`, which will allow setting headers and
    /// the request body before sending. A `Url` that cannot be parsed makes
    /// [`RequestBuilder::send`] fail before any I/O.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.into_url())
    }

    /// Sends a `GET` request to the URL.
    pub fn get<U: IntoUrl>(&self, url: U) -> Result<Response> {
        self.request(Method::GET, url).send()
    }

    /// Sends a `POST` request with `body` to the URL.
    ///
    /// Pass `()` or `None` to send no body.
    pub fn post<U, B>(&self, url: U, body: B) -> Result<Response>
    where
        U: IntoUrl,
        B: Into<Body>,
    {
        self.request(Method::POST, url).body(body).send()
    }

    /// Sends a `PUT` request with `body` to the URL.
    ///
    /// Pass `()` or `None` to send no body.
    pub fn put<U, B>(&self, url: U, body: B) -> Result<Response>
    where
        U: IntoUrl,
        B: Into<Body>,
    {
        self.request(Method::PUT, url).body(body).send()
    }

    /// Sends a `PATCH` request with `body` to the URL.
    ///
    /// Pass `()` or `None` to send no body.
    pub fn patch<U, B>(&self, url: U, body: B) -> Result<Response>
    where
        U: IntoUrl,
        B: Into<Body>,
    {
        self.request(Method::PATCH, url).body(body).send()
    }

    /// Sends a `DELETE` request to the URL.
    pub fn delete<U: IntoUrl>(&self, url: U) -> Result<Response> {
        self.request(Method::DELETE, url).send()
    }

    /// Sends a `HEAD` request to the URL.
    ///
    /// The response body is always empty.
    pub fn head<U: IntoUrl>(&self, url: U) -> Result<Response> {
        self.request(Method::HEAD, url).send()
    }

    pub(crate) fn execute(&self, request: request::Request) -> Result<Response> {
        exec::execute(&self.inner, request)
    }

    fn with<F>(&self, f: F) -> Client
    where
        F: FnOnce(&mut ClientRef),
    {
        let mut inner = ClientRef::clone(&self.inner);
        f(&mut inner);
        Client {
            inner: Arc::new(inner),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("profile", self.profile().id())
            .field("headers", &self.inner.headers)
            .field("redirect", &self.inner.redirect)
            .field("timeout", &self.inner.timeout)
            .field("https_only", &self.inner.https_only)
            .field("pool", &self.inner.pool)
            .finish()
    }
}
