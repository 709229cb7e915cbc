#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # rquest-engine
//!
//! A blocking HTTP/1.1 client whose TLS handshake and request headers look
//! like a real browser's.
//!
//! Every [`Client`] is bound to one [`FingerprintProfile`]: the ClientHello
//! (cipher suites, extensions, groups, signature algorithms, ALPN) is built
//! from it with BoringSSL, and requests carry the profile's default headers
//! in the profile's order and spelling.
//!
//! - Built-in Chrome, Firefox, Safari and OkHttp profiles in a [`Catalog`]
//! - JA3 and JA4 fingerprints computed from each profile
//! - Keep-alive connection pooling per host and profile
//! - Customizable [redirect policy](redirect)
//! - Transparent gzip, deflate and brotli decoding (zstd behind a feature)
//! - Optional [JSON](#json) bodies
//!
//! ## Making a GET request
//!
//! ```no_run
//! # fn run() -> Result<(), rquest_engine::Error> {
//! let body = rquest_engine::get("https://www.rust-lang.org")?.text();
//! println!("body = {:?}", body);
//! # Ok(())
//! # }
//! ```
//!
//! **NOTE**: the free functions build a new [`Client`] on each call. If you
//! plan to perform multiple requests, create a client and reuse it to take
//! advantage of keep-alive connection pooling.
//!
//! ## Choosing a profile
//!
//! By default a client picks a random profile from the built-in catalog.
//! Pin one by id:
//!
//! ```no_run
//! # fn run() -> Result<(), rquest_engine::Error> {
//! let client = rquest_engine::Client::builder()
//!     .profile("firefox_121")
//!     .build()?;
//!
//! println!("ja3: {}", client.profile().ja3());
//! let res = client.get("https://tls.peet.ws/api/all")?;
//! println!("{}", res.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Requests with a body
//!
//! ```no_run
//! # fn run() -> Result<(), rquest_engine::Error> {
//! let client = rquest_engine::Client::new()?;
//! let res = client
//!     .request(rquest_engine::Method::POST, "http://httpbin.org/post")
//!     .header("X-Trace", "1")
//!     .body("the exact body that is sent")
//!     .send()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## JSON
//!
//! With the optional `json` feature, [`RequestBuilder::json`] serializes a
//! body and [`Response::json`] deserializes one.
//!
//! ## Redirect Policies
//!
//! Redirects are followed up to 10 hops by default. Use
//! [`redirect::Policy`] on the builder, or [`Client::follow`] to derive a
//! client that returns redirect responses as they are.
//!
//! ## Optional Features
//!
//! - **json**: Provides serialization and deserialization for JSON bodies.
//! - **zstd**: Provides response body decompression with zstd.
//!
//! [`FingerprintProfile`]: profile::FingerprintProfile
//! [`Catalog`]: profile::Catalog

pub use http::{Method, StatusCode, Version};
pub use url::Url;

mod error;
mod hash;
mod into_url;
mod sync;
mod util;

mod client;
mod connect;
mod pool;
mod proto;

pub mod header;
pub mod profile;
pub mod redirect;
pub mod tls;

pub use self::client::{Body, Client, ClientBuilder, RequestBuilder, Response};
pub use self::error::{Error, Result};
pub use self::into_url::IntoUrl;
pub use self::profile::{Catalog, FingerprintProfile, ProfileId, ProfileSelector};
pub use self::tls::{Certificate, Ja3, Ja4, TlsInfo};

/// Creates a `Client` with a random built-in profile.
///
/// Same as [`Client::new`].
pub fn client() -> Result<Client> {
    Client::new()
}

/// Shortcut method to quickly make a `GET` request.
///
/// **NOTE**: This function creates a new internal `Client` on each call,
/// and so should not be used if making many requests. Create a
/// [`Client`](./struct.Client.html) instead.
///
/// # Examples
///
/// ```no_run
/// # fn run() -> Result<(), rquest_engine::Error> {
/// let body = rquest_engine::get("https://www.rust-lang.org")?.text();
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// This function fails if:
///
/// - the TLS backend cannot be initialized
/// - supplied `Url` cannot be parsed
/// - there was an error while sending request
/// - redirect limit was exhausted
pub fn get<T: IntoUrl>(url: T) -> Result<Response> {
    Client::new()?.get(url)
}

/// Shortcut method to quickly make a `HEAD` request.
///
/// See [`get`] for the caveats.
pub fn head<T: IntoUrl>(url: T) -> Result<Response> {
    Client::new()?.head(url)
}

/// Shortcut method to quickly make a `DELETE` request.
///
/// See [`get`] for the caveats.
pub fn delete<T: IntoUrl>(url: T) -> Result<Response> {
    Client::new()?.delete(url)
}

/// Shortcut method to quickly make a `POST` request with `body`.
///
/// See [`get`] for the caveats.
pub fn post<T, B>(url: T, body: B) -> Result<Response>
where
    T: IntoUrl,
    B: Into<Body>,
{
    Client::new()?.post(url, body)
}

/// Shortcut method to quickly make a `PUT` request with `body`.
///
/// See [`get`] for the caveats.
pub fn put<T, B>(url: T, body: B) -> Result<Response>
where
    T: IntoUrl,
    B: Into<Body>,
{
    Client::new()?.put(url, body)
}

/// Shortcut method to quickly make a `PATCH` request with `body`.
///
/// See [`get`] for the caveats.
pub fn patch<T, B>(url: T, body: B) -> Result<Response>
where
    T: IntoUrl,
    B: Into<Body>,
{
    Client::new()?.patch(url, body)
}

fn _assert_impls() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    fn assert_clone<T: Clone>() {}

    assert_send::<Client>();
    assert_sync::<Client>();
    assert_clone::<Client>();

    assert_send::<RequestBuilder>();
    assert_send::<Response>();

    assert_send::<Error>();
    assert_sync::<Error>();
}
