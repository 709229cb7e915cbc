use std::{fmt, net::SocketAddr};

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use http::{StatusCode, Version};
use mime::Mime;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use url::Url;

#[cfg(feature = "json")]
use crate::Error;
use crate::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    proto::h1::ResponseHead,
    tls::TlsInfo,
};

const EXCERPT_LEN: usize = 200;

/// A Response to a submitted request.
///
/// The body has been read in full by the time a `Response` is returned.
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    entries: Vec<(String, HeaderValue)>,
    body: Bytes,
    uri: Url,
    remote_addr: Option<SocketAddr>,
    tls_info: Option<TlsInfo>,
}

impl Response {
    pub(super) fn new(
        head: ResponseHead,
        body: Bytes,
        uri: Url,
        remote_addr: Option<SocketAddr>,
        tls_info: Option<TlsInfo>,
    ) -> Response {
        Response {
            status: head.status,
            version: head.version,
            headers: head.headers,
            entries: head.entries,
            body,
            uri,
            remote_addr,
            tls_info,
        }
    }

    /// Get the final `Url` of this `Response`.
    ///
    /// This is the URL that answered, after any followed redirects. When a
    /// redirect was not followed it is the URL that was requested.
    #[inline]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Get the `StatusCode` of this `Response`.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the status code as a plain integer.
    #[inline]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the HTTP `Version` of this `Response`.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the `Headers` of this `Response`.
    ///
    /// Lookups are case-insensitive. When the body was decompressed, the
    /// `Content-Encoding` and `Content-Length` headers are removed.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header lines exactly as the server sent them: in order, with the
    /// server's spelling of each name, duplicates included.
    pub fn header_entries(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Get the content length of the response body.
    ///
    /// This is the size of the body as returned, after decompression.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// The value of the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// The parsed `Content-Type`, if the header is present and valid.
    pub fn mime(&self) -> Option<Mime> {
        self.content_type()?.parse().ok()
    }

    /// Get the remote address used to get this `Response`.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Details of the TLS session the response arrived on, for `https`.
    pub fn tls_info(&self) -> Option<&TlsInfo> {
        self.tls_info.as_ref()
    }

    /// The raw response body.
    ///
    /// Always empty for responses to `HEAD` requests.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the full response body as `Bytes`.
    pub fn bytes(self) -> Bytes {
        self.body
    }

    /// Get the full response text.
    ///
    /// This method decodes the response body with BOM sniffing
    /// and with malformed sequences replaced with the [`char::REPLACEMENT_CHARACTER`].
    /// Encoding is determined from the `charset` parameter of `Content-Type` header,
    /// and defaults to `utf-8` if not presented.
    ///
    /// Note that the BOM is stripped from the returned String.
    pub fn text(&self) -> String {
        self.text_with_charset("utf-8")
    }

    /// Get the full response text given a specific encoding.
    ///
    /// This method decodes the response body with BOM sniffing
    /// and with malformed sequences replaced with the
    /// [`char::REPLACEMENT_CHARACTER`].
    /// You can provide a default encoding for decoding the raw message, while the
    /// `charset` parameter of `Content-Type` header is still prioritized. For more information
    /// about the possible encoding name, please go to [`encoding_rs`] docs.
    ///
    /// Note that the BOM is stripped from the returned String.
    ///
    /// [`encoding_rs`]: https://docs.rs/encoding_rs/0.8/encoding_rs/#relationship-with-windows-code-pages
    pub fn text_with_charset(&self, default_encoding: impl AsRef<str>) -> String {
        let content_type = self.mime();
        let encoding_name = content_type
            .as_ref()
            .and_then(|mime| mime.get_param("charset").map(|charset| charset.as_str()))
            .unwrap_or(default_encoding.as_ref());
        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let (text, _, _) = encoding.decode(&self.body);
        text.into_owned()
    }

    /// Try to deserialize the response body as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature enabled.
    ///
    /// # Errors
    ///
    /// This method fails whenever the response body is not in JSON format
    /// or it cannot be properly deserialized to target type `T`. For more
    /// details please see [`serde_json::from_slice`].
    ///
    /// [`serde_json::from_slice`]: https://docs.serde.rs/serde_json/fn.from_slice.html
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::decode)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("uri", &self.uri.as_str())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

/// `<status> <uri>` followed by the start of the body.
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.uri)?;
        if self.body.is_empty() {
            return Ok(());
        }

        let text = self.text();
        let mut end = text.len().min(EXCERPT_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        write!(f, ": {}", &text[..end])?;
        if end < text.len() {
            f.write_str("...")?;
        }
        Ok(())
    }
}
