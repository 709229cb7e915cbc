use std::{fmt, time::Duration};

use bytes::Bytes;
use http::Method;
#[cfg(feature = "json")]
use serde::Serialize;
use url::Url;

use super::{Body, Client, Response};
#[cfg(feature = "json")]
use crate::header::{HeaderValue, CONTENT_TYPE};
use crate::{
    header::{parse_header, HeaderMap, OrigHeaderMap, AUTHORIZATION},
    redirect, Error, Result,
};

/// A request ready to be executed by a `Client`.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) casing: OrigHeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) redirect: Option<redirect::Policy>,
}

/// A builder to construct the properties of a request.
///
/// To construct a `RequestBuilder`, refer to the `Client` documentation.
#[must_use = "RequestBuilder does nothing until you 'send' it"]
pub struct RequestBuilder {
    client: Client,
    request: Result<Request>,
}

impl RequestBuilder {
    pub(super) fn new(client: Client, method: Method, url: Result<Url>) -> RequestBuilder {
        let request = url.and_then(|url| {
            if method == Method::CONNECT {
                return Err(Error::builder("CONNECT requests are not supported").with_url(url));
            }
            Ok(Request {
                method,
                url,
                headers: HeaderMap::new(),
                casing: OrigHeaderMap::new(),
                body: None,
                timeout: None,
                redirect: None,
            })
        });
        RequestBuilder { client, request }
    }

    /// Add a `Header` to this Request, sent with the exact spelling of `name`.
    ///
    /// If the header is already present, the value will be replaced.
    pub fn header<K, V>(mut self, name: K, value: V) -> RequestBuilder
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut error = None;
        if let Ok(ref mut req) = self.request {
            match parse_header(name, value) {
                Ok((name, orig, value)) => {
                    req.headers.insert(name, value);
                    req.casing.set(orig);
                }
                Err(e) => error = Some(e),
            }
        }
        if let Some(err) = error {
            self.request = Err(err);
        }
        self
    }

    /// Add a set of Headers to the existing ones on this Request.
    ///
    /// The headers will be merged in to any already set.
    pub fn headers(mut self, headers: HeaderMap) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            crate::util::replace_headers(&mut req.headers, headers);
        }
        self
    }

    /// Enable HTTP basic authentication.
    pub fn basic_auth<U, P>(mut self, username: U, password: Option<P>) -> RequestBuilder
    where
        U: fmt::Display,
        P: fmt::Display,
    {
        if let Ok(ref mut req) = self.request {
            let value = crate::util::basic_auth(username, password);
            req.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// Set the request body.
    ///
    /// An empty [`Body`] removes any body set before.
    pub fn body<T: Into<Body>>(mut self, body: T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            req.body = body.into().into_bytes();
        }
        self
    }

    /// Send a JSON body.
    ///
    /// Also sets `Content-Type: application/json` unless a content type was
    /// already set.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature enabled.
    ///
    /// # Errors
    ///
    /// Serialization can fail if `T`'s implementation of `Serialize` decides to
    /// fail, or if `T` contains a map with non-string keys.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            match serde_json::to_vec(json) {
                Ok(body) => {
                    req.headers
                        .entry(CONTENT_TYPE)
                        .or_insert(HeaderValue::from_static("application/json"));
                    req.body = Some(body.into());
                }
                Err(err) => self.request = Err(Error::builder(err)),
            }
        }
        self
    }

    /// Enables a request timeout.
    ///
    /// The timeout is applied from when the request starts connecting until the
    /// response body has finished. It affects only this request and overrides
    /// the timeout configured using `ClientBuilder::timeout()`.
    pub fn timeout(mut self, timeout: Duration) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            req.timeout = Some(timeout);
        }
        self
    }

    /// Set the redirect policy for this request.
    pub fn redirect(mut self, policy: redirect::Policy) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            req.redirect = Some(policy);
        }
        self
    }

    /// Constructs the Request and sends it to the target URL, returning a
    /// Response.
    ///
    /// # Errors
    ///
    /// This method fails if there was an error while sending the request,
    /// a redirect loop was detected or the redirect limit was exhausted.
    pub fn send(self) -> Result<Response> {
        let request = self.request?;
        self.client.execute(request)
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("RequestBuilder");
        match self.request {
            Ok(ref req) => builder
                .field("method", &req.method)
                .field("url", &req.url.as_str())
                .field("headers", &req.headers)
                .finish(),
            Err(ref err) => builder.field("error", err).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderName;

    fn client() -> Client {
        Client::builder().profile("chrome_120").build().unwrap()
    }

    #[test]
    fn header_keeps_spelling_and_replaces() {
        let builder = client()
            .request(Method::GET, "http://example.com/")
            .header("x-Custom", "a")
            .header("X-CUSTOM", "b");
        let req = builder.request.unwrap();

        let name = HeaderName::from_static("x-custom");
        assert_eq!(req.headers.get_all(&name).iter().count(), 1);
        assert_eq!(req.headers[&name], "b");
        assert_eq!(req.casing.get(&name).unwrap().as_str(), "X-CUSTOM");
    }

    #[test]
    fn invalid_input_fails_on_send() {
        let err = client()
            .request(Method::GET, "http://example.com/")
            .header("bad header", "v")
            .send()
            .unwrap_err();
        assert!(err.is_builder());

        let err = client()
            .request(Method::GET, "not a url")
            .send()
            .unwrap_err();
        assert!(err.is_builder());

        let err = client()
            .request(Method::GET, "ftp://example.com/file")
            .send()
            .unwrap_err();
        assert!(err.is_builder());
        assert_eq!(err.url().unwrap().scheme(), "ftp");
    }

    #[test]
    fn connect_method_is_rejected() {
        let err = client()
            .request(Method::CONNECT, "http://example.com/")
            .send()
            .unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn basic_auth_is_sensitive() {
        let req = client()
            .request(Method::GET, "http://example.com/")
            .basic_auth("user", Some("pass"))
            .request
            .unwrap();
        assert!(req.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn body_accepts_absent_values() {
        let req = client()
            .request(Method::POST, "http://example.com/")
            .body("first")
            .body(())
            .request
            .unwrap();
        assert!(req.body.is_none());

        let req = client()
            .request(Method::PUT, "http://example.com/")
            .body(Some(b"put".to_vec()))
            .request
            .unwrap();
        assert_eq!(req.body.unwrap(), "put");
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_sets_content_type_once() {
        let req = client()
            .request(Method::POST, "http://example.com/")
            .header("Content-Type", "application/vnd.api+json")
            .json(&serde_json::json!({"a": 1}))
            .request
            .unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "application/vnd.api+json");
        assert_eq!(req.body.unwrap(), "{\"a\":1}");
    }
}
