//! Request execution and the redirect loop.
//!
//! One [`Exec`] drives a request through its hops:
//!
//! ```text
//! Sending ──► AwaitingResponse ──► Done
//!    ▲                │
//!    └── Redirecting ◄┘            (any step) ──► Failed
//! ```

use std::{net::SocketAddr, time::Instant};

use bytes::Bytes;
use http::{Method, StatusCode};
use url::{Position, Url};

use super::{request::Request, ClientRef, Response};
use crate::{
    header::{
        HeaderMap, HeaderValue, OrigHeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST,
        LOCATION, REFERER,
    },
    pool::{PoolKey, Pooled},
    proto::h1::{self, Message, RequestHead},
    redirect::{self, ActionKind},
    tls::TlsInfo,
    util::{basic_auth, replace_headers},
    Error, Result,
};

pub(super) fn execute(client: &ClientRef, request: Request) -> Result<Response> {
    Exec::new(client, request).run()
}

enum State {
    Sending,
    AwaitingResponse(Pooled),
    Redirecting { status: StatusCode, next: Url },
    Done(Response),
    Failed(Error),
}

/// A response read off the wire together with where it came from.
struct Exchange {
    message: Message,
    remote_addr: SocketAddr,
    tls: Option<TlsInfo>,
}

struct Exec<'a> {
    client: &'a ClientRef,
    policy: redirect::Policy,
    method: Method,
    url: Url,
    headers: HeaderMap,
    casing: OrigHeaderMap,
    body: Option<Bytes>,
    previous: Vec<Url>,
    deadline: Option<Instant>,
}

impl<'a> Exec<'a> {
    fn new(client: &'a ClientRef, request: Request) -> Exec<'a> {
        let Request {
            method,
            url,
            headers: request_headers,
            casing: request_casing,
            body,
            timeout,
            redirect,
        } = request;

        let mut headers = client.headers.clone();
        replace_headers(&mut headers, request_headers);
        let mut casing = client.casing.clone();
        casing.extend(&request_casing);

        if client.json_defaults && matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
        }

        let deadline = timeout.or(client.timeout).map(|t| Instant::now() + t);

        let policy = redirect.unwrap_or_else(|| client.redirect.clone());

        Exec {
            client,
            policy,
            method,
            url,
            headers,
            casing,
            body,
            previous: Vec::new(),
            deadline,
        }
    }

    fn run(mut self) -> Result<Response> {
        let mut state = State::Sending;
        loop {
            state = match state {
                State::Sending => match self.send() {
                    Ok(conn) => State::AwaitingResponse(conn),
                    Err(e) => State::Failed(e),
                },
                State::AwaitingResponse(conn) => match self.receive(conn) {
                    Ok(exchange) => self.route(exchange),
                    Err(e) => State::Failed(e),
                },
                State::Redirecting { status, next } => {
                    self.prepare_redirect(status, next);
                    State::Sending
                }
                State::Done(response) => return Ok(response),
                State::Failed(e) => return Err(e.or_url(&self.url)),
            };
        }
    }

    /// Acquires a connection and writes the request on it.
    fn send(&mut self) -> Result<Pooled> {
        let url = &self.url;
        let https = match url.scheme() {
            "https" => true,
            "http" if !self.client.https_only => false,
            _ => return Err(Error::url_bad_scheme(url.clone())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::builder("URL has no host").with_url(url.clone()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::builder("URL has no port").with_url(url.clone()))?;

        let key = PoolKey {
            https,
            host: host.to_ascii_lowercase(),
            port,
            profile: self.client.connector.tls().profile().id().clone(),
        };

        let mut conn = match self.client.pool.checkout(&key) {
            Some(conn) => conn,
            None => {
                let conn = self
                    .client
                    .connector
                    .connect(https, host, port, self.deadline)?;
                self.client.pool.pooled(key, conn)
            }
        };
        conn.conn.set_deadline(self.deadline)?;

        let headers = self.wire_headers(host, port);
        let target = &url[Position::BeforePath..Position::AfterQuery];
        let head = RequestHead {
            method: &self.method,
            target,
            headers: &headers,
            casing: &self.casing,
            order: &self.client.order,
        };

        log::debug!(
            "{} {} (reused connection: {})",
            self.method,
            url,
            conn.is_reused()
        );
        h1::write_request(&mut conn.conn, &head, self.body.as_deref())?;
        Ok(conn)
    }

    /// The headers of this hop with the ones derived from the URL and body.
    fn wire_headers(&self, host: &str, port: u16) -> HeaderMap {
        let mut headers = self.headers.clone();

        if !headers.contains_key(HOST) {
            let value = match self.url.port() {
                Some(_) => format!("{host}:{port}"),
                None => host.to_owned(),
            };
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HOST, value);
            }
        }

        if !headers.contains_key(AUTHORIZATION) && !self.url.username().is_empty() {
            let username = percent_decode(self.url.username());
            let password = self.url.password().map(percent_decode);
            headers.insert(AUTHORIZATION, basic_auth(username, password));
        }

        match self.body {
            Some(ref body) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
            None if matches!(self.method, Method::POST | Method::PUT | Method::PATCH) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
            None => {
                headers.remove(CONTENT_LENGTH);
            }
        }

        headers
    }

    /// Reads the response; a connection is only returned to the pool after a
    /// complete, keep-alive response.
    fn receive(&mut self, mut conn: Pooled) -> Result<Exchange> {
        let message = h1::read_response(&mut conn.conn, &self.method)?;
        if message.reusable {
            conn.mark_reusable();
        }

        Ok(Exchange {
            message,
            remote_addr: conn.remote_addr,
            tls: conn.tls.clone(),
        })
    }

    fn route(&mut self, exchange: Exchange) -> State {
        let status = exchange.message.head.status;

        if redirect::is_redirect(status) {
            let next = exchange
                .message
                .head
                .headers
                .get(LOCATION)
                .and_then(|loc| loc.to_str().ok())
                .and_then(|loc| self.url.join(loc).ok());

            if let Some(next) = next {
                self.previous.push(self.url.clone());
                match self.policy.check(status, &next, &self.previous) {
                    ActionKind::Follow => {
                        if !matches!(next.scheme(), "http" | "https") {
                            return State::Failed(Error::url_bad_scheme(next));
                        }
                        return State::Redirecting { status, next };
                    }
                    ActionKind::Stop => {
                        log::debug!("redirect policy disallowed redirection to '{next}'");
                    }
                    ActionKind::Error(e) => {
                        return State::Failed(Error::redirect(e, self.url.clone()));
                    }
                }
            } else {
                log::debug!("{status} response without a usable Location, not following");
            }
        }

        match self.finish(exchange) {
            Ok(response) => State::Done(response),
            Err(e) => State::Failed(e),
        }
    }

    fn prepare_redirect(&mut self, status: StatusCode, next: Url) {
        log::debug!("redirecting {status} '{}' to '{next}'", self.url);

        let (method, keep_body) = self.client.rewrite.next_method(status, &self.method);
        if !keep_body {
            self.body = None;
            redirect::remove_body_headers(&mut self.headers);
        }
        self.method = method;

        redirect::remove_sensitive_headers(&mut self.headers, &next, &self.previous);
        if self.client.referer {
            match redirect::make_referer(&next, &self.url) {
                Some(referer) => {
                    self.headers.insert(REFERER, referer);
                }
                None => {
                    self.headers.remove(REFERER);
                }
            }
        }

        self.url = next;
    }

    fn finish(&mut self, exchange: Exchange) -> Result<Response> {
        let Exchange {
            message,
            remote_addr,
            tls,
        } = exchange;
        let Message { mut head, body, .. } = message;

        let body = self.client.accepts.decode(&mut head.headers, body)?;
        Ok(Response::new(
            head,
            body,
            self.url.clone(),
            Some(remote_addr),
            tls,
        ))
    }
}

fn percent_decode(s: &str) -> String {
    url::form_urlencoded::parse(format!("x={s}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
