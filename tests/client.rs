mod support;

use std::{
    io::Write as _,
    sync::mpsc,
    time::Duration,
};

use bytes::Bytes;
use http_body_util::BodyExt;
use support::{server, Body};
use tokio::io::AsyncWriteExt;

use rquest_engine::{Client, Method, StatusCode};

fn client() -> Client {
    Client::builder()
        .profile("firefox_121")
        .build()
        .expect("client builder")
}

fn raw_request_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[test]
fn profile_headers_are_sent_in_profile_order() {
    let _ = env_logger::try_init();

    let (tx, rx) = mpsc::channel();
    let server = server::low_level_with_response(move |raw, client_socket| {
        let _ = tx.send(raw.to_vec());
        Box::new(async move {
            client_socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok")
                .await
                .expect("response write_all failed");
        })
    });

    let url = format!("http://{}/path?q=1", server.addr());
    let res = client()
        .request(Method::GET, &url)
        .header("x-Custom-Case", "yes")
        .send()
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text(), "ok");

    let lines = raw_request_lines(&rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(lines[0], "GET /path?q=1 HTTP/1.1");

    let names: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split_once(':').unwrap().0)
        .collect();
    assert_eq!(
        &names[..5],
        &["Host", "User-Agent", "Accept", "Accept-Language", "Accept-Encoding"]
    );
    assert_eq!(names.last(), Some(&"x-Custom-Case"));
    assert_eq!(lines[1], format!("Host: {}", server.addr()));
    assert!(lines[2].contains("Firefox/121.0"));
}

#[test]
fn request_header_replaces_profile_header() {
    let server = server::http(move |req| async move {
        let agents: Vec<_> = req.headers().get_all("user-agent").iter().collect();
        assert_eq!(agents, vec!["rquest-engine-test"]);
        http::Response::default()
    });

    let url = format!("http://{}/ua", server.addr());
    let res = client()
        .request(Method::GET, &url)
        .header("User-Agent", "rquest-engine-test")
        .send()
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[test]
fn client_headers_apply_to_every_request() {
    let server = server::http(move |req| async move {
        assert_eq!(req.headers()["x-api-key"], "abc");
        http::Response::default()
    });

    let base = client();
    let derived = base.with_header("X-Api-Key", "abc").unwrap();
    let url = format!("http://{}/", server.addr());
    assert_eq!(derived.get(&url).unwrap().status(), StatusCode::OK);
    assert_eq!(derived.get(&url).unwrap().status(), StatusCode::OK);
}

#[test]
fn post_sends_body_with_content_length() {
    let server = server::http(move |req| async move {
        assert_eq!(req.method(), "POST");
        assert_eq!(req.headers()["content-length"], "11");
        let body = req.into_body().collect().await.unwrap().to_bytes();
        http::Response::new(Body::new(body))
    });

    let url = format!("http://{}/echo", server.addr());
    let res = client().post(&url, "hello world").unwrap();
    assert_eq!(res.text(), "hello world");
}

#[test]
fn post_without_body_sends_zero_length() {
    let server = server::http(move |req| async move {
        assert_eq!(req.headers()["content-length"], "0");
        http::Response::default()
    });

    let url = format!("http://{}/empty", server.addr());
    let res = client().request(Method::POST, &url).send().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[test]
fn post_accepts_absent_body() {
    let server = server::http(move |req| async move {
        assert_eq!(req.method(), "PATCH");
        assert_eq!(req.headers()["content-length"], "0");
        assert!(req.headers().get("content-type").is_none());
        http::Response::default()
    });

    let url = format!("http://{}/empty", server.addr());
    assert_eq!(client().patch(&url, ()).unwrap().status(), StatusCode::OK);
    assert_eq!(
        client().patch(&url, None::<String>).unwrap().status(),
        StatusCode::OK
    );
}

#[test]
fn json_defaults_are_opt_in() {
    let server = server::http(move |req| async move {
        let accept = req.headers()["accept"].to_str().unwrap().to_owned();
        let content_type = req
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_owned())
            .unwrap_or_default();
        http::Response::new(Body::from(format!("{accept}|{content_type}")))
    });
    let url = format!("http://{}/", server.addr());

    let plain = client();
    let text = plain.post(&url, "{}").unwrap().text();
    assert!(text.starts_with("text/html"), "{text}");
    assert!(text.ends_with('|'), "{text}");

    let json = Client::builder()
        .profile("firefox_121")
        .json_defaults(true)
        .build()
        .unwrap();
    assert_eq!(json.post(&url, "{}").unwrap().text(), "application/json|application/json");
    assert_eq!(json.get(&url).unwrap().text(), "application/json|");
    let res = json
        .request(Method::PUT, &url)
        .header("Content-Type", "text/csv")
        .body("a,b")
        .send()
        .unwrap();
    assert_eq!(res.text(), "application/json|text/csv");

    let custom = Client::builder()
        .profile("firefox_121")
        .header("Accept", "application/xml")
        .json_defaults(true)
        .build()
        .unwrap();
    assert_eq!(custom.patch(&url, ()).unwrap().text(), "application/xml|application/json");
}

#[test]
fn shared_client_across_threads() {
    let server = server::http(move |req| async move {
        http::Response::new(Body::from(req.uri().path().to_owned()))
    });
    let base = format!("http://{}", server.addr());

    let client = Client::builder()
        .profile("firefox_121")
        .pool_max_idle_per_host(2)
        .build()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|thread| {
            let client = client.clone();
            let base = base.clone();
            std::thread::spawn(move || {
                for round in 0..10 {
                    let path = format!("/t{thread}/r{round}");
                    let res = client.get(format!("{base}{path}")).unwrap();
                    assert_eq!(res.status(), StatusCode::OK);
                    assert_eq!(res.text(), path);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    std::thread::sleep(Duration::from_millis(200));
    let open = server.accepted_connections() - server.closed_connections();
    assert!(open <= 2, "{open} connections still open");
    assert!(server.accepted_connections() >= 1);

    assert_eq!(client.get(format!("{base}/after")).unwrap().text(), "/after");
}

#[test]
fn response_accessors() {
    let server = server::http(move |_req| async {
        http::Response::builder()
            .header("content-type", "text/plain; charset=utf-8")
            .header("x-dup", "1")
            .header("x-dup", "2")
            .body(Body::from("Hello"))
            .unwrap()
    });

    let url = format!("http://{}/text", server.addr());
    let res = client().get(&url).unwrap();

    assert_eq!(res.uri().as_str(), url);
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.content_length(), 5);
    assert_eq!(res.remote_addr(), Some(server.addr()));
    assert!(res.tls_info().is_none());
    assert_eq!(res.mime().unwrap().essence_str(), "text/plain");
    assert_eq!(res.headers().get_all("x-dup").iter().count(), 2);
    assert_eq!(
        res.header_entries()
            .filter(|(name, _)| name.eq_ignore_ascii_case("x-dup"))
            .count(),
        2
    );
    assert_eq!(res.text(), "Hello");
    assert_eq!(res.bytes(), "Hello");
}

#[test]
fn gzip_response_is_decoded() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"compressed payload").unwrap();
    let gzipped = Bytes::from(encoder.finish().unwrap());

    let server = server::http(move |req| {
        let gzipped = gzipped.clone();
        async move {
            assert!(req.headers()["accept-encoding"]
                .to_str()
                .unwrap()
                .contains("gzip"));
            http::Response::builder()
                .header("content-encoding", "gzip")
                .body(Body::new(gzipped))
                .unwrap()
        }
    });

    let url = format!("http://{}/gzip", server.addr());
    let res = client().get(&url).unwrap();
    assert!(res.headers().get("content-encoding").is_none());
    assert_eq!(res.text(), "compressed payload");
}

#[test]
fn head_response_has_empty_body() {
    let server = server::http(move |req| async move {
        assert_eq!(req.method(), "HEAD");
        http::Response::builder()
            .header("content-length", "100")
            .body(Body::default())
            .unwrap()
    });

    let url = format!("http://{}/head", server.addr());
    let res = client().head(&url).unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().is_empty());
}

#[test]
fn chunked_response_is_reassembled() {
    let server = server::low_level_with_response(|_raw, client_socket| {
        Box::new(async move {
            client_socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n\
                      5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
                )
                .await
                .expect("response write_all failed");
        })
    });

    let url = format!("http://{}/chunked", server.addr());
    let res = client().get(&url).unwrap();
    assert_eq!(res.text(), "hello world");
}

#[test]
fn truncated_body_is_protocol_error() {
    let server = server::low_level_with_response(|_raw, client_socket| {
        Box::new(async move {
            client_socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nabc")
                .await
                .expect("response write_all failed");
            client_socket.shutdown().await.expect("shutdown");
        })
    });

    let url = format!("http://{}/truncated", server.addr());
    let err = client().get(&url).unwrap_err();
    assert!(err.is_protocol(), "{err:?}");
    assert_eq!(err.url().map(|u| u.as_str()), Some(url.as_str()));
}

#[test]
fn keep_alive_connection_is_reused() {
    let server = server::http(move |_req| async { http::Response::new(Body::from("pong")) });
    let url = format!("http://{}/ping", server.addr());

    let client = client();
    for _ in 0..3 {
        assert_eq!(client.get(&url).unwrap().text(), "pong");
    }
    drop(client);

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(server.closed_connections(), 1);
}

#[test]
fn disabled_pool_opens_a_connection_per_request() {
    let server = server::http(move |_req| async { http::Response::new(Body::from("pong")) });
    let url = format!("http://{}/ping", server.addr());

    let client = Client::builder()
        .profile("firefox_121")
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    client.get(&url).unwrap();
    client.get(&url).unwrap();

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(server.closed_connections(), 2);
}

#[test]
fn request_timeout() {
    let server = server::http(move |_req| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        http::Response::default()
    });

    let url = format!("http://{}/slow", server.addr());
    let err = Client::builder()
        .profile("firefox_121")
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap()
        .get(&url)
        .unwrap_err();

    assert!(err.is_request());
    assert!(err.is_timeout());
    assert_eq!(err.url().map(|u| u.as_str()), Some(url.as_str()));
}

#[test]
fn per_request_timeout_overrides_client() {
    let server = server::http(move |_req| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        http::Response::default()
    });

    let url = format!("http://{}/slow", server.addr());
    let client = Client::builder()
        .profile("firefox_121")
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let res = client
        .request(Method::GET, &url)
        .timeout(Duration::from_secs(5))
        .send()
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[test]
fn connection_refused_is_connect_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = client().get(format!("http://{addr}/")).unwrap_err();
    assert!(err.is_connect(), "{err:?}");
}

#[test]
fn resolve_override_keeps_host_header() {
    let server = server::http(move |req| async move {
        let host = req.headers()["host"].to_str().unwrap().to_owned();
        http::Response::new(Body::from(host))
    });

    let port = server.addr().port();
    let client = Client::builder()
        .profile("firefox_121")
        .resolve("fake.test", server.addr())
        .build()
        .unwrap();
    let res = client.get(format!("http://fake.test:{port}/")).unwrap();
    assert_eq!(res.text(), format!("fake.test:{port}"));
}

#[test]
fn url_userinfo_becomes_basic_auth() {
    let server = server::http(move |req| async move {
        assert_eq!(req.headers()["authorization"], "Basic dXNlcjpwYXNz");
        http::Response::default()
    });

    let url = format!("http://user:pass@{}/auth", server.addr());
    assert_eq!(client().get(&url).unwrap().status(), StatusCode::OK);
}

#[test]
fn https_only_rejects_plain_http() {
    let err = Client::builder()
        .profile("firefox_121")
        .https_only(true)
        .build()
        .unwrap()
        .get("http://127.0.0.1:1/")
        .unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn free_function_get() {
    let server = server::http(move |_req| async { http::Response::new(Body::from("free")) });
    let res = rquest_engine::get(format!("http://{}/", server.addr())).unwrap();
    assert_eq!(res.text(), "free");
}
