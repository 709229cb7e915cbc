//! Loopback servers for the integration tests.
//!
//! Each server runs its own single-threaded tokio runtime on a background
//! thread and stops when the [`Server`] handle is dropped.

use std::{
    convert::Infallible,
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    runtime,
    sync::oneshot,
};

pub type Body = http_body_util::Full<bytes::Bytes>;

pub struct Server {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Server {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of connections accepted so far.
    #[allow(unused)]
    pub fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Number of connections that have been closed so far.
    #[allow(unused)]
    pub fn closed_connections(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if !thread::panicking() {
                handle.join().expect("test server should not panic");
            }
        }
    }
}

/// An HTTP/1.1 server answering every request with `func`.
#[allow(unused)]
pub fn http<F, Fut>(func: F) -> Server
where
    F: Fn(http::Request<hyper::body::Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = http::Response<Body>> + Send + 'static,
{
    serve(move |io| {
        let func = func.clone();
        async move {
            let svc = hyper::service::service_fn(move |req| {
                let fut = func(req);
                async move { Ok::<_, Infallible>(fut.await) }
            });
            let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(io), svc)
                .await;
        }
    })
}

/// A server that hands every raw request head to `respond` together with the
/// socket, for responses hyper would refuse to produce.
#[allow(unused)]
pub fn low_level_with_response<F>(respond: F) -> Server
where
    for<'c> F: Fn(&'c [u8], &'c mut TcpStream) -> Box<dyn Future<Output = ()> + Send + 'c>
        + Clone
        + Send
        + 'static,
{
    serve(move |mut io| {
        let respond = respond.clone();
        async move {
            while let Some(head) = read_head(&mut io).await {
                Box::into_pin(respond(&head, &mut io)).await;
            }
        }
    })
}

fn serve<F, Fut>(on_connection: F) -> Server
where
    F: Fn(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (addr_tx, addr_rx) = mpsc::channel();
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
    let accepted = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    let name = format!(
        "test({})-support-server",
        thread::current().name().unwrap_or("<unknown>")
    );
    let thread = thread::Builder::new()
        .name(name)
        .spawn({
            let accepted = accepted.clone();
            let closed = closed.clone();
            move || {
                let connections = accepted;
                let rt = runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("new rt");
                rt.block_on(async move {
                    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
                        .await
                        .expect("bind");
                    addr_tx
                        .send(listener.local_addr().expect("local addr"))
                        .expect("send addr");

                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            accepted = listener.accept() => {
                                let (io, _) = accepted.expect("accepted");
                                connections.fetch_add(1, Ordering::SeqCst);
                                let connection = on_connection(io);
                                let closed = closed.clone();
                                tokio::spawn(async move {
                                    connection.await;
                                    closed.fetch_add(1, Ordering::SeqCst);
                                });
                            }
                        }
                    }
                });
            }
        })
        .expect("thread spawn");

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("server address");
    Server {
        addr,
        accepted,
        closed,
        shutdown: Some(shutdown),
        thread: Some(thread),
    }
}

/// Reads up to the end of a request head; `None` once the peer is gone.
async fn read_head(io: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            buf.truncate(end + 4);
            return Some(buf);
        }
        match io.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
