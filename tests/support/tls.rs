use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

use boring2::{
    pkey::PKey,
    ssl::{SslAcceptor, SslMethod},
    x509::X509,
};
use rquest_engine::tls::ClientHello;

type Hellos = Arc<Mutex<Vec<Vec<u8>>>>;

/// A TLS 1.2/1.3 server for `localhost` with a freshly generated certificate.
///
/// Every request on every connection gets `200 OK` with `body`. The first TLS
/// record of every accepted connection is kept, in accept order.
pub struct TlsServer {
    addr: SocketAddr,
    cert_pem: String,
    hellos: Hellos,
}

impl TlsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn cert_pem(&self) -> &[u8] {
        self.cert_pem.as_bytes()
    }

    /// ClientHellos received so far, as they arrived on the wire.
    pub fn client_hellos(&self) -> Vec<ClientHello> {
        self.hellos
            .lock()
            .unwrap()
            .iter()
            .map(|record| ClientHello::parse(record).expect("client hello record"))
            .collect()
    }
}

#[allow(unused)]
pub fn https(body: &'static str) -> TlsServer {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).expect("self signed");
    let cert_pem = cert.pem();

    let mut builder =
        SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).expect("acceptor builder");
    builder
        .set_private_key(
            &PKey::private_key_from_pem(signing_key.serialize_pem().as_bytes()).expect("key"),
        )
        .expect("set key");
    builder
        .set_certificate(&X509::from_pem(cert_pem.as_bytes()).expect("cert"))
        .expect("set cert");
    let acceptor = builder.build();

    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let hellos = Hellos::default();

    thread::Builder::new()
        .name("support-tls-server".into())
        .spawn({
            let hellos = hellos.clone();
            move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let acceptor = acceptor.clone();
                    let stream = FirstRecord::new(stream, hellos.clone());
                    thread::spawn(move || {
                        if let Ok(mut tls) = acceptor.accept(stream) {
                            while read_head(&mut tls).is_some() {
                                let response = format!(
                                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n{}",
                                    body.len(),
                                    body
                                );
                                if tls.write_all(response.as_bytes()).is_err() {
                                    break;
                                }
                            }
                        }
                    });
                }
            }
        })
        .expect("thread spawn");

    TlsServer {
        addr,
        cert_pem,
        hellos,
    }
}

/// Reads a request head; `None` once the peer is gone.
fn read_head<R: Read>(io: &mut R) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        match io.read(&mut byte) {
            Ok(1) => buf.push(byte[0]),
            _ => return None,
        }
    }
    Some(buf)
}

/// Passes a socket through while copying out the first TLS record read from it.
struct FirstRecord {
    stream: TcpStream,
    seen: Vec<u8>,
    sink: Option<Hellos>,
}

impl FirstRecord {
    fn new(stream: TcpStream, sink: Hellos) -> FirstRecord {
        FirstRecord {
            stream,
            seen: Vec::new(),
            sink: Some(sink),
        }
    }
}

impl Read for FirstRecord {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream.read(buf)?;
        if let Some(ref sink) = self.sink {
            self.seen.extend_from_slice(&buf[..n]);
            if self.seen.len() >= 5 {
                let len = 5 + u16::from_be_bytes([self.seen[3], self.seen[4]]) as usize;
                if self.seen.len() >= len {
                    sink.lock().unwrap().push(self.seen[..len].to_vec());
                    self.sink = None;
                }
            }
        }
        Ok(n)
    }
}

impl Write for FirstRecord {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
