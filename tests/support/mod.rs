pub mod server;
pub mod tls;

#[allow(unused)]
pub use self::server::Body;
