use url::Url;

use crate::Error;

/// A trait to try to convert some type into a `Url`.
///
/// This trait is "sealed", such that only types within rquest-engine can
/// implement it.
pub trait IntoUrl: IntoUrlSealed {}

impl IntoUrl for Url {}
impl IntoUrl for String {}
impl IntoUrl for &Url {}
impl IntoUrl for &str {}
impl IntoUrl for &String {}

pub trait IntoUrlSealed {
    // Besides parsing as a valid `Url`, the `Url` must be something this
    // engine can actually send a request to: http(s) with a host.
    fn into_url(self) -> crate::Result<Url>;

    fn as_str(&self) -> &str;
}

fn check(url: Url) -> crate::Result<Url> {
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(Error::url_bad_scheme(url)),
    }
}

impl IntoUrlSealed for Url {
    fn into_url(self) -> crate::Result<Url> {
        check(self)
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &Url {
    fn into_url(self) -> crate::Result<Url> {
        check(self.clone())
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl<T> IntoUrlSealed for T
where
    T: AsRef<str> + sealed::Sealed,
{
    fn into_url(self) -> crate::Result<Url> {
        Url::parse(self.as_ref())
            .map_err(Error::builder)?
            .into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for &str {}
    impl Sealed for String {}
    impl Sealed for &String {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_url_file_scheme() {
        let err = "file:///etc/hosts".into_url().unwrap_err();
        assert_eq!(
            err.to_string(),
            "builder error for url (file:///etc/hosts): URL scheme is not allowed"
        );
    }

    #[test]
    fn into_url_blob_scheme() {
        let err = "blob:https://example.com".into_url().unwrap_err();
        assert_eq!(
            err.to_string(),
            "builder error for url (blob:https://example.com): URL scheme is not allowed"
        );
    }

    #[test]
    fn into_url_ftp_scheme() {
        let err = "ftp://example.com/pub".into_url().unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn into_url_unparsable() {
        let err = "not a url".into_url().unwrap_err();
        assert!(err.is_builder());
        assert!(err.url().is_none());
    }

    #[test]
    fn into_url_keeps_http_and_https() {
        assert_eq!(
            "https://example.com/a?b=c".into_url().unwrap().as_str(),
            "https://example.com/a?b=c"
        );
        assert!(String::from("http://127.0.0.1:8080/").into_url().is_ok());
    }
}
