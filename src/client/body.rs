use std::fmt;

use bytes::Bytes;

/// A request body.
///
/// Either a buffer of bytes or no body at all. `()` and `None` convert to an
/// absent body, so `client.post(url, ())` sends an empty `POST`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Body(Option<Bytes>);

impl Body {
    /// A request without a body.
    #[inline]
    pub fn empty() -> Body {
        Body(None)
    }

    /// Returns the bytes of the body, `None` when there is none.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    #[inline]
    pub(crate) fn into_bytes(self) -> Option<Bytes> {
        self.0
    }
}

impl From<Bytes> for Body {
    #[inline]
    fn from(bytes: Bytes) -> Body {
        Body(Some(bytes))
    }
}

impl From<Vec<u8>> for Body {
    #[inline]
    fn from(vec: Vec<u8>) -> Body {
        Body(Some(vec.into()))
    }
}

impl From<&'static [u8]> for Body {
    #[inline]
    fn from(s: &'static [u8]) -> Body {
        Body(Some(Bytes::from_static(s)))
    }
}

impl From<String> for Body {
    #[inline]
    fn from(s: String) -> Body {
        Body(Some(s.into()))
    }
}

impl From<&'static str> for Body {
    #[inline]
    fn from(s: &'static str) -> Body {
        s.as_bytes().into()
    }
}

impl From<()> for Body {
    #[inline]
    fn from(_: ()) -> Body {
        Body::empty()
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    #[inline]
    fn from(body: Option<T>) -> Body {
        body.map_or_else(Body::empty, Into::into)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ref bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            None => f.write_str("Body(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_bodies() {
        assert_eq!(Body::from(()).as_bytes(), None);
        assert_eq!(Body::from(None::<String>).as_bytes(), None);
        assert_eq!(Body::empty(), Body::default());
    }

    #[test]
    fn present_bodies() {
        assert_eq!(Body::from("a").as_bytes(), Some(&b"a"[..]));
        assert_eq!(Body::from(Some(vec![1u8, 2])).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Body::from(String::new()).as_bytes(), Some(&b""[..]));
        assert_eq!(format!("{:?}", Body::from("abc")), "Body(3)");
    }
}
