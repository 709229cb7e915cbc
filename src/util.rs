use std::fmt;

use crate::header::{Entry, HeaderMap, HeaderValue, OccupiedEntry};

pub(crate) fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: fmt::Display,
    P: fmt::Display,
{
    use std::io::Write;

    use base64::{prelude::BASE64_STANDARD, write::EncoderWriter};

    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{username}:");
        if let Some(password) = password {
            let _ = write!(encoder, "{password}");
        }
    }
    let mut header = HeaderValue::from_bytes(&buf).expect("base64 is always valid HeaderValue");
    header.set_sensitive(true);
    header
}

/// Merges `src` into `dst`. Every name present in `src` replaces all of its
/// values in `dst`; a name keeps its original position in `dst`.
pub(crate) fn replace_headers(dst: &mut HeaderMap, src: HeaderMap) {
    // IntoIter of HeaderMap yields (Option<HeaderName>, HeaderValue).
    // The first time a name is yielded, it will be Some(name), and if
    // there are more values with the same name, the next yield will be
    // None.

    let mut prev_entry: Option<OccupiedEntry<_>> = None;
    for (key, value) in src {
        match key {
            Some(key) => match dst.entry(key) {
                Entry::Occupied(mut e) => {
                    e.insert(value);
                    prev_entry = Some(e);
                }
                Entry::Vacant(e) => {
                    let e = e.insert_entry(value);
                    prev_entry = Some(e);
                }
            },
            None => {
                if let Some(ref mut entry) = prev_entry {
                    entry.append(value);
                }
            }
        }
    }
}

/// Debug/Display escaping of raw protocol bytes, capped at `limit` bytes.
pub(crate) struct Escape<'a> {
    bytes: &'a [u8],
    limit: usize,
}

impl<'a> Escape<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Escape {
            bytes,
            limit: usize::MAX,
        }
    }

    pub(crate) fn truncated(bytes: &'a [u8], limit: usize) -> Self {
        Escape { bytes, limit }
    }
}

impl fmt::Display for Escape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.bytes[..self.bytes.len().min(self.limit)];
        for &c in shown {
            // https://doc.rust-lang.org/reference.html#byte-escapes
            if c == b'\n' {
                write!(f, "\\n")?;
            } else if c == b'\r' {
                write!(f, "\\r")?;
            } else if c == b'\t' {
                write!(f, "\\t")?;
            } else if c == b'\\' || c == b'"' {
                write!(f, "\\{}", c as char)?;
            } else if c == b'\0' {
                write!(f, "\\0")?;
                // ASCII printable
            } else if (0x20..0x7f).contains(&c) {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{c:02x}")?;
            }
        }
        if shown.len() < self.bytes.len() {
            write!(f, "...")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Escape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"{self}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let value = basic_auth("Aladdin", Some("open sesame"));
        assert_eq!(value, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(value.is_sensitive());

        let value = basic_auth("user", None::<&str>);
        assert_eq!(value, "Basic dXNlcjo=");
    }

    #[test]
    fn replace_headers_keeps_position_and_replaces_all_values() {
        let mut dst = HeaderMap::new();
        dst.insert("accept", HeaderValue::from_static("text/html"));
        dst.append("x-multi", HeaderValue::from_static("1"));
        dst.append("x-multi", HeaderValue::from_static("2"));
        dst.insert("user-agent", HeaderValue::from_static("ua"));

        let mut src = HeaderMap::new();
        src.insert("x-multi", HeaderValue::from_static("3"));
        src.insert("x-new", HeaderValue::from_static("new"));

        replace_headers(&mut dst, src);

        let keys: Vec<_> = dst.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["accept", "x-multi", "user-agent", "x-new"]);
        let multi: Vec<_> = dst.get_all("x-multi").iter().collect();
        assert_eq!(multi, vec!["3"]);
    }

    #[test]
    fn escape_truncates() {
        let text = Escape::truncated(b"hello\r\nworld", 7).to_string();
        assert_eq!(text, "hello\\r\\n...");
        assert_eq!(format!("{:?}", Escape::new(b"a\"b")), "b\"a\\\"b\"");
    }
}
