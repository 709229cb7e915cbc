//! HTTP header types
//!
//! Re-exports the [`http::header`] types and adds [`OrigHeaderMap`], which
//! remembers how a header name was spelled and in which order names were
//! first seen. HTTP/1.1 is case-insensitive on the wire but fingerprinting
//! servers are not, so every request is written with the spelling supplied
//! by the caller or the fingerprint profile.

pub use http::header::*;
pub use name::OrigHeaderName;

use crate::{Error, Result};

/// Trait for types that can be converted into an [`OrigHeaderName`] (case-preserved header).
///
/// This trait is sealed, so only known types can implement it.
/// Supported types:
/// - `&'static str`
/// - `String`
/// - `Bytes`
/// - `HeaderName`
/// - `&HeaderName`
/// - `OrigHeaderName`
/// - `&OrigHeaderName`
pub trait IntoOrigHeaderName: sealed::Sealed {
    /// Converts the type into an [`OrigHeaderName`].
    fn into_orig_header_name(self) -> OrigHeaderName;
}

/// A map from header names to their original casing.
///
/// [`OrigHeaderMap`] not only preserves the original case of each header name as it appeared
/// in the request or response, but also maintains the insertion order of headers. This makes
/// it suitable for HTTP/1.x message serialization where the order and spelling of headers
/// is part of a client's fingerprint.
#[derive(Debug, Clone, Default)]
pub struct OrigHeaderMap(HeaderMap<OrigHeaderName>);

// ===== impl OrigHeaderMap =====

impl OrigHeaderMap {
    /// Creates a new, empty [`OrigHeaderMap`].
    #[inline]
    pub fn new() -> Self {
        Self(HeaderMap::default())
    }

    /// Creates an empty [`OrigHeaderMap`] with the specified capacity.
    #[inline]
    pub fn with_capacity(size: usize) -> Self {
        Self(HeaderMap::with_capacity(size))
    }

    /// Insert a new header name into the collection.
    ///
    /// If the map did not previously have this key present, then `false` is
    /// returned.
    ///
    /// If the map did have this key present, the new spelling is pushed to the end
    /// of the list of spellings currently associated with the key.
    #[inline]
    pub fn insert<N>(&mut self, orig: N) -> bool
    where
        N: IntoOrigHeaderName,
    {
        let orig = orig.into_orig_header_name();
        match orig.header_name() {
            Some(name) => self.0.append(name, orig),
            None => false,
        }
    }

    /// Sets the spelling of a header name, replacing any previous spelling.
    ///
    /// The position of an already known name is kept.
    #[inline]
    pub fn set<N>(&mut self, orig: N)
    where
        N: IntoOrigHeaderName,
    {
        let orig = orig.into_orig_header_name();
        if let Some(name) = orig.header_name() {
            self.0.insert(name, orig);
        }
    }

    /// Returns the first spelling recorded for `name`.
    #[inline]
    pub fn get(&self, name: &HeaderName) -> Option<&OrigHeaderName> {
        self.0.get(name)
    }

    /// Returns every spelling recorded for `name`, in the order they were found.
    #[inline]
    pub fn get_all<'a>(&'a self, name: &HeaderName) -> GetAll<'a, OrigHeaderName> {
        self.0.get_all(name)
    }

    /// Returns true if a spelling for `name` is recorded.
    #[inline]
    pub fn contains(&self, name: &HeaderName) -> bool {
        self.0.contains_key(name)
    }

    /// Extends the map with all entries from another [`OrigHeaderMap`], the other
    /// map's spelling winning for names present in both.
    #[inline]
    pub fn extend(&mut self, other: &OrigHeaderMap) {
        for (_, orig) in other.iter() {
            self.set(orig);
        }
    }

    /// Returns the number of spellings stored in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over all header names and their original spellings, in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &OrigHeaderName)> {
        self.0.iter()
    }

    /// Calls `dst` for each header in `headers`, names listed in this map first and in
    /// this map's order, every other header afterwards in its own insertion order.
    ///
    /// The spelling written for a name comes from `casing` when present, then from this
    /// map, and falls back to the canonical `Title-Case` form.
    pub(crate) fn sort_headers_for_each<F>(
        &self,
        casing: &OrigHeaderMap,
        headers: &HeaderMap,
        mut dst: F,
    ) where
        F: FnMut(&[u8], &HeaderValue),
    {
        let spelling = |name: &HeaderName| -> Vec<u8> {
            casing
                .get(name)
                .or_else(|| self.get(name))
                .map(|orig| orig.as_ref().to_vec())
                .unwrap_or_else(|| canonical_case(name).into_bytes())
        };

        for name in self.0.keys() {
            if headers.contains_key(name) {
                let orig = spelling(name);
                for value in headers.get_all(name) {
                    dst(&orig, value);
                }
            }
        }

        for name in headers.keys() {
            if !self.0.contains_key(name) {
                let orig = spelling(name);
                for value in headers.get_all(name) {
                    dst(&orig, value);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a OrigHeaderMap {
    type Item = (&'a HeaderName, &'a OrigHeaderName);
    type IntoIter = <&'a HeaderMap<OrigHeaderName> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Converts a lowercase header name to `Title-Case` (`x-request-id` → `X-Request-Id`).
pub(crate) fn canonical_case(name: &HeaderName) -> String {
    let mut upper = true;
    name.as_str()
        .chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c };
            upper = c == '-';
            out
        })
        .collect()
}

/// Parses a caller supplied header pair, keeping the caller's spelling.
pub(crate) fn parse_header<K, V>(name: K, value: V) -> Result<(HeaderName, OrigHeaderName, HeaderValue)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let spelled = name.as_ref();
    let name = HeaderName::from_bytes(spelled.as_bytes()).map_err(Error::builder)?;
    let value = HeaderValue::from_str(value.as_ref()).map_err(Error::builder)?;
    Ok((name, spelled.to_owned().into_orig_header_name(), value))
}

mod name {
    use bytes::Bytes;
    use http::HeaderName;

    use super::IntoOrigHeaderName;

    /// An HTTP header name with both normalized and original casing.
    ///
    /// While HTTP headers are case-insensitive, this type stores both
    /// the canonical `HeaderName` and the original casing as supplied,
    /// so a message can be written exactly as a browser would write it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct OrigHeaderName {
        pub(super) kind: Kind,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) enum Kind {
        /// The original casing of the header name.
        Cased(Bytes),
        /// The canonical (normalized, lowercased) header name.
        Standard(HeaderName),
    }

    impl OrigHeaderName {
        /// The normalized name, `None` if the spelling is not a valid header name.
        pub(super) fn header_name(&self) -> Option<HeaderName> {
            match &self.kind {
                Kind::Cased(bytes) => HeaderName::from_bytes(bytes).ok(),
                Kind::Standard(name) => Some(name.clone()),
            }
        }

        /// The original spelling as a string.
        pub fn as_str(&self) -> &str {
            match &self.kind {
                Kind::Standard(name) => name.as_str(),
                // Only valid header names (visible ASCII tokens) are ever stored.
                Kind::Cased(orig) => std::str::from_utf8(orig).unwrap_or_default(),
            }
        }
    }

    impl AsRef<[u8]> for OrigHeaderName {
        #[inline]
        fn as_ref(&self) -> &[u8] {
            match &self.kind {
                Kind::Standard(name) => name.as_ref(),
                Kind::Cased(orig) => orig.as_ref(),
            }
        }
    }

    impl IntoOrigHeaderName for &'static str {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            Bytes::from_static(self.as_bytes()).into_orig_header_name()
        }
    }

    impl IntoOrigHeaderName for String {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            Bytes::from(self).into_orig_header_name()
        }
    }

    impl IntoOrigHeaderName for Bytes {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            OrigHeaderName {
                kind: Kind::Cased(self),
            }
        }
    }

    impl IntoOrigHeaderName for &HeaderName {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            OrigHeaderName {
                kind: Kind::Standard(self.clone()),
            }
        }
    }

    impl IntoOrigHeaderName for HeaderName {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            OrigHeaderName {
                kind: Kind::Standard(self),
            }
        }
    }

    impl IntoOrigHeaderName for OrigHeaderName {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            self
        }
    }

    impl IntoOrigHeaderName for &OrigHeaderName {
        #[inline]
        fn into_orig_header_name(self) -> OrigHeaderName {
            self.clone()
        }
    }
}

mod sealed {
    use bytes::Bytes;
    use http::HeaderName;

    use crate::header::OrigHeaderName;

    pub trait Sealed {}

    impl Sealed for &'static str {}
    impl Sealed for String {}
    impl Sealed for Bytes {}
    impl Sealed for &HeaderName {}
    impl Sealed for HeaderName {}
    impl Sealed for &OrigHeaderName {}
    impl Sealed for OrigHeaderName {}
}
