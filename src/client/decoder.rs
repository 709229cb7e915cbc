//! Transparent response decompression.

use std::io::{self, Read};

use bytes::Bytes;

use crate::{
    header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Gzip,
    Deflate,
    Brotli,
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Coding {
    fn parse(token: &str) -> Option<Coding> {
        match token.trim() {
            t if t.eq_ignore_ascii_case("gzip") || t.eq_ignore_ascii_case("x-gzip") => {
                Some(Coding::Gzip)
            }
            t if t.eq_ignore_ascii_case("deflate") => Some(Coding::Deflate),
            t if t.eq_ignore_ascii_case("br") => Some(Coding::Brotli),
            #[cfg(feature = "zstd")]
            t if t.eq_ignore_ascii_case("zstd") => Some(Coding::Zstd),
            _ => None,
        }
    }

    /// Decodes `data`, failing once more than `limit` bytes come out.
    fn decode(self, data: &[u8], limit: usize) -> io::Result<Vec<u8>> {
        let cap = (limit as u64).saturating_add(1);
        let mut decoded = Vec::new();
        match self {
            Coding::Gzip => {
                flate2::read::MultiGzDecoder::new(data)
                    .take(cap)
                    .read_to_end(&mut decoded)?;
            }
            Coding::Deflate => {
                // Servers disagree on whether `deflate` means zlib or raw deflate.
                if flate2::read::ZlibDecoder::new(data)
                    .take(cap)
                    .read_to_end(&mut decoded)
                    .is_err()
                {
                    decoded.clear();
                    flate2::read::DeflateDecoder::new(data)
                        .take(cap)
                        .read_to_end(&mut decoded)?;
                }
            }
            Coding::Brotli => {
                brotli::Decompressor::new(data, 4096)
                    .take(cap)
                    .read_to_end(&mut decoded)?;
            }
            #[cfg(feature = "zstd")]
            Coding::Zstd => {
                zstd_crate::stream::read::Decoder::new(data)?
                    .take(cap)
                    .read_to_end(&mut decoded)?;
            }
        }

        if decoded.len() > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("decoded body exceeds {limit} bytes"),
            ));
        }
        Ok(decoded)
    }
}

/// Default cap on a decompressed body.
pub(crate) const DEFAULT_MAX_DECODED_LEN: usize = 64 * 1024 * 1024;

/// The content codings this build can decode, and how large a decoded body may get.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Accepts {
    pub(crate) max_decoded_len: usize,
}

impl Default for Accepts {
    fn default() -> Self {
        Accepts {
            max_decoded_len: DEFAULT_MAX_DECODED_LEN,
        }
    }
}

impl Accepts {
    pub(crate) fn as_str(&self) -> &'static str {
        if cfg!(feature = "zstd") {
            "gzip, deflate, br, zstd"
        } else {
            "gzip, deflate, br"
        }
    }

    /// Drops the codings from an `Accept-Encoding` value that cannot be decoded.
    ///
    /// Returns `None` when the value is not valid or nothing is left.
    pub(crate) fn filter(&self, value: &HeaderValue) -> Option<HeaderValue> {
        let value = value.to_str().ok()?;
        let kept: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|item| {
                let coding = item.split(';').next().unwrap_or_default().trim();
                coding == "*"
                    || coding.eq_ignore_ascii_case("identity")
                    || Coding::parse(coding).is_some()
            })
            .collect();

        if kept.is_empty() {
            return None;
        }
        HeaderValue::from_str(&kept.join(", ")).ok()
    }

    /// Decodes `body` according to its `Content-Encoding`.
    ///
    /// A body in a coding this build does not know is returned untouched
    /// with its headers. Otherwise `Content-Encoding` and `Content-Length`
    /// are removed since they no longer describe the returned bytes. Every
    /// decoding step is capped at `max_decoded_len` bytes.
    pub(crate) fn decode(&self, headers: &mut HeaderMap, body: Bytes) -> Result<Bytes> {
        if body.is_empty() {
            return Ok(body);
        }

        let mut codings = Vec::new();
        for value in headers.get_all(CONTENT_ENCODING) {
            let Ok(value) = value.to_str() else {
                return Ok(body);
            };
            for token in value.split(',') {
                if token.trim().eq_ignore_ascii_case("identity") {
                    continue;
                }
                match Coding::parse(token) {
                    Some(coding) => codings.push(coding),
                    None => {
                        log::debug!("unsupported content-encoding {token:?}, body left as is");
                        return Ok(body);
                    }
                }
            }
        }

        if codings.is_empty() {
            return Ok(body);
        }

        let mut data = body.to_vec();
        for coding in codings.iter().rev() {
            data = coding
                .decode(&data, self.max_decoded_len)
                .map_err(Error::decode)?;
        }
        log::trace!("decoded {:?} body into {} bytes", codings, data.len());

        headers.remove(CONTENT_ENCODING);
        headers.remove(CONTENT_LENGTH);
        Ok(Bytes::from(data))
    }
}
