//! Built-in browser profiles.
//!
//! Values are taken from captured ClientHellos and HTTP/1.1 requests of the
//! named browser builds.

mod chrome;
mod firefox;
mod okhttp;
mod safari;

use std::borrow::Cow;

use super::ProfileParams;

pub(super) fn all() -> Vec<ProfileParams> {
    vec![
        chrome::chrome_117(),
        chrome::chrome_120(),
        chrome::edge_122(),
        firefox::firefox_121(),
        safari::safari_17(),
        okhttp::okhttp_4_12(),
    ]
}

type Headers = Vec<(Cow<'static, str>, Cow<'static, str>)>;

/// Builds a header list from static pairs.
fn headers(pairs: &[(&'static str, &'static str)]) -> Headers {
    pairs
        .iter()
        .map(|(name, value)| (Cow::Borrowed(*name), Cow::Borrowed(*value)))
        .collect()
}

fn names(names: &[&'static str]) -> Vec<Cow<'static, str>> {
    names.iter().copied().map(Cow::Borrowed).collect()
}
