use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{browser, FingerprintProfile, ProfileId};
use crate::{Error, Result};

static BUILTIN: Lazy<Catalog> = Lazy::new(|| Catalog {
    profiles: browser::all()
        .into_iter()
        .map(|params| Arc::new(FingerprintProfile::new(params)))
        .collect(),
});

/// A non-empty set of fingerprint profiles with unique ids.
///
/// ```
/// use rquest_engine::profile::Catalog;
///
/// let catalog = Catalog::builtin();
/// assert!(catalog.len() > 1);
/// assert!(catalog.get("chrome_120").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: Vec<Arc<FingerprintProfile>>,
}

impl Catalog {
    /// The profiles shipped with the crate.
    pub fn builtin() -> Catalog {
        BUILTIN.clone()
    }

    /// Creates a catalog from `profiles`.
    ///
    /// Fails if `profiles` is empty or two profiles share an id.
    pub fn new<I>(profiles: I) -> Result<Catalog>
    where
        I: IntoIterator<Item = FingerprintProfile>,
    {
        let mut catalog = Catalog {
            profiles: Vec::new(),
        };
        for profile in profiles {
            if catalog.get(profile.id().as_str()).is_some() {
                return Err(Error::builder(format!(
                    "duplicate fingerprint profile `{}`",
                    profile.id()
                )));
            }
            catalog.profiles.push(Arc::new(profile));
        }
        if catalog.profiles.is_empty() {
            return Err(Error::builder("fingerprint catalog is empty"));
        }
        Ok(catalog)
    }

    /// Loads a catalog from a JSON array of profile parameters.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn from_json(json: &str) -> Result<Catalog> {
        let profiles: Vec<FingerprintProfile> =
            serde_json::from_str(json).map_err(Error::builder)?;
        Catalog::new(profiles)
    }

    /// Returns a catalog with `profile` added, replacing a profile with the same id.
    pub fn with_profile(mut self, profile: FingerprintProfile) -> Catalog {
        let profile = Arc::new(profile);
        match self.profiles.iter().position(|p| p.id() == profile.id()) {
            Some(pos) => self.profiles[pos] = profile,
            None => self.profiles.push(profile),
        }
        self
    }

    /// Looks up a profile by id.
    pub fn get(&self, id: &str) -> Option<&Arc<FingerprintProfile>> {
        self.profiles.iter().find(|p| p.id() == id)
    }

    /// The number of profiles. Never zero.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The profile ids, in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = &ProfileId> {
        self.profiles.iter().map(|p| p.id())
    }

    /// The profiles, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FingerprintProfile>> {
        self.profiles.iter()
    }

    pub(crate) fn at(&self, index: usize) -> Option<&Arc<FingerprintProfile>> {
        self.profiles.get(index)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::builtin()
    }
}
