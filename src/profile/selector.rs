use std::{fmt, sync::Arc};

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{Catalog, FingerprintProfile};
use crate::sync::Mutex;

static PROCESS: Lazy<ProfileSelector> = Lazy::new(|| ProfileSelector::from_rng(StdRng::from_os_rng()));

/// Picks a profile uniformly at random from a [`Catalog`].
///
/// Clones share one random stream. [`ProfileSelector::default`] returns a handle
/// to the process-wide stream; [`ProfileSelector::seeded`] gives a
/// reproducible sequence for tests.
#[derive(Clone)]
pub struct ProfileSelector {
    rng: Arc<Mutex<StdRng>>,
}

impl ProfileSelector {
    /// A selector with its own stream seeded from the operating system.
    pub fn new() -> ProfileSelector {
        ProfileSelector::from_rng(StdRng::from_os_rng())
    }

    /// A selector producing the same sequence for the same `seed`.
    pub fn seeded(seed: u64) -> ProfileSelector {
        ProfileSelector::from_rng(StdRng::seed_from_u64(seed))
    }

    /// A selector drawing from `rng`.
    pub fn from_rng(rng: StdRng) -> ProfileSelector {
        ProfileSelector {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Picks one profile of `catalog`.
    pub fn select(&self, catalog: &Catalog) -> Arc<FingerprintProfile> {
        let index = self.rng.lock().random_range(0..catalog.len());
        let profile = match catalog.at(index) {
            Some(profile) => profile.clone(),
            None => unreachable!("a catalog is never empty"),
        };
        log::debug!("selected fingerprint profile {}", profile.id());
        profile
    }
}

impl Default for ProfileSelector {
    fn default() -> Self {
        PROCESS.clone()
    }
}

impl fmt::Debug for ProfileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("ProfileSelector { .. }")
    }
}
