use ahash::RandomState;
use schnellru::ByLength;

/// Pre-seeded [`RandomState`] for consistent internal hashing.
///
/// Uses fixed seeds to ensure deterministic hashing behavior across
/// program runs. Used by the connection pool and the TLS session cache.
///
/// **Note**: Not cryptographically secure due to fixed seeds.
pub const HASHER: RandomState = RandomState::with_seeds(
    0x6b68_d618_a4b5_3c57,
    0xadc8_c4d5_82bb_1313,
    0x2f72_c2c1_9b04_2d4c,
    0x94e5_8d83_a26c_3f28,
);

/// A type alias for a hash map using `ahash` with a pre-seeded `RandomState`.
pub type HashMap<K, V> = std::collections::HashMap<K, V, RandomState>;

/// A specialized LRU cache using `schnellru` with a fixed capacity
pub type LruMap<K, V> = schnellru::LruMap<K, V, ByLength, RandomState>;
