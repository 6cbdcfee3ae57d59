//! Hash collections used throughout the crate, keyed with the Fx hasher.

pub use std::collections::{BTreeMap, BTreeSet, VecDeque, hash_map};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
