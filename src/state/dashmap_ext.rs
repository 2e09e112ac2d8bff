use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Snapshot helpers for `DashMap` registries.
///
/// `DashMap::get()` and `DashMap::iter()` return guards holding a shard lock.
/// Holding one across `.await`, or while taking a channel or connection lock,
/// invites deadlock. These helpers clone values out so the guard drops
/// before the caller continues.
pub trait DashMapExt<K, V> {
    /// Clone the value for `key`.
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone;

    /// Clone every value.
    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone;
}

impl<K, V> DashMapExt<K, V> for DashMap<K, V>
where
    K: Eq + Hash,
{
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).map(|r| r.value().clone())
    }

    fn values_cloned(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|e| e.value().clone()).collect()
    }
}
