//! The container rule and the collection types it covers.
//!
//! Every container is framed as a class holding an element `count` followed
//! by each element under `member`, in the collection's own iteration order.
//! Reading clears the target first and pushes `count` default-constructed
//! elements, each deserialized in turn. Map entries travel as pairs.
//!
//! Ordered and hashed collections cannot hand out `&mut` elements, so their
//! elements are taken out for the duration of the call and reinserted
//! afterwards.
use {
    super::{serialize_class, Category, COUNT_LABEL, MEMBER_LABEL},
    crate::{
        channel::{Channel, Direction},
        error::Result,
        Serialize,
    },
    core::{any::type_name, hash::Hash, mem},
    std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque},
};

/// A collection the container rule can fill and walk.
pub trait Container {
    type Item: Serialize + Default;

    fn count(&self) -> usize;

    fn clear_items(&mut self);

    fn reserve_items(&mut self, _additional: usize) {}

    fn push_item(&mut self, item: Self::Item);

    /// Call `visit` on every element in iteration order. Stops at the first
    /// error; the collection keeps all of its elements either way.
    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut Self::Item) -> Result<()>;
}

/// Serialize `container` under `label` with the container rule.
pub fn serialize_container<C, K>(channel: &mut C, container: &mut K, label: &str) -> Result<()>
where
    C: Channel + ?Sized,
    K: Container,
{
    serialize_class(channel, type_name::<K>(), label, |channel| {
        match channel.direction() {
            Direction::Out => {
                let mut count = container.count() as u64;
                count.serialize(channel, COUNT_LABEL)?;
                container.visit_items(|item| item.serialize(channel, MEMBER_LABEL))
            }
            Direction::In => {
                let mut count = 0u64;
                count.serialize(channel, COUNT_LABEL)?;
                container.clear_items();
                let limit = channel.state().preallocation_limit() / size_of::<K::Item>().max(1);
                container.reserve_items((count as usize).min(limit));
                for _ in 0..count {
                    let mut item = K::Item::default();
                    item.serialize(channel, MEMBER_LABEL)?;
                    container.push_item(item);
                }
                Ok(())
            }
        }
    })
}

/// Visit taken-out elements, then hand all of them back for reinsertion.
fn visit_taken<T, F>(items: Vec<T>, mut visit: F) -> (Vec<T>, Result<()>)
where
    F: FnMut(&mut T) -> Result<()>,
{
    let mut result = Ok(());
    let mut visited = Vec::with_capacity(items.len());
    for mut item in items {
        if result.is_ok() {
            result = visit(&mut item);
        }
        visited.push(item);
    }
    (visited, result)
}

macro_rules! impl_serialize_container {
    ($([$($generics:tt)*] $type:ty),+ $(,)?) => {
        $(
            impl<$($generics)*> Serialize for $type {
                const CATEGORY: Category = Category::Container;

                #[inline]
                fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
                    serialize_container(channel, self, label)
                }
            }
        )+
    };
}

impl_serialize_container!(
    [T: Serialize + Default] Vec<T>,
    [T: Serialize + Default] VecDeque<T>,
    [T: Serialize + Default] LinkedList<T>,
    [T: Serialize + Default + Ord] BTreeSet<T>,
    [T: Serialize + Default + Eq + Hash] HashSet<T>,
    [K: Serialize + Default + Ord, V: Serialize + Default] BTreeMap<K, V>,
    [K: Serialize + Default + Eq + Hash, V: Serialize + Default] HashMap<K, V>,
    [K: Serialize + Default + Ord + Clone, V: Serialize + Default] MultiMap<K, V>,
);

impl<T: Serialize + Default> Container for Vec<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.push(item);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        self.iter_mut().try_for_each(visit)
    }
}

impl<T: Serialize + Default> Container for VecDeque<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.push_back(item);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        self.iter_mut().try_for_each(visit)
    }
}

impl<T: Serialize + Default> Container for LinkedList<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn push_item(&mut self, item: T) {
        self.push_back(item);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        self.iter_mut().try_for_each(visit)
    }
}

impl<T: Serialize + Default + Ord> Container for BTreeSet<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn push_item(&mut self, item: T) {
        self.insert(item);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        let (items, result) = visit_taken(mem::take(self).into_iter().collect(), visit);
        self.extend(items);
        result
    }
}

impl<T: Serialize + Default + Eq + Hash> Container for HashSet<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, item: T) {
        self.insert(item);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut T) -> Result<()>,
    {
        let (items, result) = visit_taken(self.drain().collect(), visit);
        self.extend(items);
        result
    }
}

impl<K, V> Container for BTreeMap<K, V>
where
    K: Serialize + Default + Ord,
    V: Serialize + Default,
{
    type Item = (K, V);

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn push_item(&mut self, (key, value): (K, V)) {
        self.insert(key, value);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut (K, V)) -> Result<()>,
    {
        let (entries, result) = visit_taken(mem::take(self).into_iter().collect(), visit);
        self.extend(entries);
        result
    }
}

impl<K, V> Container for HashMap<K, V>
where
    K: Serialize + Default + Eq + Hash,
    V: Serialize + Default,
{
    type Item = (K, V);

    fn count(&self) -> usize {
        self.len()
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn reserve_items(&mut self, additional: usize) {
        self.reserve(additional);
    }

    fn push_item(&mut self, (key, value): (K, V)) {
        self.insert(key, value);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut (K, V)) -> Result<()>,
    {
        let (entries, result) = visit_taken(self.drain().collect(), visit);
        self.extend(entries);
        result
    }
}

/// An ordered map that keeps every value inserted under a key.
///
/// Iteration visits keys in order and, within a key, values in insertion
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiMap<K, V> {
    entries: BTreeMap<K, Vec<V>>,
    len: usize,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<K: Ord, V> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.entry(key).or_default().push(value);
        self.len += 1;
    }

    /// All values stored under `key`, oldest first.
    pub fn get(&self, key: &K) -> &[V] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for MultiMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + Clone, V> MultiMap<K, V> {
    fn take_entries(&mut self) -> Vec<(K, V)> {
        self.len = 0;
        mem::take(&mut self.entries)
            .into_iter()
            .flat_map(|(key, values)| {
                values
                    .into_iter()
                    .map(move |value| (key.clone(), value))
            })
            .collect()
    }
}

impl<K, V> Container for MultiMap<K, V>
where
    K: Serialize + Default + Ord + Clone,
    V: Serialize + Default,
{
    type Item = (K, V);

    fn count(&self) -> usize {
        self.len
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn push_item(&mut self, (key, value): (K, V)) {
        self.insert(key, value);
    }

    fn visit_items<F>(&mut self, visit: F) -> Result<()>
    where
        F: FnMut(&mut (K, V)) -> Result<()>,
    {
        let (entries, result) = visit_taken(self.take_entries(), visit);
        self.extend(entries);
        result
    }
}
