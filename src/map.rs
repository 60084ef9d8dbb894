use core::fmt;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::table::Entry as TableEntry;
use crate::table::FlatTable;

/// Default number of slots allocated by [`FlatHashMap::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// The error returned by [`FlatHashMap::get`] and [`FlatHashMap::get_mut`]
/// when the key is absent.
///
/// A failed lookup has no side effects on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNotFound;

impl fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl core::error::Error for KeyNotFound {}

/// A hash map implemented on the open-addressing [`FlatTable`].
///
/// `FlatHashMap<K, V, S>` stores key-value pairs directly in the table's slot
/// array. Keys implement `Hash + Eq` and are hashed through a configurable
/// [`BuildHasher`] `S` supplied at construction; the hasher must be a pure
/// function of the key and consistent with equality (equal keys must hash
/// identically).
///
/// Capacity is always a power of two and the load factor never exceeds 7/8:
/// the table doubles transparently before an insertion would cross the
/// threshold. Erasing leaves a tombstone in the slot; tombstones are purged
/// when the table next grows.
///
/// The map is not thread safe and has no internal locking.
///
/// # Examples
///
/// ```rust
/// use flat_hash_map::FlatHashMap;
///
/// let mut map = FlatHashMap::new();
/// assert!(map.insert("one", 1));
/// assert!(!map.insert("one", 99));
///
/// *map.upsert("two") = 2;
///
/// assert_eq!(map.get(&"one"), Ok(&1));
/// assert_eq!(map.get(&"two"), Ok(&2));
/// ```
#[derive(Clone)]
pub struct FlatHashMap<K, V, S = crate::DefaultHashBuilder> {
    table: FlatTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for FlatHashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

#[cfg(feature = "foldhash")]
impl<K, V> FlatHashMap<K, V>
where
    K: Hash + Eq,
{
    /// Creates a new map with the default capacity of 1024 slots and the
    /// default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let map: FlatHashMap<i32, String> = FlatHashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 1024);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, crate::DefaultHashBuilder::default())
    }

    /// Creates a new map with at least the requested capacity and the default
    /// hasher.
    ///
    /// The capacity is rounded up to the next power of two (minimum 1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let map: FlatHashMap<i32, String> = FlatHashMap::with_capacity(100);
    /// assert_eq!(map.capacity(), 128);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, crate::DefaultHashBuilder::default())
    }
}

impl<K, V, S> FlatHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new map with the default capacity and the given hasher
    /// builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use flat_hash_map::FlatHashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: FlatHashMap<i32, String, _> = FlatHashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates a new map with at least the requested capacity and the given
    /// hasher builder.
    ///
    /// The capacity is rounded up to the next power of two (minimum 1).
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: FlatTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the backing array.
    ///
    /// Always a power of two; the map grows once `len()` would exceed 7/8 of
    /// this.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all entries, resetting every slot to empty.
    ///
    /// The allocated capacity is preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 1024);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Inserts a key-value pair, without overwriting.
    ///
    /// Returns `true` if the pair was inserted, `false` if the key was
    /// already present. On a duplicate key the existing value is left
    /// untouched and the given pair is dropped. Use [`upsert`](Self::upsert)
    /// or the [`entry`](Self::entry) API to update in place.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// assert!(map.insert("k", 1));
    /// assert!(!map.insert("k", 2));
    /// assert_eq!(map.get(&"k"), Ok(&1));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(hash, |(k, _)| k == &key) {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                true
            }
        }
    }

    /// Returns a mutable reference to the value for `key`, inserting a
    /// default value first if the key is absent.
    ///
    /// This is the indexing operation of the map: it always succeeds, and
    /// writing through the returned reference updates the stored value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// *map.upsert("counter") += 1;
    /// *map.upsert("counter") += 1;
    /// assert_eq!(map.get(&"counter"), Ok(&2));
    /// ```
    pub fn upsert(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.entry(key).or_default()
    }

    /// Returns a reference to the value for `key`, or [`KeyNotFound`] if the
    /// key is absent.
    ///
    /// A miss has no side effects.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    /// use flat_hash_map::KeyNotFound;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Ok(&"a"));
    /// assert_eq!(map.get(&2), Err(KeyNotFound));
    /// ```
    pub fn get(&self, key: &K) -> Result<&V, KeyNotFound> {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find(hash, |(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or(KeyNotFound)
    }

    /// Returns a mutable reference to the value for `key`, or [`KeyNotFound`]
    /// if the key is absent.
    pub fn get_mut(&mut self, key: &K) -> Result<&mut V, KeyNotFound> {
        let hash = self.hash_builder.hash_one(key);
        match self.table.find_mut(hash, |(k, _)| k == key) {
            Some((_, v)) => Ok(v),
            None => Err(KeyNotFound),
        }
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_ok()
    }

    /// Erases `key` from the map.
    ///
    /// Returns `true` if the key was present. Erasing an absent key is a
    /// no-op returning `false`, never an error. The slot becomes a tombstone
    /// (the key and value are dropped immediately) and stays part of its
    /// probe chain until the map next grows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// assert!(map.remove(&1));
    /// assert!(!map.remove(&1));
    /// ```
    pub fn remove(&mut self, key: &K) -> bool {
        let hash = self.hash_builder.hash_one(key);
        self.table.remove(hash, |(k, _)| k == key).is_some()
    }

    /// Gets the given key's entry for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.entry(1).or_insert("a");
    /// map.entry(1).and_modify(|v| *v = "b");
    /// assert_eq!(map.get(&1), Ok(&"b"));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(hash, |(k, _)| k == &key) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Returns an iterator over the `(&K, &V)` pairs of the map.
    ///
    /// Pairs are yielded in slot-index order, which is not insertion order.
    /// Mutating the map invalidates the iterator; the borrow checker rules
    /// out using it afterwards.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the `(&K, &mut V)` pairs of the map.
    ///
    /// Keys are never handed out mutably: mutating a key would desynchronize
    /// it from the slot chosen by its original hash.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator positioned at the entry for `key`, or at the end
    /// of the map if the key is absent.
    ///
    /// When the key is present the matching pair is yielded first, followed
    /// by the remaining entries in slot-index order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash_map::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert("k", 7);
    ///
    /// assert_eq!(map.find(&"k").next(), Some((&"k", &7)));
    /// assert_eq!(map.find(&"absent").next(), None);
    /// ```
    pub fn find(&self, key: &K) -> Iter<'_, K, V> {
        let hash = self.hash_builder.hash_one(key);
        Iter {
            inner: self.table.find_iter(hash, |(k, _)| k == key),
        }
    }

    /// Returns an iterator that removes and yields all `(K, V)` pairs.
    ///
    /// The map is empty once the iterator is dropped, even if it was not
    /// fully consumed.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, S> Default for FlatHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, S::default())
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`FlatHashMap`].
///
/// [`entry`]: FlatHashMap::entry
pub enum Entry<'a, K, V> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V> Entry<'a, K, V>
where
    V: Default,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V> {
    entry: crate::table::VacantEntry<'a, (K, V)>,
    key: K,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V> {
    entry: crate::table::OccupiedEntry<'a, (K, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value in the entry, returning the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Erases the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Erases the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a [`FlatHashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }
}

/// A mutable iterator over the key-value pairs of a [`FlatHashMap`].
pub struct IterMut<'a, K, V> {
    inner: crate::table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|&mut (ref k, ref mut v)| (k, v))
    }
}

/// An iterator over the keys of a [`FlatHashMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a [`FlatHashMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// A draining iterator over the key-value pairs of a [`FlatHashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::table::Drain<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Drain<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
