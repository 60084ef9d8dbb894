use alloc::vec::Vec;
use core::fmt::Debug;
use core::mem;

/// One cell of the backing array.
///
/// A `Tombstone` marks a slot whose entry was erased. It still terminates as
/// "occupied" for probing purposes so that lookups of keys whose probe chain
/// passes through it are not falsely short-circuited; only `Empty` proves
/// that no insertion ever probed past a slot.
enum Slot<V> {
    Empty,
    Tombstone,
    Occupied { hash: u64, value: V },
}

impl<V> Slot<V> {
    #[inline(always)]
    fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }

    #[inline(always)]
    fn value(&self) -> Option<&V> {
        match self {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    #[inline(always)]
    fn value_mut(&mut self) -> Option<&mut V> {
        match self {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl<V> Clone for Slot<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Slot::Empty => Slot::Empty,
            Slot::Tombstone => Slot::Tombstone,
            Slot::Occupied { hash, value } => Slot::Occupied {
                hash: *hash,
                value: value.clone(),
            },
        }
    }
}

/// The probe sequence: linear probing over a power-of-two slot array.
///
/// Every probing path in the table (lookup, insertion-position search, and
/// reinsertion during growth) consumes this one type, so the sequences can
/// never diverge. Divergence between the lookup path and the insert path
/// would make entries permanently unreachable.
///
/// The sequence wraps around forever; termination relies on the load-factor
/// invariant keeping at least one eighth of the slots `Empty`.
struct ProbeSeq {
    index: usize,
    mask: usize,
}

impl ProbeSeq {
    #[inline(always)]
    fn new(hash: u64, mask: usize) -> Self {
        ProbeSeq {
            index: hash as usize & mask,
            mask,
        }
    }

    #[inline(always)]
    fn next(&mut self) -> usize {
        let index = self.index;
        self.index = (self.index + 1) & self.mask;
        index
    }
}

/// Maximum load factor is 7/8 (0.875): grow before an insertion would push
/// `used / capacity` past it.
///
/// `used` counts every non-empty slot, tombstones included. Empty slots are
/// the only probe terminators, so the table must never run out of them even
/// when erase-heavy churn leaves it mostly tombstones.
#[inline(always)]
fn exceeds_load_factor(used: usize, capacity: usize) -> bool {
    used * 8 > capacity * 7
}

/// A flat open-addressing hash table.
///
/// `FlatTable<V>` stores values of type `V` directly in a single
/// power-of-two-sized slot array and resolves collisions by linear probing.
/// Erased entries leave tombstones that keep probe chains intact; tombstones
/// count toward the growth trigger and are purged only when the table grows. Like standard raw-table APIs, every
/// operation takes a precomputed hash and an equality predicate instead of a
/// key, which lets maps, sets, and interners share one table type.
///
/// The hash supplied for a value must be stable for as long as the value is
/// in the table, and equal values must be given equal hashes.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use flat_hash_map::table::Entry;
/// # use flat_hash_map::table::FlatTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = FlatTable::with_capacity(100);
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
///
/// assert_eq!(table.len(), 1);
/// ```
pub struct FlatTable<V> {
    slots: Vec<Slot<V>>,
    populated: usize,
    tombstones: usize,
}

impl<V> Debug for FlatTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatTable")
            .field("populated", &self.populated)
            .field("capacity", &self.slots.len())
            .field("tombstones", &self.tombstones)
            .finish()
    }
}

impl<V> Clone for FlatTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        FlatTable {
            slots: self.slots.clone(),
            populated: self.populated,
            tombstones: self.tombstones,
        }
    }
}

impl<V> FlatTable<V> {
    /// Creates a new table with the requested capacity rounded up to the next
    /// power of two (minimum 1). All slots start out `Empty`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use flat_hash_map::table::FlatTable;
    /// #
    /// let table: FlatTable<String> = FlatTable::with_capacity(1000);
    /// assert_eq!(table.capacity(), 1024);
    ///
    /// let table: FlatTable<String> = FlatTable::with_capacity(0);
    /// assert_eq!(table.capacity(), 1);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);

        FlatTable {
            slots,
            populated: 0,
            tombstones: 0,
        }
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table contains no values.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots in the backing array.
    ///
    /// Always a power of two. The table grows once the number of values would
    /// exceed 7/8 of this.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline(always)]
    fn probe(&self, hash: u64) -> ProbeSeq {
        ProbeSeq::new(hash, self.mask())
    }

    /// Walks the probe sequence for `hash` looking for a matching occupied
    /// slot. `Empty` terminates the walk: it proves the value is absent.
    /// Tombstones and non-matching occupied slots keep the walk going.
    fn find_index(&self, hash: u64, mut eq: impl FnMut(&V) -> bool) -> Option<usize> {
        let mut probe = self.probe(hash);
        loop {
            let index = probe.next();
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Occupied {
                    hash: stored,
                    value,
                } if *stored == hash && eq(value) => return Some(index),
                _ => {}
            }
        }
    }

    /// Walks the probe sequence for `hash` looking for the slot an insertion
    /// should use. Returns `(index, true)` if a matching value already sits
    /// at `index`, otherwise `(index, false)` where `index` is the first
    /// tombstone seen on the walk, or the terminating empty slot if there was
    /// none. Reusing a tombstone before falling through to open space bounds
    /// the average probe length.
    fn insertion_index(&self, hash: u64, mut eq: impl FnMut(&V) -> bool) -> (usize, bool) {
        let mut probe = self.probe(hash);
        let mut tombstone = None;
        loop {
            let index = probe.next();
            match &self.slots[index] {
                Slot::Empty => return (tombstone.unwrap_or(index), false),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied {
                    hash: stored,
                    value,
                } if *stored == hash && eq(value) => return (index, true),
                Slot::Occupied { .. } => {}
            }
        }
    }

    /// First empty slot on the probe sequence for `hash`. Only used while
    /// rebuilding into a fresh array, which contains no tombstones.
    fn first_empty(&self, hash: u64) -> usize {
        let mut probe = self.probe(hash);
        loop {
            let index = probe.next();
            if matches!(self.slots[index], Slot::Empty) {
                return index;
            }
        }
    }

    /// Doubles the backing array and reinserts every occupied entry into the
    /// fresh array via the normal probe sequence. Tombstones and empties are
    /// dropped; this is the only place tombstones are purged.
    fn grow(&mut self) {
        let new_capacity = self.slots.len() * 2;
        let mut new_slots = Vec::with_capacity(new_capacity);
        new_slots.resize_with(new_capacity, || Slot::Empty);

        let old_slots = mem::replace(&mut self.slots, new_slots);
        self.tombstones = 0;
        for slot in old_slots {
            if let Slot::Occupied { hash, value } = slot {
                let index = self.first_empty(hash);
                self.slots[index] = Slot::Occupied { hash, value };
            }
        }
    }

    /// Gets the entry for a value, growing the table first if the projected
    /// load factor would exceed 7/8. Tombstones count toward the trigger, so
    /// erase-heavy churn rehashes the table instead of exhausting the empty
    /// slots that terminate probe chains.
    ///
    /// The returned [`Entry`] is `Occupied` if a value matching `eq` (with
    /// the same hash) is present, `Vacant` otherwise. A vacant entry points
    /// at the slot an insertion will use: the first tombstone on the probe
    /// chain if one exists, else the terminating empty slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash_map::table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::with_capacity(10);
    /// let hash = hash_str("key");
    ///
    /// let value = table
    ///     .entry(hash, |s: &String| s == "key")
    ///     .or_insert("key".to_string());
    /// assert_eq!(value, "key");
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl FnMut(&V) -> bool) -> Entry<'_, V> {
        if exceeds_load_factor(self.populated + self.tombstones + 1, self.slots.len()) {
            self.grow();
        }

        let (index, occupied) = self.insertion_index(hash, eq);
        if occupied {
            Entry::Occupied(OccupiedEntry { table: self, index })
        } else {
            Entry::Vacant(VacantEntry {
                table: self,
                index,
                hash,
            })
        }
    }

    /// Returns a reference to the value matching `eq`, if present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash_map::table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::with_capacity(10);
    /// let hash = hash_str("key");
    /// table
    ///     .entry(hash, |s: &String| s == "key")
    ///     .or_insert("key".to_string());
    ///
    /// assert!(table.find(hash, |s| s == "key").is_some());
    /// assert!(table.find(hash_str("other"), |s| s == "other").is_none());
    /// ```
    pub fn find(&self, hash: u64, eq: impl FnMut(&V) -> bool) -> Option<&V> {
        let index = self.find_index(hash, eq)?;
        self.slots[index].value()
    }

    /// Returns a mutable reference to the value matching `eq`, if present.
    pub fn find_mut(&mut self, hash: u64, eq: impl FnMut(&V) -> bool) -> Option<&mut V> {
        let index = self.find_index(hash, eq)?;
        self.slots[index].value_mut()
    }

    /// Removes the value matching `eq` and returns it.
    ///
    /// The slot becomes a tombstone: the key and value are dropped, but the
    /// slot keeps occupying its position in the probe chain until the table
    /// next grows.
    ///
    /// Returns `None` (a no-op, not an error) if no value matches.
    pub fn remove(&mut self, hash: u64, eq: impl FnMut(&V) -> bool) -> Option<V> {
        let index = self.find_index(hash, eq)?;
        match mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Occupied { value, .. } => {
                self.populated -= 1;
                self.tombstones += 1;
                Some(value)
            }
            _ => unreachable!("find_index returned a non-occupied slot"),
        }
    }

    /// Resets every slot to `Empty` at the current capacity.
    ///
    /// Does not shrink the backing array.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.populated = 0;
        self.tombstones = 0;
    }

    /// Returns an iterator over all values, in slot-index order.
    ///
    /// Slot-index order is not insertion order or any other meaningful
    /// order, and changes when the table grows.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: self.slots.iter(),
        }
    }

    /// Returns an iterator over all values with mutable references, in
    /// slot-index order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            slots: self.slots.iter_mut(),
        }
    }

    /// Returns an iterator positioned at the value matching `eq`, or at the
    /// end of the table if no value matches.
    ///
    /// A positioned iterator yields the match first and then the remaining
    /// occupied slots in slot-index order.
    pub fn find_iter(&self, hash: u64, eq: impl FnMut(&V) -> bool) -> Iter<'_, V> {
        let start = self
            .find_index(hash, eq)
            .unwrap_or_else(|| self.slots.len());
        Iter {
            slots: self.slots[start..].iter(),
        }
    }

    /// Returns an iterator that removes and yields every value.
    ///
    /// The table is empty once the iterator is dropped, even if it was not
    /// fully consumed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash_map::table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::with_capacity(10);
    /// table
    ///     .entry(hash_str("key"), |s: &String| s == "key")
    ///     .or_insert("key".to_string());
    ///
    /// let values: Vec<String> = table.drain().collect();
    /// assert!(table.is_empty());
    /// assert_eq!(values.len(), 1);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            index: 0,
        }
    }
}

/// A view into a single slot of a [`FlatTable`], which may be vacant or
/// occupied.
///
/// Constructed by [`FlatTable::entry`].
pub enum Entry<'a, V> {
    /// The slot holds a matching value.
    Occupied(OccupiedEntry<'a, V>),
    /// No matching value; the entry points at the slot an insertion will use.
    Vacant(VacantEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `value` if the entry is vacant and returns a mutable reference
    /// to the value in the slot.
    pub fn or_insert(self, value: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference to the value in the slot.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }
}

/// A view into an occupied slot of a [`FlatTable`].
pub struct OccupiedEntry<'a, V> {
    table: &'a mut FlatTable<V>,
    index: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the slot.
    pub fn get(&self) -> &V {
        match &self.table.slots[self.index] {
            Slot::Occupied { value, .. } => value,
            _ => unreachable!("occupied entry points at a non-occupied slot"),
        }
    }

    /// Gets a mutable reference to the value in the slot.
    pub fn get_mut(&mut self) -> &mut V {
        match &mut self.table.slots[self.index] {
            Slot::Occupied { value, .. } => value,
            _ => unreachable!("occupied entry points at a non-occupied slot"),
        }
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        match &mut self.table.slots[self.index] {
            Slot::Occupied { value, .. } => value,
            _ => unreachable!("occupied entry points at a non-occupied slot"),
        }
    }

    /// Removes the value from the table, leaving a tombstone in its slot.
    pub fn remove(self) -> V {
        match mem::replace(&mut self.table.slots[self.index], Slot::Tombstone) {
            Slot::Occupied { value, .. } => {
                self.table.populated -= 1;
                self.table.tombstones += 1;
                value
            }
            _ => unreachable!("occupied entry points at a non-occupied slot"),
        }
    }
}

/// A view into a vacant slot of a [`FlatTable`].
pub struct VacantEntry<'a, V> {
    table: &'a mut FlatTable<V>,
    index: usize,
    hash: u64,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Writes `value` into the slot (reusing a tombstone if the entry points
    /// at one) and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        if matches!(self.table.slots[self.index], Slot::Tombstone) {
            self.table.tombstones -= 1;
        }
        self.table.slots[self.index] = Slot::Occupied {
            hash: self.hash,
            value,
        };
        self.table.populated += 1;
        match &mut self.table.slots[self.index] {
            Slot::Occupied { value, .. } => value,
            _ => unreachable!("slot was just written as occupied"),
        }
    }
}

/// An iterator over the values of a [`FlatTable`].
///
/// Skips empty and tombstone slots; yields occupied slots in slot-index
/// order.
pub struct Iter<'a, V> {
    slots: core::slice::Iter<'a, Slot<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.slots.next()? {
                Slot::Occupied { value, .. } => return Some(value),
                _ => {}
            }
        }
    }
}

/// A mutable iterator over the values of a [`FlatTable`].
pub struct IterMut<'a, V> {
    slots: core::slice::IterMut<'a, Slot<V>>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.slots.next()? {
                Slot::Occupied { value, .. } => return Some(value),
                _ => {}
            }
        }
    }
}

/// A draining iterator over the values of a [`FlatTable`].
///
/// Created by [`FlatTable::drain`]. Dropping the iterator removes any values
/// it has not yet yielded.
pub struct Drain<'a, V> {
    table: &'a mut FlatTable<V>,
    index: usize,
}

impl<'a, V> Iterator for Drain<'a, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.table.slots.len() {
            let index = self.index;
            self.index += 1;

            if self.table.slots[index].is_occupied() {
                if let Slot::Occupied { value, .. } =
                    mem::replace(&mut self.table.slots[index], Slot::Empty)
                {
                    self.table.populated -= 1;
                    return Some(value);
                }
            }
        }
        None
    }
}

impl<'a, V> Drop for Drain<'a, V> {
    fn drop(&mut self) {
        for _ in self {}
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn tombstones<V>(table: &FlatTable<V>) -> usize {
        table
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Tombstone))
            .count()
    }

    fn empties<V>(table: &FlatTable<V>) -> usize {
        table
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Empty))
            .count()
    }

    #[test]
    fn with_capacity_rounds_to_power_of_two() {
        assert_eq!(FlatTable::<u32>::with_capacity(0).capacity(), 1);
        assert_eq!(FlatTable::<u32>::with_capacity(1).capacity(), 1);
        assert_eq!(FlatTable::<u32>::with_capacity(3).capacity(), 4);
        assert_eq!(FlatTable::<u32>::with_capacity(1000).capacity(), 1024);
        assert_eq!(FlatTable::<u32>::with_capacity(1024).capacity(), 1024);
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: FlatTable<Item> = FlatTable::with_capacity(0);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v: &Item| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: k as i32,
                    });
                }
                Entry::Occupied(_) => panic!("unexpected occupied on first insert"),
            }
        }

        assert_eq!(table.len(), 32);

        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            let found = table.find(hash, |v| v.key == k);
            assert_eq!(
                found,
                Some(&Item {
                    key: k,
                    value: k as i32
                })
            );
        }

        let miss = hash_key(&state, 999);
        assert!(table.find(miss, |v| v.key == 999).is_none());
    }

    #[test]
    fn entry_occupied_on_duplicate() {
        let state = HashState::default();
        let mut table: FlatTable<Item> = FlatTable::with_capacity(8);
        let hash = hash_key(&state, 7);

        table
            .entry(hash, |v| v.key == 7)
            .or_insert(Item { key: 7, value: 70 });

        match table.entry(hash, |v| v.key == 7) {
            Entry::Occupied(entry) => assert_eq!(entry.get().value, 70),
            Entry::Vacant(_) => panic!("expected occupied entry"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn find_mut_writes_through() {
        let state = HashState::default();
        let mut table: FlatTable<Item> = FlatTable::with_capacity(8);
        let hash = hash_key(&state, 1);
        table
            .entry(hash, |v| v.key == 1)
            .or_insert(Item { key: 1, value: 1 });

        if let Some(item) = table.find_mut(hash, |v| v.key == 1) {
            item.value = 99;
        }
        assert_eq!(table.find(hash, |v| v.key == 1).unwrap().value, 99);
    }

    // Collision-heavy tests pin the tombstone semantics by forcing every
    // value onto the same probe chain with a constant hash.

    #[test]
    fn tombstone_does_not_break_probe_chain() {
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in [1u64, 2, 3] {
            table.entry(0, |v| *v == k).or_insert(k);
        }

        // 1, 2, 3 occupy consecutive slots starting at slot 0.
        assert!(matches!(table.slots[0], Slot::Occupied { value: 1, .. }));
        assert!(matches!(table.slots[1], Slot::Occupied { value: 2, .. }));
        assert!(matches!(table.slots[2], Slot::Occupied { value: 3, .. }));

        assert_eq!(table.remove(0, |v| *v == 2), Some(2));
        assert!(matches!(table.slots[1], Slot::Tombstone));

        // The value past the tombstone must still be reachable.
        assert_eq!(table.find(0, |v| *v == 3), Some(&3));
        assert_eq!(table.find(0, |v| *v == 1), Some(&1));
    }

    #[test]
    fn insert_reuses_first_tombstone() {
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in [1u64, 2, 3] {
            table.entry(0, |v| *v == k).or_insert(k);
        }
        table.remove(0, |v| *v == 2);

        table.entry(0, |v| *v == 4).or_insert(4);
        assert!(matches!(table.slots[1], Slot::Occupied { value: 4, .. }));
        assert_eq!(tombstones(&table), 0);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn duplicate_probe_past_tombstone_is_found_not_reinserted() {
        // A tombstone ahead of an existing value must not cause the value to
        // be inserted a second time.
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in [1u64, 2, 3] {
            table.entry(0, |v| *v == k).or_insert(k);
        }
        table.remove(0, |v| *v == 1);

        match table.entry(0, |v| *v == 3) {
            Entry::Occupied(entry) => assert_eq!(*entry.get(), 3),
            Entry::Vacant(_) => panic!("value behind a tombstone was not found"),
        }
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn remove_absent_is_noop() {
        let state = HashState::default();
        let mut table: FlatTable<Item> = FlatTable::with_capacity(8);
        let hash = hash_key(&state, 1);
        table
            .entry(hash, |v| v.key == 1)
            .or_insert(Item { key: 1, value: 1 });

        let miss = hash_key(&state, 2);
        assert_eq!(table.remove(miss, |v| v.key == 2), None);
        assert_eq!(table.len(), 1);

        assert!(table.remove(hash, |v| v.key == 1).is_some());
        assert_eq!(table.remove(hash, |v| v.key == 1), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn load_factor_never_exceeds_seven_eighths() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(1);
        for k in 0..10_000u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);

            assert!(table.len() * 8 <= table.capacity() * 7);
            assert!(table.capacity().is_power_of_two());
        }
        assert_eq!(table.len(), 10_000);
    }

    #[test]
    fn grow_triggers_at_seven_eighths() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(1024);
        for k in 0..896u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }
        // 896 / 1024 is exactly 0.875, still within bounds.
        assert_eq!(table.capacity(), 1024);

        let hash = hash_key(&state, 896);
        table.entry(hash, |v| *v == 896).or_insert(896);
        assert_eq!(table.capacity(), 2048);
        assert_eq!(table.len(), 897);
    }

    #[test]
    fn grow_preserves_membership() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(64);
        let mut k = 0u64;
        while table.len() * 8 < table.capacity() * 7 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
            k += 1;
        }

        let mut before: Vec<u64> = table.iter().copied().collect();
        before.sort_unstable();
        let capacity_before = table.capacity();

        // The next insertion crosses the threshold and grows the table.
        let hash = hash_key(&state, k);
        table.entry(hash, |v| *v == k).or_insert(k);
        assert_eq!(table.capacity(), capacity_before * 2);

        let mut after: Vec<u64> = table.iter().copied().collect();
        after.sort_unstable();
        before.push(k);
        before.sort_unstable();
        assert_eq!(before, after);

        for v in &after {
            let hash = hash_key(&state, *v);
            assert!(table.find(hash, |x| x == v).is_some());
        }
    }

    #[test]
    fn grow_purges_tombstones() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);

        for k in 0..7u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }
        assert_eq!(table.capacity(), 8);

        for k in 0..7u64 {
            let hash = hash_key(&state, k);
            table.remove(hash, |v| *v == k);
        }
        assert_eq!(tombstones(&table), 7);
        assert_eq!(table.len(), 0);

        for k in 10..18u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }
        assert_eq!(table.capacity(), 16);
        assert_eq!(tombstones(&table), 0);
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn tombstones_count_toward_growth_trigger() {
        // Direct-mapped hashes: fill slots 0..=6 of an 8-slot table, then
        // erase everything. The occupied count is back to zero but seven
        // slots are tombstones and only one is empty.
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in 0..7u64 {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        for k in 0..7u64 {
            assert_eq!(table.remove(k, |v| *v == k), Some(k));
        }
        assert_eq!(tombstones(&table), 7);
        assert_eq!(table.tombstones, 7);
        assert_eq!(empties(&table), 1);

        // An insertion aimed at the last empty slot must grow the table
        // rather than consume it; without an empty slot left, every probe
        // walk would wrap forever.
        table.entry(7, |v| *v == 100).or_insert(100);
        assert_eq!(table.capacity(), 16);
        assert_eq!(tombstones(&table), 0);
        assert!(empties(&table) > 0);
        assert!(table.find(0, |v| *v == 999).is_none());
    }

    #[test]
    fn erase_heavy_churn_keeps_empty_slots() {
        // Insert-then-erase churn on one probe chain never shrinks the
        // occupied count, yet must never exhaust the empty slots either.
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in 0..1_000u64 {
            table.entry(k & 3, |v| *v == k).or_insert(k);
            assert!(empties(&table) > 0);
            assert!(empties(&table) * 8 >= table.capacity());

            assert_eq!(table.remove(k & 3, |v| *v == k), Some(k));
            assert!(empties(&table) > 0);

            // A miss lookup terminates only by reaching an empty slot.
            assert!(table.find(k & 3, |v| *v == u64::MAX).is_none());
            assert_eq!(table.tombstones, tombstones(&table));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn clear_preserves_capacity() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in 0..100u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }
        let capacity = table.capacity();
        table.remove(hash_key(&state, 0), |v| *v == 0);

        table.clear();
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert_eq!(tombstones(&table), 0);
        assert!(table.slots.iter().all(|s| matches!(s, Slot::Empty)));
    }

    #[test]
    fn iter_yields_every_value_once() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(0);
        for k in 0..500u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }

        let mut seen: Vec<u64> = table.iter().copied().collect();
        assert_eq!(seen.len(), table.len());
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 500);
    }

    #[test]
    fn iter_mut_writes_through() {
        let state = HashState::default();
        let mut table: FlatTable<Item> = FlatTable::with_capacity(16);
        for k in 0..10u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| v.key == k).or_insert(Item {
                key: k,
                value: k as i32,
            });
        }

        for item in table.iter_mut() {
            item.value *= 2;
        }

        for k in 0..10u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k).unwrap().value, k as i32 * 2);
        }
    }

    #[test]
    fn find_iter_positions_at_match() {
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        for k in [1u64, 2, 3] {
            table.entry(0, |v| *v == k).or_insert(k);
        }

        let mut iter = table.find_iter(0, |v| *v == 2);
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.next(), None);

        let mut end = table.find_iter(0, |v| *v == 42);
        assert_eq!(end.next(), None);
    }

    #[test]
    fn drain_empties_the_table() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(16);
        for k in 0..10u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }

        let mut drained: Vec<u64> = table.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(table.is_empty());
    }

    #[test]
    fn dropping_partial_drain_still_empties() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(16);
        for k in 0..10u64 {
            let hash = hash_key(&state, k);
            table.entry(hash, |v| *v == k).or_insert(k);
        }

        {
            let mut drain = table.drain();
            drain.next();
            drain.next();
        }
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn clone_is_independent() {
        let state = HashState::default();
        let mut original: FlatTable<String> = FlatTable::with_capacity(8);
        let hash = hash_key(&state, 1);
        original
            .entry(hash, |v: &String| v == "one")
            .or_insert("one".to_string());

        let cloned = original.clone();
        if let Some(v) = original.find_mut(hash, |v| v == "one") {
            v.push_str("!");
        }

        assert_eq!(original.find(hash, |v| v == "one!"), Some(&"one!".to_string()));
        assert_eq!(cloned.find(hash, |v| v == "one"), Some(&"one".to_string()));
    }

    #[test]
    fn entry_remove_leaves_tombstone() {
        let state = HashState::default();
        let mut table: FlatTable<u64> = FlatTable::with_capacity(8);
        let hash = hash_key(&state, 5);
        table.entry(hash, |v| *v == 5).or_insert(5);

        match table.entry(hash, |v| *v == 5) {
            Entry::Occupied(entry) => assert_eq!(entry.remove(), 5),
            Entry::Vacant(_) => panic!("expected occupied entry"),
        }
        assert_eq!(table.len(), 0);
        assert_eq!(tombstones(&table), 1);
    }
}
