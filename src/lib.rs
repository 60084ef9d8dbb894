#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// The keyed map built on the open-addressing table.
///
/// This module provides `FlatHashMap`, which wraps the `FlatTable` with a
/// standard key-value interface, a configurable hasher, and the `Entry` API.
pub mod map;

/// The core open-addressing table.
///
/// This module provides `FlatTable`, the hash-and-predicate driven slot
/// array that implements probing, tombstone deletion, and doubling growth.
pub mod table;

pub use map::Entry;
pub use map::FlatHashMap;
pub use map::KeyNotFound;
pub use table::FlatTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The default [`BuildHasher`](core::hash::BuildHasher) used by
        /// [`FlatHashMap`], provided by the `foldhash` crate.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else {
        /// A placeholder hasher builder used when the `foldhash` feature is
        /// disabled.
        ///
        /// This type is uninhabited; construct maps with
        /// [`FlatHashMap::with_hasher`] or
        /// [`FlatHashMap::with_capacity_and_hasher`] instead.
        pub enum DefaultHashBuilder {}
    }
}
