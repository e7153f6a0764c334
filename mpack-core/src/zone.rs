//! Zone: the arena owning every variably-sized parse result.
//!
//! One zone owns three chunked stores - payload bytes, array element slots,
//! map pair slots - plus a list of deferred finalizers. Everything a parse
//! produces lives in its zone, and handles into a zone ([`BytesRef`],
//! [`ValuesRef`], [`PairsRef`]) stay valid for the zone's whole lifetime,
//! including across [`Zone::migrate`].
//!
//! Handles are chunk-id + offset pairs, not pointers, so chunk storage can
//! move between zones without invalidating anything. Chunk ids are drawn
//! from a process-wide counter; resolving a handle against a zone that does
//! not hold its chunk returns `None` rather than aliasing foreign memory.
//!
//! # Growth
//!
//! Fresh chunks double in capacity starting from the configured initial
//! size; a request larger than the next doubling gets its own exactly-sized
//! chunk. `migrate` splices chunk lists and never touches payload bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::value::{KeyValuePair, Value};

/// Default capacity of a zone's first chunk, in items.
pub const ZONE_CHUNK_SIZE: usize = 8 * 1024;

/// Process-unique identifier of one storage chunk.
///
/// Id `0` is reserved for the empty handle and never allocated.
pub type ChunkId = u64;

static NEXT_CHUNK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a byte payload copied into a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytesRef {
    pub(crate) chunk: ChunkId,
    pub(crate) start: u32,
    pub(crate) len: u32,
}

impl BytesRef {
    /// The empty payload; resolves to `&[]` against any zone.
    pub const EMPTY: BytesRef = BytesRef { chunk: 0, start: 0, len: 0 };

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Handle to a run of array element slots in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuesRef {
    pub(crate) chunk: ChunkId,
    pub(crate) start: u32,
    pub(crate) len: u32,
}

impl ValuesRef {
    /// Element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the range is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Handle to a run of map key/value slots in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairsRef {
    pub(crate) chunk: ChunkId,
    pub(crate) start: u32,
    pub(crate) len: u32,
}

impl PairsRef {
    /// Pair count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the range is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct Chunk<T> {
    id: ChunkId,
    items: Vec<T>,
}

/// One chunked, migratable store of items.
struct Store<T> {
    chunks: Vec<Chunk<T>>,
    index: HashMap<ChunkId, usize>,
    /// Capacity of the next fresh chunk.
    next_capacity: usize,
    initial_capacity: usize,
}

impl<T> Store<T> {
    fn new(initial_capacity: usize) -> Self {
        Store {
            chunks: Vec::new(),
            index: HashMap::new(),
            next_capacity: initial_capacity.max(1),
            initial_capacity: initial_capacity.max(1),
        }
    }

    fn push_chunk(&mut self, need: usize) {
        // Handles address into a chunk with u32 offsets, so doubling stops
        // at 1 GiB per chunk; oversized requests still get an exact chunk.
        let capacity = if need > self.next_capacity {
            need
        } else {
            let c = self.next_capacity;
            self.next_capacity = self.next_capacity.saturating_mul(2).min(1 << 30);
            c
        };
        let id = NEXT_CHUNK_ID.fetch_add(1, Ordering::Relaxed);
        trace!("zone: new chunk id={} capacity={}", id, capacity);
        self.index.insert(id, self.chunks.len());
        self.chunks.push(Chunk { id, items: Vec::with_capacity(capacity) });
    }

    fn ensure_room(&mut self, n: usize) -> &mut Chunk<T> {
        let needs_new = match self.chunks.last() {
            Some(c) => c.items.capacity() - c.items.len() < n,
            None => true,
        };
        if needs_new {
            self.push_chunk(n);
        }
        self.chunks.last_mut().expect("chunk list is non-empty after push")
    }

    fn alloc_from_slice(&mut self, data: &[T]) -> (ChunkId, u32)
    where
        T: Clone,
    {
        if data.is_empty() {
            return (0, 0);
        }
        let chunk = self.ensure_room(data.len());
        let start = chunk.items.len() as u32;
        chunk.items.extend_from_slice(data);
        (chunk.id, start)
    }

    fn alloc_filled(&mut self, n: usize) -> (ChunkId, u32)
    where
        T: Clone + Default,
    {
        if n == 0 {
            return (0, 0);
        }
        let chunk = self.ensure_room(n);
        let start = chunk.items.len() as u32;
        chunk.items.resize(chunk.items.len() + n, T::default());
        (chunk.id, start)
    }

    fn get(&self, chunk: ChunkId, start: u32, len: u32) -> Option<&[T]> {
        if len == 0 {
            return Some(&[]);
        }
        let &pos = self.index.get(&chunk)?;
        self.chunks[pos].items.get(start as usize..start as usize + len as usize)
    }

    fn get_mut(&mut self, chunk: ChunkId, start: u32, len: u32) -> Option<&mut [T]> {
        if len == 0 {
            return Some(&mut []);
        }
        let &pos = self.index.get(&chunk)?;
        self.chunks[pos].items.get_mut(start as usize..start as usize + len as usize)
    }

    fn migrate_from(&mut self, other: &mut Store<T>) {
        for chunk in other.chunks.drain(..) {
            self.index.insert(chunk.id, self.chunks.len());
            self.chunks.push(chunk);
        }
        other.index.clear();
        other.next_capacity = other.initial_capacity;
    }

    fn clear(&mut self) {
        self.chunks.clear();
        self.index.clear();
        self.next_capacity = self.initial_capacity;
    }
}

type Finalizer = Box<dyn FnOnce() + Send>;

/// Arena owning the results of one parse (or several, via reuse/migrate).
///
/// A zone has a single exclusive owner and no reference counting: values
/// resolved against it are only meaningful while it is alive, and dropping
/// (or clearing) it releases every chunk and runs the registered finalizers
/// in reverse registration order.
pub struct Zone {
    bytes: Store<u8>,
    values: Store<Value>,
    pairs: Store<KeyValuePair>,
    finalizers: Vec<Finalizer>,
}

impl Zone {
    /// Create a zone with the default initial chunk size.
    pub fn new() -> Self {
        Zone::with_chunk_size(ZONE_CHUNK_SIZE)
    }

    /// Create a zone whose first chunk in each store holds `chunk_size`
    /// items; subsequent chunks double from there.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Zone {
            bytes: Store::new(chunk_size),
            // Slot stores start smaller: most documents have far fewer
            // container slots than payload bytes.
            values: Store::new((chunk_size / 16).max(8)),
            pairs: Store::new((chunk_size / 16).max(8)),
            finalizers: Vec::new(),
        }
    }

    /// Copy a byte payload into the zone.
    pub fn alloc_bytes(&mut self, data: &[u8]) -> BytesRef {
        let (chunk, start) = self.bytes.alloc_from_slice(data);
        BytesRef { chunk, start, len: data.len() as u32 }
    }

    /// Allocate `n` nil-initialized array element slots.
    pub(crate) fn alloc_values(&mut self, n: usize) -> ValuesRef {
        let (chunk, start) = self.values.alloc_filled(n);
        ValuesRef { chunk, start, len: n as u32 }
    }

    /// Allocate `n` nil-initialized key/value pair slots.
    pub(crate) fn alloc_pairs(&mut self, n: usize) -> PairsRef {
        let (chunk, start) = self.pairs.alloc_filled(n);
        PairsRef { chunk, start, len: n as u32 }
    }

    /// Resolve a byte payload handle. `None` if the handle was not issued
    /// by this zone (or migrated into it).
    pub fn bytes(&self, r: BytesRef) -> Option<&[u8]> {
        self.bytes.get(r.chunk, r.start, r.len)
    }

    /// Resolve an array slot handle.
    pub fn values(&self, r: ValuesRef) -> Option<&[Value]> {
        self.values.get(r.chunk, r.start, r.len)
    }

    /// Resolve a pair slot handle.
    pub fn pairs(&self, r: PairsRef) -> Option<&[KeyValuePair]> {
        self.pairs.get(r.chunk, r.start, r.len)
    }

    pub(crate) fn values_mut(&mut self, r: ValuesRef) -> Option<&mut [Value]> {
        self.values.get_mut(r.chunk, r.start, r.len)
    }

    pub(crate) fn pairs_mut(&mut self, r: PairsRef) -> Option<&mut [KeyValuePair]> {
        self.pairs.get_mut(r.chunk, r.start, r.len)
    }

    /// Register a callback run when the zone is cleared or dropped.
    /// Finalizers run in reverse registration order.
    pub fn push_finalizer(&mut self, f: impl FnOnce() + Send + 'static) {
        self.finalizers.push(Box::new(f));
    }

    /// Move every chunk and finalizer out of `other` into `self`.
    ///
    /// Handles issued by `other` resolve against `self` afterwards; no
    /// payload bytes are copied. `other` is left valid and empty, ready
    /// for reuse.
    pub fn migrate(&mut self, other: &mut Zone) {
        self.bytes.migrate_from(&mut other.bytes);
        self.values.migrate_from(&mut other.values);
        self.pairs.migrate_from(&mut other.pairs);
        self.finalizers.append(&mut other.finalizers);
    }

    /// Run finalizers (reverse order) and release all chunks.
    pub fn clear(&mut self) {
        self.run_finalizers();
        self.bytes.clear();
        self.values.clear();
        self.pairs.clear();
    }

    fn run_finalizers(&mut self) {
        while let Some(f) = self.finalizers.pop() {
            f();
        }
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::new()
    }
}

impl Drop for Zone {
    fn drop(&mut self) {
        self.run_finalizers();
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("byte_chunks", &self.bytes.chunks.len())
            .field("value_chunks", &self.values.chunks.len())
            .field("pair_chunks", &self.pairs.chunks.len())
            .field("finalizers", &self.finalizers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn alloc_and_resolve_bytes() {
        let mut zone = Zone::new();
        let r = zone.alloc_bytes(b"hello world");
        assert_eq!(zone.bytes(r), Some(b"hello world".as_slice()));
        assert_eq!(r.len(), 11);

        let empty = zone.alloc_bytes(b"");
        assert!(empty.is_empty());
        assert_eq!(zone.bytes(empty), Some(b"".as_slice()));
    }

    #[test]
    fn foreign_handle_does_not_resolve() {
        let mut a = Zone::new();
        let b = Zone::new();
        let r = a.alloc_bytes(b"abc");
        assert_eq!(b.bytes(r), None);
    }

    #[test]
    fn oversized_request_gets_own_chunk() {
        let mut zone = Zone::with_chunk_size(16);
        let small = zone.alloc_bytes(&[1u8; 8]);
        let big = zone.alloc_bytes(&[2u8; 1000]);
        assert_eq!(zone.bytes(small).map(<[u8]>::len), Some(8));
        assert_eq!(zone.bytes(big).map(<[u8]>::len), Some(1000));
        assert_ne!(small.chunk, big.chunk);
    }

    #[test]
    fn value_slots_default_to_nil() {
        let mut zone = Zone::new();
        let r = zone.alloc_values(3);
        assert_eq!(zone.values(r), Some([Value::Nil; 3].as_slice()));
        zone.values_mut(r).expect("own handle")[1] = Value::Uint(7);
        assert_eq!(zone.values(r).expect("own handle")[1], Value::Uint(7));
    }

    #[test]
    fn finalizers_run_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut zone = Zone::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            zone.push_finalizer(move || order.lock().expect("not poisoned").push(i));
        }
        zone.clear();
        assert_eq!(*order.lock().expect("not poisoned"), vec![2, 1, 0]);

        // clear drained them; drop must not run them again
        drop(zone);
        assert_eq!(order.lock().expect("not poisoned").len(), 3);
    }

    #[test]
    fn finalizers_run_on_drop() {
        let ran = Arc::new(Mutex::new(false));
        {
            let ran = Arc::clone(&ran);
            let mut zone = Zone::new();
            zone.push_finalizer(move || *ran.lock().expect("not poisoned") = true);
        }
        assert!(*ran.lock().expect("not poisoned"));
    }

    #[test]
    fn migrate_keeps_handles_valid() {
        let mut target = Zone::new();
        let mut donor = Zone::new();
        let kept = target.alloc_bytes(b"kept");
        let moved = donor.alloc_bytes(b"moved");

        target.migrate(&mut donor);

        assert_eq!(target.bytes(kept), Some(b"kept".as_slice()));
        assert_eq!(target.bytes(moved), Some(b"moved".as_slice()));
        // donor is empty but reusable
        assert_eq!(donor.bytes(moved), None);
        let fresh = donor.alloc_bytes(b"fresh");
        assert_eq!(donor.bytes(fresh), Some(b"fresh".as_slice()));
    }

    #[test]
    fn migrate_carries_finalizers() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut target = Zone::new();
        let mut donor = Zone::new();
        {
            let order = Arc::clone(&order);
            target.push_finalizer(move || order.lock().expect("not poisoned").push("target"));
        }
        {
            let order = Arc::clone(&order);
            donor.push_finalizer(move || order.lock().expect("not poisoned").push("donor"));
        }
        target.migrate(&mut donor);
        drop(donor);
        assert!(order.lock().expect("not poisoned").is_empty());
        drop(target);
        assert_eq!(*order.lock().expect("not poisoned"), vec!["donor", "target"]);
    }

    #[test]
    fn clear_allows_reuse() {
        let mut zone = Zone::new();
        let old = zone.alloc_bytes(b"before");
        zone.clear();
        assert_eq!(zone.bytes(old), None);
        let new = zone.alloc_bytes(b"after");
        assert_eq!(zone.bytes(new), Some(b"after".as_slice()));
    }
}
