//! Streaming unpacker sessions and one-shot unpacking.
//!
//! The usual loop:
//!
//! ```
//! use mpack_core::Unpacker;
//!
//! let mut unp = Unpacker::new();
//! # let mut chunks: Vec<Vec<u8>> = vec![vec![0xc0], vec![0x92, 0x2a]];
//! # let mut next_chunk = || chunks.pop();
//! while let Some(chunk) = next_chunk() {
//!     unp.reserve(chunk.len());
//!     unp.write_target()[..chunk.len()].copy_from_slice(&chunk);
//!     unp.commit(chunk.len());
//!
//!     while let Some(unpacked) = unp.try_next().expect("valid input") {
//!         println!("{:?}", unpacked.get());
//!     }
//! }
//! ```
//!
//! Each produced value arrives as an [`Unpacked`]: the root [`Value`]
//! together with the [`Zone`] that owns its payloads, so the value can
//! outlive the session. The session installs a fresh zone and keeps going.

use log::debug;

use crate::buffer::{InputBuffer, INIT_BUFFER_SIZE};
use crate::error::UnpackError;
use crate::limits::UnpackLimits;
use crate::parse::{Engine, RawKind, Sink, Status};
use crate::policy::{AlwaysCopy, PayloadKind, ReferencePolicy};
use crate::value::{PayloadRef, Value, ValueView};
use crate::zone::{PairsRef, ValuesRef, Zone, ZONE_CHUNK_SIZE};

impl From<RawKind> for PayloadKind {
    fn from(kind: RawKind) -> PayloadKind {
        match kind {
            RawKind::Str => PayloadKind::Str,
            RawKind::Bin => PayloadKind::Bin,
            RawKind::Ext => PayloadKind::Ext,
        }
    }
}

// ============================================================================
// Tree builder (the sink that materializes values into a zone)
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum BuildFrame {
    Array { slots: ValuesRef, filled: u32 },
    Map { slots: PairsRef, filled: u32 },
}

/// Builder state that survives suspension between `try_next` calls.
#[derive(Debug, Default)]
struct BuildState {
    stack: Vec<BuildFrame>,
    /// The most recently completed value, pending attachment.
    last: Option<Value>,
    /// Set when any payload aliased the input buffer.
    referenced: bool,
}

impl BuildState {
    fn reset(&mut self) {
        self.stack.clear();
        self.last = None;
        self.referenced = false;
    }
}

/// Per-run view tying the persistent [`BuildState`] to the session's zone
/// and policy.
struct BuilderSink<'a> {
    state: &'a mut BuildState,
    zone: &'a mut Zone,
    policy: &'a mut dyn ReferencePolicy,
}

impl BuilderSink<'_> {
    fn emit(&mut self, v: Value) -> bool {
        self.state.last = Some(v);
        true
    }

    fn take_last(&mut self) -> Value {
        self.state.last.take().expect("engine delivers a value before each attach")
    }
}

impl Sink for BuilderSink<'_> {
    fn nil(&mut self) -> bool {
        self.emit(Value::Nil)
    }

    fn boolean(&mut self, v: bool) -> bool {
        self.emit(Value::Bool(v))
    }

    fn uint(&mut self, v: u64) -> bool {
        self.emit(Value::Uint(v))
    }

    fn int(&mut self, v: i64) -> bool {
        self.emit(Value::Int(v))
    }

    fn f32(&mut self, v: f32) -> bool {
        self.emit(Value::F32(v))
    }

    fn f64(&mut self, v: f64) -> bool {
        self.emit(Value::F64(v))
    }

    fn raw(&mut self, kind: RawKind, bytes: &[u8], offset: u64) -> bool {
        let (tag, data, data_offset) = match kind {
            RawKind::Ext => (bytes[0] as i8, &bytes[1..], offset + 1),
            _ => (0, bytes, offset),
        };
        let payload = if self.policy.should_reference(kind.into(), data.len()) {
            self.state.referenced = true;
            PayloadRef::Input { offset: data_offset, len: data.len() as u32 }
        } else {
            PayloadRef::Zone(self.zone.alloc_bytes(data))
        };
        self.emit(match kind {
            RawKind::Str => Value::Str(payload),
            RawKind::Bin => Value::Bin(payload),
            RawKind::Ext => Value::Ext { tag, data: payload },
        })
    }

    fn start_array(&mut self, len: u32) -> bool {
        let slots = self.zone.alloc_values(len as usize);
        self.state.stack.push(BuildFrame::Array { slots, filled: 0 });
        true
    }

    fn end_array_item(&mut self) -> bool {
        let v = self.take_last();
        if let Some(BuildFrame::Array { slots, filled }) = self.state.stack.last_mut() {
            self.zone.values_mut(*slots).expect("own slots")[*filled as usize] = v;
            *filled += 1;
        }
        true
    }

    fn end_array(&mut self) -> bool {
        if let Some(BuildFrame::Array { slots, .. }) = self.state.stack.pop() {
            self.state.last = Some(Value::Array(slots));
        }
        true
    }

    fn start_map(&mut self, len: u32) -> bool {
        let slots = self.zone.alloc_pairs(len as usize);
        self.state.stack.push(BuildFrame::Map { slots, filled: 0 });
        true
    }

    fn end_map_key(&mut self) -> bool {
        let k = self.take_last();
        if let Some(BuildFrame::Map { slots, filled }) = self.state.stack.last_mut() {
            self.zone.pairs_mut(*slots).expect("own slots")[*filled as usize].key = k;
        }
        true
    }

    fn end_map_value(&mut self) -> bool {
        let v = self.take_last();
        if let Some(BuildFrame::Map { slots, filled }) = self.state.stack.last_mut() {
            self.zone.pairs_mut(*slots).expect("own slots")[*filled as usize].val = v;
            *filled += 1;
        }
        true
    }

    fn end_map(&mut self) -> bool {
        if let Some(BuildFrame::Map { slots, .. }) = self.state.stack.pop() {
            self.state.last = Some(Value::Map(slots));
        }
        true
    }
}

// ============================================================================
// Unpacked - one value plus the zone that owns it
// ============================================================================

/// One complete top-level value and the [`Zone`] owning its payloads,
/// handed off from a session so the value can outlive it.
#[derive(Debug)]
pub struct Unpacked {
    zone: Zone,
    root: Value,
}

impl Unpacked {
    pub(crate) fn new(zone: Zone, root: Value) -> Self {
        Unpacked { zone, root }
    }

    /// The root value as a resolved view.
    ///
    /// Zero-copy payloads (if the session's reference policy produced any)
    /// need the input bytes to resolve; see
    /// [`Unpacker::view`] or [`ValueView::new`].
    pub fn get(&self) -> ValueView<'_> {
        ValueView::new(&self.zone, None, self.root)
    }

    /// The raw root value.
    pub fn root(&self) -> Value {
        self.root
    }

    /// The owning zone.
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Mutable access to the owning zone, e.g. to register finalizers or
    /// migrate it into another zone.
    pub fn zone_mut(&mut self) -> &mut Zone {
        &mut self.zone
    }

    /// Take the zone and root apart.
    pub fn into_parts(self) -> (Zone, Value) {
        (self.zone, self.root)
    }
}

// ============================================================================
// Unpacker - the streaming session
// ============================================================================

/// A long-lived streaming unpack session: an owned input buffer, the
/// resumable parse state, and the zone values are currently being built
/// into.
///
/// Feed bytes with [`reserve`](Unpacker::reserve) /
/// [`write_target`](Unpacker::write_target) / [`commit`](Unpacker::commit)
/// (or [`feed`](Unpacker::feed)), then call
/// [`try_next`](Unpacker::try_next) until it reports that more input is
/// needed.
///
/// After `try_next` returns an error the session is poisoned: the stream
/// position is no longer trustworthy, and every further `try_next` repeats
/// the same error until [`reset`](Unpacker::reset).
pub struct Unpacker {
    buffer: InputBuffer,
    engine: Engine,
    build: BuildState,
    zone: Zone,
    limits: UnpackLimits,
    policy: Box<dyn ReferencePolicy>,
    zone_chunk_size: usize,
    poisoned: Option<UnpackError>,
}

impl Unpacker {
    /// Session with default buffer size and permissive limits.
    pub fn new() -> Self {
        Unpacker::with_limits(UnpackLimits::default())
    }

    /// Session with the given limits.
    pub fn with_limits(limits: UnpackLimits) -> Self {
        Unpacker::with_config(INIT_BUFFER_SIZE, ZONE_CHUNK_SIZE, limits)
    }

    /// Fully configured session: initial input-buffer capacity, initial
    /// zone chunk size, and limits.
    pub fn with_config(buffer_size: usize, zone_chunk_size: usize, limits: UnpackLimits) -> Self {
        Unpacker {
            buffer: InputBuffer::with_capacity(buffer_size),
            engine: Engine::new(),
            build: BuildState::default(),
            zone: Zone::with_chunk_size(zone_chunk_size),
            limits,
            policy: Box::new(AlwaysCopy),
            zone_chunk_size,
            poisoned: None,
        }
    }

    /// Replace the reference policy for subsequent payloads.
    pub fn set_reference_policy(&mut self, policy: Box<dyn ReferencePolicy>) {
        self.policy = policy;
    }

    /// Ensure at least `n` writable bytes at the buffer tail.
    pub fn reserve(&mut self, n: usize) {
        self.buffer.reserve(n);
    }

    /// The writable tail; fill a prefix, then [`commit`](Unpacker::commit).
    pub fn write_target(&mut self) -> &mut [u8] {
        self.buffer.write_target()
    }

    /// Publish `n` bytes written into [`write_target`](Unpacker::write_target).
    pub fn commit(&mut self, n: usize) {
        self.buffer.commit(n);
    }

    /// Copy a chunk in (reserve + write + commit).
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.feed(bytes);
    }

    /// Try to produce one complete top-level value.
    ///
    /// - `Ok(Some(_))`: a value and its zone; the session keeps any
    ///   remaining bytes and can produce further values.
    /// - `Ok(None)`: more input is needed; parse progress is retained.
    /// - `Err(_)`: the stream is malformed or over a limit; the session is
    ///   poisoned until [`reset`](Unpacker::reset).
    pub fn try_next(&mut self) -> Result<Option<Unpacked>, UnpackError> {
        if let Some(e) = self.poisoned {
            return Err(e);
        }

        let (consumed, status) = {
            let mut sink = BuilderSink {
                state: &mut self.build,
                zone: &mut self.zone,
                policy: &mut *self.policy,
            };
            self.engine.run(self.buffer.pending(), self.buffer.cursor_offset(), &self.limits, &mut sink)
        };
        self.buffer.advance(consumed);
        if self.build.referenced {
            self.buffer.set_referenced(true);
        }

        match status {
            Status::Suspended => Ok(None),
            Status::Complete => {
                let root = self.build.last.take().expect("complete parse produces a root");
                let zone = std::mem::replace(&mut self.zone, Zone::with_chunk_size(self.zone_chunk_size));
                self.build.reset();
                self.engine.reset();
                Ok(Some(Unpacked::new(zone, root)))
            }
            Status::Failed(e) => {
                debug!("unpacker poisoned: {}", e);
                self.poisoned = Some(e);
                Err(e)
            }
            Status::Stopped => unreachable!("tree builder never aborts"),
        }
    }

    /// Total bytes consumed from the stream so far.
    pub fn parsed_size(&self) -> u64 {
        self.buffer.cursor_offset()
    }

    /// Committed bytes not yet consumed by parsing.
    pub fn pending_len(&self) -> usize {
        self.buffer.pending_len()
    }

    /// Reclaim consumed buffer space now.
    ///
    /// A no-op while zero-copy references pin the buffer; returns whether
    /// anything was reclaimed.
    pub fn compact(&mut self) -> bool {
        self.buffer.compact()
    }

    /// Whether zero-copy references currently pin the input buffer.
    pub fn buffer_referenced(&self) -> bool {
        self.buffer.referenced()
    }

    /// Declare all zero-copy references dead, unpinning the buffer.
    ///
    /// After this, resolving a previously issued `Input` payload may
    /// return `None` once the bytes are reclaimed.
    pub fn release_references(&mut self) {
        self.buffer.set_referenced(false);
    }

    /// Resolve a zero-copy payload range against the retained input.
    pub fn input_bytes(&self, offset: u64, len: u32) -> Option<&[u8]> {
        self.buffer.resolve(offset, len)
    }

    /// View a produced value with zero-copy payloads resolved against this
    /// session's retained input.
    pub fn view<'a>(&'a self, unpacked: &'a Unpacked) -> ValueView<'a> {
        let (base, window) = self.buffer.retained();
        ValueView::with_window(unpacked.zone(), base, window, unpacked.root())
    }

    /// Abandon the current parse attempt and clear any poisoning.
    ///
    /// Keeps unconsumed buffered bytes (parsing resumes at the cursor);
    /// the half-built zone is cleared.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.build.reset();
        self.zone.clear();
        self.poisoned = None;
    }

    /// Drop committed-but-unparsed bytes, e.g. to resynchronize after an
    /// error when the surrounding protocol says the rest is garbage.
    pub fn discard_pending(&mut self) {
        self.buffer.discard_pending();
    }
}

impl Default for Unpacker {
    fn default() -> Self {
        Unpacker::new()
    }
}

// ============================================================================
// One-shot unpacking over a fixed byte range
// ============================================================================

/// Unpack one value from `data` into `zone`.
///
/// Returns the root value and the number of bytes consumed; trailing bytes
/// are the caller's to deal with. Truncated input is
/// [`UnpackError::Insufficient`].
pub fn unpack(
    data: &[u8],
    zone: &mut Zone,
    limits: &UnpackLimits,
) -> Result<(Value, usize), UnpackError> {
    unpack_with_policy(data, zone, limits, &mut AlwaysCopy)
}

/// [`unpack`] with an explicit reference policy. Zero-copy payloads hold
/// offsets into `data`; resolve them with
/// [`ValueView::new`]`(zone, Some(data), value)`.
pub fn unpack_with_policy(
    data: &[u8],
    zone: &mut Zone,
    limits: &UnpackLimits,
    policy: &mut dyn ReferencePolicy,
) -> Result<(Value, usize), UnpackError> {
    let mut engine = Engine::new();
    let mut state = BuildState::default();
    let mut sink = BuilderSink { state: &mut state, zone, policy };
    let (consumed, status) = engine.run(data, 0, limits, &mut sink);
    match status {
        Status::Complete => {
            let root = state.last.take().expect("complete parse produces a root");
            Ok((root, consumed))
        }
        Status::Suspended => Err(UnpackError::Insufficient),
        Status::Failed(e) => Err(e),
        Status::Stopped => unreachable!("tree builder never aborts"),
    }
}
