//! MPACK Core Codec
//!
//! Streaming, zone-backed MessagePack codec. The unpacker is incremental
//! and resumable: feed bytes as they arrive, get back complete values as
//! they finish, never block and never hold parse state on the call stack.
//!
//! # Architecture
//!
//! - **format.rs** - Leading-byte format-family classification
//! - **value.rs** - Value model and zone-resolved views
//! - **zone.rs** - Arena owning payloads, container slots, finalizers
//! - **limits.rs** - Size/depth ceilings for untrusted input
//! - **policy.rs** - Zero-copy vs copy decisions for payloads
//! - **visit.rs** - SAX-style visitor front end (no allocation)
//! - **unpack.rs** - Streaming sessions and one-shot unpacking
//! - **pack.rs** - The producer half
//!
//! # Quick start
//!
//! ```
//! use mpack_core::{unpack, Packer, UnpackLimits, ValueView, Zone};
//!
//! let mut p = Packer::new();
//! p.array_header(2);
//! p.uint(42);
//! p.str("hi");
//!
//! let mut zone = Zone::new();
//! let (root, consumed) = unpack(p.as_slice(), &mut zone, &UnpackLimits::default()).unwrap();
//! assert_eq!(consumed, p.len());
//!
//! let view = ValueView::new(&zone, None, root);
//! assert_eq!(view.get(0).unwrap().as_u64(), Some(42));
//! assert_eq!(view.get(1).unwrap().as_str(), Some("hi"));
//! ```

mod buffer;
mod parse;

pub mod error;
pub mod format;
pub mod limits;
pub mod pack;
pub mod policy;
pub mod unpack;
pub mod value;
pub mod visit;
pub mod zone;

pub use error::{PackError, UnpackError};
pub use format::Family;
pub use limits::{LimitCategory, UnpackLimits};
pub use pack::Packer;
pub use policy::{AlwaysCopy, PayloadKind, ReferencePolicy, SizeThreshold};
pub use unpack::{unpack, unpack_with_policy, Unpacked, Unpacker};
pub use value::{KeyValuePair, PayloadRef, Value, ValueKind, ValueView};
pub use visit::{parse_with_visitor, VisitOutcome, Visitor};
pub use zone::{BytesRef, PairsRef, ValuesRef, Zone};
