//! SAX-style visitor dispatch.
//!
//! The alternate front end to the parse engine: instead of materializing a
//! value tree, each completed leaf and container boundary becomes one call
//! on a caller-supplied [`Visitor`]. Nothing is allocated, which makes this
//! the right entry point for streaming transforms and filters.
//!
//! Every `bool`-returning method defaults to a no-op `true`; implement only
//! what you care about. Returning `false` aborts the parse immediately and
//! distinguishably: the driver reports [`VisitOutcome::Stopped`] rather
//! than an error.
//!
//! ## Event sequences
//!
//! `[1, "a"]` visits as:
//! ```text
//! start_array(2)
//! visit_positive_integer(1)
//! end_array_item()
//! visit_str(b"a")
//! end_array_item()
//! end_array()
//! ```
//!
//! `{"k": 1}` visits as:
//! ```text
//! start_map(1)
//! visit_str(b"k")
//! end_map_key()
//! visit_positive_integer(1)
//! end_map_value()
//! end_map()
//! ```

use crate::error::UnpackError;
use crate::limits::UnpackLimits;
use crate::parse::{Engine, RawKind, Sink, Status};

/// Callbacks driven by the parse engine. All default to accepting no-ops.
pub trait Visitor {
    fn visit_nil(&mut self) -> bool {
        true
    }
    fn visit_boolean(&mut self, _v: bool) -> bool {
        true
    }
    fn visit_positive_integer(&mut self, _v: u64) -> bool {
        true
    }
    fn visit_negative_integer(&mut self, _v: i64) -> bool {
        true
    }
    fn visit_float32(&mut self, _v: f32) -> bool {
        true
    }
    fn visit_float64(&mut self, _v: f64) -> bool {
        true
    }
    /// String payload; bytes borrow from the caller's input range.
    fn visit_str(&mut self, _bytes: &[u8]) -> bool {
        true
    }
    /// Binary payload; bytes borrow from the caller's input range.
    fn visit_bin(&mut self, _bytes: &[u8]) -> bool {
        true
    }
    /// Extension payload: type tag plus data bytes.
    fn visit_ext(&mut self, _tag: i8, _data: &[u8]) -> bool {
        true
    }
    fn start_array(&mut self, _len: u32) -> bool {
        true
    }
    fn end_array_item(&mut self) -> bool {
        true
    }
    fn end_array(&mut self) -> bool {
        true
    }
    fn start_map(&mut self, _len: u32) -> bool {
        true
    }
    fn end_map_key(&mut self) -> bool {
        true
    }
    fn end_map_value(&mut self) -> bool {
        true
    }
    fn end_map(&mut self) -> bool {
        true
    }
    /// Notification before the driver returns a malformed/limit error.
    fn parse_error(&mut self, _consumed: usize) {}
    /// Notification before the driver reports truncated input.
    fn insufficient_bytes(&mut self, _consumed: usize) {}
}

/// How a visitor-driven parse over a fixed range ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// One complete value was visited; `consumed` bytes were used and any
    /// remainder is the caller's.
    Complete { consumed: usize },
    /// The range ended mid-value.
    Insufficient { consumed: usize },
    /// A visitor method returned `false`.
    ///
    /// `consumed` counts every byte of every item fully decoded at abort
    /// time - including the item whose visit declined - while enclosing
    /// unfinished containers contribute only their headers. (Historical
    /// implementations disagree on this offset; this one is fixed and
    /// tested here.)
    Stopped { consumed: usize },
}

struct VisitorSink<'a, V: Visitor>(&'a mut V);

impl<V: Visitor> Sink for VisitorSink<'_, V> {
    fn nil(&mut self) -> bool {
        self.0.visit_nil()
    }
    fn boolean(&mut self, v: bool) -> bool {
        self.0.visit_boolean(v)
    }
    fn uint(&mut self, v: u64) -> bool {
        self.0.visit_positive_integer(v)
    }
    fn int(&mut self, v: i64) -> bool {
        self.0.visit_negative_integer(v)
    }
    fn f32(&mut self, v: f32) -> bool {
        self.0.visit_float32(v)
    }
    fn f64(&mut self, v: f64) -> bool {
        self.0.visit_float64(v)
    }
    fn raw(&mut self, kind: RawKind, bytes: &[u8], _offset: u64) -> bool {
        match kind {
            RawKind::Str => self.0.visit_str(bytes),
            RawKind::Bin => self.0.visit_bin(bytes),
            RawKind::Ext => self.0.visit_ext(bytes[0] as i8, &bytes[1..]),
        }
    }
    fn start_array(&mut self, len: u32) -> bool {
        self.0.start_array(len)
    }
    fn end_array_item(&mut self) -> bool {
        self.0.end_array_item()
    }
    fn end_array(&mut self) -> bool {
        self.0.end_array()
    }
    fn start_map(&mut self, len: u32) -> bool {
        self.0.start_map(len)
    }
    fn end_map_key(&mut self) -> bool {
        self.0.end_map_key()
    }
    fn end_map_value(&mut self) -> bool {
        self.0.end_map_value()
    }
    fn end_map(&mut self) -> bool {
        self.0.end_map()
    }
}

/// Drive `visitor` over one value encoded in `data`, allocating nothing.
///
/// Truncation and visitor aborts are reported in the outcome; malformed
/// input and limit violations are errors (after the visitor's
/// [`parse_error`](Visitor::parse_error) notification).
pub fn parse_with_visitor<V: Visitor>(
    data: &[u8],
    visitor: &mut V,
    limits: &UnpackLimits,
) -> Result<VisitOutcome, UnpackError> {
    let mut engine = Engine::new();
    let (consumed, status) = {
        let mut sink = VisitorSink(visitor);
        engine.run(data, 0, limits, &mut sink)
    };
    match status {
        Status::Complete => Ok(VisitOutcome::Complete { consumed }),
        Status::Suspended => {
            visitor.insufficient_bytes(consumed);
            Ok(VisitOutcome::Insufficient { consumed })
        }
        Status::Stopped => Ok(VisitOutcome::Stopped { consumed }),
        Status::Failed(e) => {
            visitor.parse_error(consumed);
            Err(e)
        }
    }
}
