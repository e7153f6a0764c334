//! Configurable size and depth ceilings for untrusted input.
//!
//! Every length a decoder reads off the wire is attacker-controlled; these
//! limits are checked before any allocation proportional to a declared
//! length happens. Defaults are fully permissive (the wire format's own
//! 32-bit maxima); tighten them for anything network-facing.

use std::fmt;

/// Which limit category a declared length exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitCategory {
    Array,
    Map,
    Str,
    Bin,
    Ext,
    Depth,
}

impl fmt::Display for LimitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitCategory::Array => "array length",
            LimitCategory::Map => "map pairs",
            LimitCategory::Str => "str bytes",
            LimitCategory::Bin => "bin bytes",
            LimitCategory::Ext => "ext bytes",
            LimitCategory::Depth => "nesting depth",
        };
        f.write_str(s)
    }
}

/// Per-category ceilings enforced during unpacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackLimits {
    array: u32,
    map: u32,
    str: u32,
    bin: u32,
    ext: u32,
    depth: u32,
}

impl UnpackLimits {
    /// Fully permissive limits.
    pub const fn unlimited() -> Self {
        UnpackLimits {
            array: u32::MAX,
            map: u32::MAX,
            str: u32::MAX,
            bin: u32::MAX,
            ext: u32::MAX,
            depth: u32::MAX,
        }
    }

    /// Maximum array element count.
    pub const fn with_array(mut self, n: u32) -> Self {
        self.array = n;
        self
    }

    /// Maximum map pair count.
    pub const fn with_map(mut self, n: u32) -> Self {
        self.map = n;
        self
    }

    /// Maximum str payload bytes.
    pub const fn with_str(mut self, n: u32) -> Self {
        self.str = n;
        self
    }

    /// Maximum bin payload bytes.
    pub const fn with_bin(mut self, n: u32) -> Self {
        self.bin = n;
        self
    }

    /// Maximum ext payload bytes (excluding the type byte).
    pub const fn with_ext(mut self, n: u32) -> Self {
        self.ext = n;
        self
    }

    /// Maximum container nesting depth.
    pub const fn with_depth(mut self, n: u32) -> Self {
        self.depth = n;
        self
    }

    /// The ceiling for a category.
    pub fn max(&self, category: LimitCategory) -> u32 {
        match category {
            LimitCategory::Array => self.array,
            LimitCategory::Map => self.map,
            LimitCategory::Str => self.str,
            LimitCategory::Bin => self.bin,
            LimitCategory::Ext => self.ext,
            LimitCategory::Depth => self.depth,
        }
    }
}

impl Default for UnpackLimits {
    fn default() -> Self {
        UnpackLimits::unlimited()
    }
}
