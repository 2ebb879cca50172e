//! Inline bounded string for shared-memory records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-capacity string stored inline, suitable for `repr(C)` payloads.
///
/// Unlike `String`, a `FixedString` owns no heap memory, so a record that
/// embeds one can be copied in and out of a shared region with a single
/// byte copy. Contents longer than `N` are truncated at a UTF-8 character
/// boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
    len: u8,
}

impl<const N: usize> FixedString<N> {
    /// Maximum number of bytes this string can hold.
    pub const CAPACITY: usize = N;

    // len is stored as u8
    const _LEN_FITS: () = assert!(N <= 255, "FixedString capacity must be <= 255");

    /// Create an empty string.
    #[inline]
    pub const fn new() -> Self {
        let _ = Self::_LEN_FITS;
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Build from a `&str`, truncating at a character boundary if needed.
    pub fn truncated(s: &str) -> Self {
        let mut end = s.len().min(N);
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut out = Self::new();
        out.bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        out.len = end as u8;
        out
    }

    /// View the contents as `&str`.
    ///
    /// Bytes that arrived from a foreign process may not be valid UTF-8;
    /// in that case the empty string is returned rather than panicking.
    #[inline]
    pub fn as_str(&self) -> &str {
        let len = (self.len as usize).min(N);
        std::str::from_utf8(&self.bytes[..len]).unwrap_or("")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
        self.bytes = [0; N];
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> From<&str> for FixedString<N> {
    fn from(s: &str) -> Self {
        Self::truncated(s)
    }
}

impl<const N: usize> AsRef<str> for FixedString<N> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// SAFETY: repr(C) with only byte fields, no padding ([u8; N] followed by u8
// has alignment 1, so size is exactly N + 1).
unsafe impl<const N: usize> bytemuck::Zeroable for FixedString<N> {}
unsafe impl<const N: usize> bytemuck::Pod for FixedString<N> where [u8; N]: bytemuck::Pod {}

impl<const N: usize> Serialize for FixedString<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedString<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::truncated(&s))
    }
}
