//! Parameter name interning and fixed-width bit masks.

use std::collections::HashMap;

/// Maps parameter names to dense integer slots.
///
/// Built once per compiled generation. Slots are append-only while a
/// generation is being built and are not stable across reloads.
#[derive(Debug, Clone, Default)]
pub struct ParamIndex {
    slots: HashMap<String, usize>,
    names: Vec<String>,
}

impl ParamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the slot for `name`, allocating one on first use.
    pub fn get_or_create_index(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.slots.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.slots.insert(name.to_owned(), idx);
        self.names.push(name.to_owned());
        idx
    }

    /// Look up a slot without allocating.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Look up the name stored at `buf[start..end]` without copying it out.
    ///
    /// Out-of-range offsets and non-UTF-8 bytes yield `None`.
    #[must_use]
    pub fn get_index_bytes(&self, buf: &[u8], start: usize, end: usize) -> Option<usize> {
        let bytes = buf.get(start..end)?;
        let name = std::str::from_utf8(bytes).ok()?;
        self.get_index(name)
    }

    /// Name stored at a slot.
    #[must_use]
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.names.clear();
    }
}

const WORD_BITS: usize = 64;

/// Fixed-width bit vector over [`ParamIndex`] slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMask {
    words: Vec<u64>,
    width: usize,
}

impl ParamMask {
    /// An empty mask able to hold `width` slots.
    pub fn new(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(WORD_BITS)],
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Set a bit. Slots outside the mask width are ignored.
    pub fn set(&mut self, idx: usize) {
        if idx < self.width {
            self.words[idx / WORD_BITS] |= 1u64 << (idx % WORD_BITS);
        }
    }

    /// Test a bit. Slots outside the mask width read as unset.
    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        idx < self.width && self.words[idx / WORD_BITS] & (1u64 << (idx % WORD_BITS)) != 0
    }

    /// In-place union with another mask of the same generation.
    pub fn union_with(&mut self, other: &ParamMask) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    #[must_use]
    pub fn union(&self, other: &ParamMask) -> ParamMask {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Bits set in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &ParamMask) -> ParamMask {
        let mut out = self.clone();
        for (a, b) in out.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate set slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(move |&idx| self.get(idx))
    }
}
