//! Bracket-aware scanning over rule text.
//!
//! All delimiters in the DSL are ASCII, so byte offsets reported here always
//! fall on `char` boundaries and can be used to slice the source `&str`.

/// Bracket nesting error at a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unbalanced {
    pub offset: usize,
}

/// Bounds-checked forward cursor over a byte slice
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    /// Offset of the next unread byte.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Consume and return the next byte.
    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Consume the next byte if it equals `expected`.
    pub fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// Visit every unescaped byte at bracket depth zero.
///
/// `visit` returns `true` to stop early; balance is then only checked up to
/// that point. A backslash escapes the following byte, which never counts as a
/// bracket or delimiter.
fn walk_top_level<F>(text: &str, mut visit: F) -> Result<(), Unbalanced>
where
    F: FnMut(usize, u8) -> bool,
{
    let mut cur = Cursor::new(text);
    let mut depth = 0usize;
    while let Some(b) = cur.bump() {
        let at = cur.pos() - 1;
        match b {
            b'\\' => {
                cur.bump();
            }
            b'[' => depth += 1,
            b']' => {
                if depth == 0 {
                    return Err(Unbalanced { offset: at });
                }
                depth -= 1;
            }
            _ if depth == 0 => {
                if visit(at, b) {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Unbalanced { offset: text.len() });
    }
    Ok(())
}

/// Split `text` at any of `delims` occurring at bracket depth zero.
pub(crate) fn split_top_level<'a>(text: &'a str, delims: &[u8]) -> Result<Vec<&'a str>, Unbalanced> {
    let mut cuts = Vec::new();
    walk_top_level(text, |at, b| {
        if delims.contains(&b) {
            cuts.push(at);
        }
        false
    })?;

    let mut parts = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        parts.push(&text[start..cut]);
        start = cut + 1;
    }
    parts.push(&text[start..]);
    Ok(parts)
}

/// Offset of the first `needle` at bracket depth zero.
pub(crate) fn find_top_level(text: &str, needle: u8) -> Result<Option<usize>, Unbalanced> {
    let mut found = None;
    walk_top_level(text, |at, b| {
        if b == needle {
            found = Some(at);
            true
        } else {
            false
        }
    })?;
    Ok(found)
}

/// Given `text` starting with `[`, return the offset of the `]` that closes it.
pub(crate) fn matching_close(text: &str) -> Result<usize, Unbalanced> {
    let mut cur = Cursor::new(text);
    if !cur.eat(b'[') {
        return Err(Unbalanced { offset: 0 });
    }
    let mut depth = 1usize;
    while let Some(b) = cur.bump() {
        match b {
            b'\\' => {
                cur.bump();
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(cur.pos() - 1);
                }
            }
            _ => {}
        }
    }
    debug_assert!(cur.is_eof());
    Err(Unbalanced { offset: text.len() })
}

/// Split `text` at every unescaped `delim` and drop the escaping backslashes.
///
/// A trailing lone backslash is kept as a literal.
pub(crate) fn split_unescaped(text: &str, delim: u8) -> Vec<String> {
    let mut cur = Cursor::new(text);
    let mut parts = Vec::new();
    let mut part = Vec::with_capacity(text.len());
    while let Some(b) = cur.bump() {
        match b {
            b'\\' => part.push(cur.bump().unwrap_or(b'\\')),
            _ if b == delim => parts.push(std::mem::take(&mut part)),
            _ => part.push(b),
        }
    }
    parts.push(part);
    parts
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .collect()
}

/// Remove backslash escapes in front of `?`.
pub(crate) fn unescape_question(text: &str) -> String {
    text.replace("\\?", "?")
}
