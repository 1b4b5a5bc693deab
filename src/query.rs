//! Query string scanning and percent-decoding.
//!
//! Scanning never allocates: segments are returned as borrowed slices or
//! byte offsets into the caller's buffer.

use std::borrow::Cow;

/// One `key` or `key=value` segment of a `&str` query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The segment exactly as written, still encoded
    pub raw: &'a str,
    /// Text before the first `=`
    pub key: &'a str,
    /// Text after the first `=`, empty when there is none
    pub value: &'a str,
}

/// Iterate the non-empty `&`-delimited segments of `query`.
pub fn segments(query: &str) -> impl Iterator<Item = Segment<'_>> {
    query.split('&').filter(|raw| !raw.is_empty()).map(|raw| {
        let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
        Segment { raw, key, value }
    })
}

/// Byte offsets of one segment inside a query buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSegment {
    pub start: usize,
    pub key_end: usize,
    pub end: usize,
}

impl ByteSegment {
    pub fn key<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        buf.get(self.start..self.key_end).unwrap_or_default()
    }

    pub fn value<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        if self.key_end >= self.end {
            return &[];
        }
        buf.get(self.key_end + 1..self.end).unwrap_or_default()
    }

    pub fn raw<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        buf.get(self.start..self.end).unwrap_or_default()
    }
}

/// Iterator over the non-empty segments of a raw byte query
#[derive(Debug, Clone)]
pub struct QuerySegments<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> QuerySegments<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl Iterator for QuerySegments<'_> {
    type Item = ByteSegment;

    fn next(&mut self) -> Option<ByteSegment> {
        while self.pos < self.buf.len() {
            let start = self.pos;
            let rest = &self.buf[start..];
            let len = rest.iter().position(|&b| b == b'&').unwrap_or(rest.len());
            let end = start + len;
            self.pos = end + 1;
            if len == 0 {
                continue;
            }
            let key_len = rest[..len].iter().position(|&b| b == b'=').unwrap_or(len);
            return Some(ByteSegment {
                start,
                key_end: start + key_len,
                end,
            });
        }
        None
    }
}

/// Percent-decode a query component.
///
/// Returns `None` for a `%` not followed by two hex digits, or when the
/// decoded bytes are not UTF-8. `+` is left as is.
pub fn decode_component(s: &str) -> Option<Cow<'_, str>> {
    if !s.contains('%') {
        return Some(Cow::Borrowed(s));
    }
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(s).ok()
}

/// Cut a query string at its first `#`; the fragment is never part of it.
pub fn strip_fragment(query: &str) -> &str {
    query.split_once('#').map_or(query, |(query, _)| query)
}

/// [`strip_fragment`] for raw bytes.
pub fn strip_fragment_bytes(query: &[u8]) -> &[u8] {
    match query.iter().position(|&b| b == b'#') {
        Some(hash) => &query[..hash],
        None => query,
    }
}

/// Split a URL into path, query (without `?`) and fragment (with `#`).
pub fn split_url(url: &str) -> (&str, Option<&str>, Option<&str>) {
    let (before, fragment) = match url.find('#') {
        Some(hash) => (&url[..hash], Some(&url[hash..])),
        None => (url, None),
    };
    match before.split_once('?') {
        Some((path, query)) => (path, Some(query), fragment),
        None => (before, None, fragment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        let segs: Vec<_> = segments("a=1&&b&c=x=y&").collect();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment { raw: "a=1", key: "a", value: "1" });
        assert_eq!(segs[1], Segment { raw: "b", key: "b", value: "" });
        assert_eq!(segs[2].key, "c");
        assert_eq!(segs[2].value, "x=y");
    }

    #[test]
    fn test_byte_segments_match_str_segments() {
        let query = "a=1&&b&c=x=y&=v";
        let buf = query.as_bytes();
        let bytes: Vec<(&[u8], &[u8], &[u8])> = QuerySegments::new(buf)
            .map(|s| (s.raw(buf), s.key(buf), s.value(buf)))
            .collect();
        let strs: Vec<(&[u8], &[u8], &[u8])> = segments(query)
            .map(|s| (s.raw.as_bytes(), s.key.as_bytes(), s.value.as_bytes()))
            .collect();
        assert_eq!(bytes, strs);
    }

    #[test]
    fn test_byte_segments_empty_inputs() {
        assert_eq!(QuerySegments::new(b"").count(), 0);
        assert_eq!(QuerySegments::new(b"&&&").count(), 0);
        let seg = QuerySegments::new(b"k=").next().unwrap();
        assert_eq!(seg.value(b"k="), b"");
    }

    #[test]
    fn test_decode_component() {
        assert_eq!(decode_component("plain").unwrap(), "plain");
        assert_eq!(decode_component("a%20b").unwrap(), "a b");
        assert_eq!(decode_component("caf%C3%A9").unwrap(), "café");
        assert_eq!(decode_component("a+b").unwrap(), "a+b");
        assert!(decode_component("%").is_none());
        assert!(decode_component("%2").is_none());
        assert!(decode_component("%zz").is_none());
        assert!(decode_component("%FF").is_none());
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("a=1#top"), "a=1");
        assert_eq!(strip_fragment("#top"), "");
        assert_eq!(strip_fragment("a=1"), "a=1");
        assert_eq!(strip_fragment_bytes(b"a=1#x&b"), b"a=1");
        assert_eq!(strip_fragment_bytes(b"a=1"), b"a=1");
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/a"), ("/a", None, None));
        assert_eq!(split_url("/a?x=1"), ("/a", Some("x=1"), None));
        assert_eq!(split_url("/a?"), ("/a", Some(""), None));
        assert_eq!(split_url("/a?x=1#top"), ("/a", Some("x=1"), Some("#top")));
        assert_eq!(split_url("/a#t?x"), ("/a", None, Some("#t?x")));
        assert_eq!(split_url("/a?x=?&y"), ("/a", Some("x=?&y"), None));
    }
}
