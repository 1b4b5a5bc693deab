use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;

/// Bounded LRU of compiled regexes keyed by their source pattern.
///
/// Shared by the URL matcher (wildcard path patterns) and the pattern/regex
/// plugins. Compilation happens while the lock is held so concurrent callers
/// never compile the same key twice.
#[derive(Debug)]
pub struct RegexCache {
    cache: Mutex<LruCache<String, Arc<Regex>>>,
}

impl RegexCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached regex for `key`, compiling it with `build` on a miss.
    pub fn get_or_compile<F>(&self, key: &str, build: F) -> Result<Arc<Regex>, regex::Error>
    where
        F: FnOnce() -> Result<Regex, regex::Error>,
    {
        let mut cache = self.cache.lock();
        if let Some(re) = cache.get(key) {
            return Ok(Arc::clone(re));
        }
        let re = Arc::new(build()?);
        cache.put(key.to_owned(), Arc::clone(&re));
        Ok(re)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

/// Translate a glob into an anchored regex source.
///
/// `*` matches any sequence; with `single_char`, `?` matches exactly one
/// character. Everything else is literal.
pub(crate) fn glob_to_regex(glob: &str, single_char: bool) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut literal = String::new();
    for c in glob.chars() {
        let token = match c {
            '*' => ".*",
            '?' if single_char => ".",
            _ => {
                literal.push(c);
                continue;
            }
        };
        out.push_str(&regex::escape(&literal));
        literal.clear();
        out.push_str(token);
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_returns_same_regex() {
        let cache = RegexCache::new(4);
        let a = cache.get_or_compile("a*", || Regex::new("^a.*$")).unwrap();
        let b = cache
            .get_or_compile("a*", || panic!("must not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = RegexCache::new(2);
        for key in ["a", "b", "c"] {
            cache.get_or_compile(key, || Regex::new(key)).unwrap();
        }
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_compile_error_not_stored() {
        let cache = RegexCache::new(2);
        assert!(cache.get_or_compile("(", || Regex::new("(")).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_rounds_up() {
        let cache = RegexCache::new(0);
        cache.get_or_compile("x", || Regex::new("x")).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("/api/*/items", false), "^/api/.*/items$");
        assert_eq!(glob_to_regex("a.b?", false), r"^a\.b\?$");
        assert_eq!(glob_to_regex("a.b?", true), r"^a\.b.$");
        let re = Regex::new(&glob_to_regex("*.jpg", true)).unwrap();
        assert!(re.is_match("cat.jpg"));
        assert!(!re.is_match("cat.jpeg"));
    }
}
