//! End-to-end behaviour of `ParamGuard` through its public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use param_guard::{
    Config, ConstraintPlugin, GuardError, LengthPlugin, ParamGuard, ParamRule, PluginError,
    RangePlugin, Result, ValuePredicate,
};

fn guard_with(rules: &str) -> ParamGuard {
    let guard = ParamGuard::default();
    guard.parse_rules(rules).unwrap();
    guard
}

#[test]
fn test_range_plugin_scenario() {
    let guard = ParamGuard::with_plugins(Config::default(), vec![Arc::new(RangePlugin)]);
    guard.parse_rules("/products?page=[range:1-10]").unwrap();
    assert!(guard.validate_url("/products?page=5"));
    assert!(!guard.validate_url("/products?page=15"));
}

#[test]
fn test_length_plugin_scenario() {
    let guard = ParamGuard::with_plugins(Config::default(), vec![Arc::new(LengthPlugin)]);
    guard.parse_rules("/api?username=[len:3..10]").unwrap();
    assert!(guard.validate_url("/api?username=john"));
    assert!(!guard.validate_url("/api?username=jo"));
}

#[test]
fn test_filter_scenario() {
    let guard = guard_with("/api?page=[range:1-10]&name=[len:3..10]");
    assert_eq!(
        guard.filter_url("/api?page=5&name=john&invalid=param"),
        "/api?page=5&name=john"
    );
}

#[test]
fn test_global_enum_scenario() {
    let guard = guard_with("status=[active,inactive]");
    assert!(guard.validate_param("/anything", "status", "active"));
    assert!(!guard.validate_param("/anything", "status", "deleted"));
}

#[test]
fn test_malformed_rule_keeps_previous_rules() {
    let guard = ParamGuard::with_plugins(Config::default(), vec![Arc::new(LengthPlugin)]);
    guard.parse_rules("/api?page=[1-10]").unwrap();

    let err = guard.parse_rules("/api?page=[len:constraint]").unwrap_err();
    assert!(matches!(err, GuardError::Plugin { ref plugin, .. } if plugin == "length"));
    assert!(guard.validate_url("/api?page=7"));
    assert!(!guard.validate_url("/api?page=70"));
}

#[test]
fn test_malformed_first_load_leaves_guard_empty() {
    let guard = ParamGuard::default();
    assert!(guard.parse_rules("/api?page=[len:constraint]").is_err());
    assert!(!guard.validate_url("/api?page=1"));
    assert_eq!(guard.stats().generation, 0);
}

#[test]
fn test_specific_rule_governs_exclusively() {
    let guard = guard_with("/api/*?x=[a,b];/api/users?x=[1-5]");
    assert!(guard.validate_url("/api/users?x=1"));
    assert!(!guard.validate_url("/api/users?x=a"));
    assert!(guard.validate_url("/api/orders?x=a"));
    assert!(!guard.validate_url("/api/orders?x=1"));
}

#[test]
fn test_no_fallback_to_looser_global() {
    let guard = guard_with("/products?page=[range:1-10];page=[*]");
    assert!(!guard.validate_url("/products?page=99"));
    assert!(!guard.validate_param("/products", "page", "99"));
    assert_eq!(guard.filter_url("/products?page=99"), "/products");
    assert!(guard.validate_url("/elsewhere?page=99"));
}

#[test]
fn test_url_level_resolution_uses_most_specific_declaring_rule() {
    let guard = guard_with("*?lang=[en];/docs/*?lang=[en,de]&v;/docs/api?v");
    // `/docs/api` does not declare `lang`; `/docs/*` is the most specific that does
    assert!(guard.validate_url("/docs/api?lang=de"));
    assert!(!guard.validate_url("/docs/api?lang=fr"));
    assert!(!guard.validate_url("/blog?lang=de"));
    assert!(guard.validate_url("/blog?lang=en"));
}

#[test]
fn test_allow_all_scope() {
    let guard = guard_with("/open/*?*;/closed?x");
    for url in ["/open/a?b=c", "/open?anything", "/open/x/y?%zz=1&&q"] {
        assert!(guard.validate_url(url), "{url}");
        assert_eq!(guard.filter_url(url), url);
    }
    assert!(!guard.validate_url("/closed?y=1"));
}

#[test]
fn test_allow_all_cannot_widen_a_constrained_list() {
    let guard = guard_with("/a?x=[1]");
    assert!(guard.parse_rules("/a?x=[1]&*").is_err());
    assert!(guard.parse_rules("/a?*;/a?x=[1]").is_err());
    assert!(!guard.validate_url("/a?x=9"));
    assert!(guard.validate_url("/a?x=1"));

    assert!(guard.add_url_rule("/a", vec![ParamRule::allow_all()]).is_err());
    assert!(!guard.validate_url("/a?x=9"));
}

#[test]
fn test_escaped_enum_values() {
    let guard = guard_with(r"/a?x=[a\]b,c\,d]");
    assert!(guard.validate_query("/a", "x=a%5Db"));
    assert!(guard.validate_query("/a", "x=c%2Cd"));
    assert!(!guard.validate_query("/a", "x=a%5C%5Db"));
    assert!(!guard.validate_query("/a", "x=c"));
}

#[test]
fn test_inverted_rules() {
    let guard = guard_with("sort!=[random,shuffle];mode!=[1-3]");
    assert!(guard.validate_query("/", "sort=asc"));
    assert!(!guard.validate_query("/", "sort=random"));
    assert!(guard.validate_query("/", "mode=7"));
    assert!(!guard.validate_query("/", "mode=2"));
}

#[test]
fn test_key_only_and_any() {
    let guard = guard_with("debug=[];q");
    assert!(guard.validate_query("/", "debug"));
    assert!(guard.validate_query("/", "debug="));
    assert!(!guard.validate_query("/", "debug=1"));
    assert!(guard.validate_query("/", "q=anything&q"));
}

#[test]
fn test_consistency_between_url_and_query_apis() {
    let guard = guard_with("/a?x=[1-3];y");
    for query in ["x=1", "x=9", "y", "z", "x=1&y=2", "&&x=2&"] {
        assert_eq!(
            guard.validate_url(&format!("/a?{query}")),
            guard.validate_query("/a", query),
            "{query}"
        );
    }
}

#[test]
fn test_filtered_url_validates() {
    let guard = guard_with("/s?q=[len:1..5]&page=[1-9];utm_source");
    let filtered = guard.filter_url("/s?q=abc&page=42&utm_source=x&junk");
    assert_eq!(filtered, "/s?q=abc&utm_source=x");
    assert!(guard.validate_url(&filtered));
}

#[test]
fn test_normalize_is_idempotent() {
    let guard = guard_with("/s?q;/t/*?*");
    for url in ["/s?z&q=1#f", "/s", "/s?", "/t/x?a&&b", "/u?q=1"] {
        let once = guard.normalize_url(url);
        assert_eq!(guard.normalize_url(&once), once, "{url}");
    }
}

#[test]
fn test_programmatic_rules_merge_with_dsl() {
    let guard = guard_with("/api/items?sort=[asc,desc]");
    guard
        .add_url_rule("/api/items", vec![ParamRule::range("page", 1, 3)])
        .unwrap();
    guard.add_global_param(ParamRule::key_only("debug")).unwrap();
    assert!(guard.validate_url("/api/items?sort=asc&page=2&debug"));
    assert!(!guard.validate_url("/api/items?page=4"));
    assert_eq!(guard.stats().url_rules, 1);
}

#[test]
fn test_load_rules_file() {
    let dir = std::env::temp_dir().join("param_guard_engine_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("rules.pg");
    std::fs::write(&path, "# catalogue\n/products?page=[range:1-10]\nutm_source\n").unwrap();

    let guard = ParamGuard::default();
    guard.load_rules_file(&path).unwrap();
    assert!(guard.validate_url("/products?page=2&utm_source=a"));

    let small = ParamGuard::with_default_plugins(Config::new().with_max_rules_size(4));
    assert!(matches!(
        small.load_rules_file(&path),
        Err(GuardError::RulesTooLarge { limit: 4, .. })
    ));
    assert!(matches!(
        guard.load_rules_file(dir.join("missing.pg")),
        Err(GuardError::Io(_))
    ));

    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_dir(&dir);
}

/// Accepts `even` and counts how often it was closed
struct EvenPlugin {
    closed: Arc<AtomicUsize>,
    fail_close: bool,
}

impl ConstraintPlugin for EvenPlugin {
    fn name(&self) -> &str {
        "even"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        constraint == "even"
    }

    fn parse(&self, _param: &str, constraint: &str) -> std::result::Result<ValuePredicate, PluginError> {
        if constraint != "even" {
            return Err(PluginError::NotApplicable);
        }
        Ok(Arc::new(|v: &str| v.parse::<u64>().is_ok_and(|n| n % 2 == 0)))
    }

    fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(GuardError::Config("even plugin refused to close".to_string()));
        }
        Ok(())
    }
}

#[test]
fn test_custom_plugin_registration() {
    let closed = Arc::new(AtomicUsize::new(0));
    let guard = ParamGuard::default();
    // without the plugin `even` is a one-value enum
    guard.parse_rules("n=[even]").unwrap();
    assert!(guard.validate_query("/", "n=even"));

    guard
        .register_plugin(Arc::new(EvenPlugin {
            closed: Arc::clone(&closed),
            fail_close: false,
        }))
        .unwrap();
    assert_eq!(guard.plugin_for("even").as_deref(), Some("even"));
    assert_eq!(guard.plugin_for("len:3").as_deref(), Some("length"));
    assert!(guard.plugin_for("plain").is_none());

    guard.parse_rules("n=[even]").unwrap();
    assert!(guard.validate_query("/", "n=4"));
    assert!(!guard.validate_query("/", "n=3"));

    guard.close().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_reports_first_plugin_error() {
    let closed = Arc::new(AtomicUsize::new(0));
    let plugin = |fail_close| -> Arc<dyn ConstraintPlugin> {
        Arc::new(EvenPlugin {
            closed: Arc::clone(&closed),
            fail_close,
        })
    };
    let guard = ParamGuard::with_plugins(Config::default(), vec![plugin(true), plugin(false)]);
    let err = guard.close().unwrap_err();
    assert!(matches!(err, GuardError::PluginClose { ref plugin, .. } if plugin == "even"));
    assert_eq!(closed.load(Ordering::SeqCst), 2);
    assert!(!guard.is_initialized());
    assert!(guard.close().is_ok());
}

#[test]
fn test_panicking_plugin_predicate_rejects() {
    struct Boom;
    impl ConstraintPlugin for Boom {
        fn name(&self) -> &str {
            "boom"
        }
        fn parse(&self, _: &str, c: &str) -> std::result::Result<ValuePredicate, PluginError> {
            if c != "boom" {
                return Err(PluginError::NotApplicable);
            }
            Ok(Arc::new(|v: &str| {
                if v == "x" {
                    panic!("predicate failure");
                }
                true
            }))
        }
    }

    let guard = ParamGuard::with_plugins(Config::default(), vec![Arc::new(Boom)]);
    guard.parse_rules("p=[boom];q!=[boom]").unwrap();
    assert!(guard.validate_query("/", "p=y"));
    assert!(!guard.validate_query("/", "p=x"));
    // a panic is a rejection before inversion, so the inverted rule accepts
    assert!(guard.validate_query("/", "q=x"));
    // the guard keeps working afterwards
    assert!(guard.validate_query("/", "p=z"));
}
