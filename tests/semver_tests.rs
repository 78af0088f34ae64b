//! Conformance tests for semver parsing and constraint matching

use smm::{Range, Version};

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn r(s: &str) -> Range {
    Range::parse(s).unwrap()
}

#[test]
fn test_parse_full_version() {
    let version = v("1.2.3-rc.1+build.42");
    assert_eq!(version.major, 1);
    assert_eq!(version.minor, 2);
    assert_eq!(version.patch, 3);
    assert_eq!(version.prerelease, Some("rc.1".to_string()));
    assert_eq!(version.build, Some("build.42".to_string()));
    assert_eq!(version.to_string(), "1.2.3-rc.1+build.42");
}

#[test]
fn test_is_valid() {
    assert!(Version::is_valid("1.2.3"));
    assert!(Version::is_valid("v1.2.3"));
    assert!(Version::is_valid("1.0.0-pr1"));

    assert!(!Version::is_valid("1.2"));
    assert!(!Version::is_valid("1"));
    assert!(!Version::is_valid("1.2.3.4"));
    assert!(!Version::is_valid("one.two.three"));
}

#[test]
fn test_precedence_chain() {
    // The ordering chain from the semver specification.
    let chain = [
        "1.0.0-alpha",
        "1.0.0-alpha.1",
        "1.0.0-alpha.beta",
        "1.0.0-beta",
        "1.0.0-beta.2",
        "1.0.0-beta.11",
        "1.0.0-rc.1",
        "1.0.0",
        "1.0.1",
        "1.1.0",
        "2.0.0",
    ];

    for pair in chain.windows(2) {
        assert!(
            v(pair[0]) < v(pair[1]),
            "expected {} < {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_compare_ignores_build_metadata() {
    assert_eq!(v("1.0.0+a").cmp(&v("1.0.0+b")), std::cmp::Ordering::Equal);
    assert!(v("1.0.0-alpha+a") < v("1.0.0+b"));
}

#[test]
fn test_coerce_game_versions() {
    assert_eq!(Version::coerce("109000"), Some(Version::new(109000, 0, 0)));
    assert_eq!(Version::coerce("118964"), Some(Version::new(118964, 0, 0)));
    assert_eq!(Version::coerce("2.2"), Some(Version::new(2, 2, 0)));
    assert_eq!(Version::coerce(" v2.2.1 "), Some(Version::new(2, 2, 1)));
    assert_eq!(Version::coerce("nope"), None);
}

#[test]
fn test_inclusive_and_exclusive_operators() {
    assert!(r(">=1.2.3").matches(&v("1.2.3")));
    assert!(!r(">1.2.3").matches(&v("1.2.3")));
    assert!(r("<=1.2.3").matches(&v("1.2.3")));
    assert!(!r("<1.2.3").matches(&v("1.2.3")));

    assert!(r(">1.2.3").matches(&v("1.2.4")));
    assert!(r("<1.2.3").matches(&v("1.2.2")));
}

#[test]
fn test_caret_semantics() {
    assert!(r("^1.2.3").matches(&v("1.9.9")));
    assert!(!r("^1.2.3").matches(&v("2.0.0")));

    assert!(r("^0.2.3").matches(&v("0.2.9")));
    assert!(!r("^0.2.3").matches(&v("0.3.0")));

    assert!(r("^0.0.3").matches(&v("0.0.3")));
    assert!(!r("^0.0.3").matches(&v("0.0.4")));
}

#[test]
fn test_tilde_semantics() {
    assert!(r("~1.2.3").matches(&v("1.2.9")));
    assert!(!r("~1.2.3").matches(&v("1.3.0")));
}

#[test]
fn test_compound_range_conjoins() {
    let range = r(">=1.0.0 <2.0.0");
    assert!(range.matches(&v("1.0.0")));
    assert!(range.matches(&v("1.999.0")));
    assert!(!range.matches(&v("2.0.0")));
    assert!(!range.matches(&v("0.9.0")));
}

#[test]
fn test_constraint_set_conjunction() {
    let ranges = vec![r("^1.0.0"), r(">=1.2.0"), r("<1.4.0")];

    assert!(Range::matches_all(&v("1.2.0"), &ranges));
    assert!(Range::matches_all(&v("1.3.9"), &ranges));
    assert!(!Range::matches_all(&v("1.1.9"), &ranges));
    assert!(!Range::matches_all(&v("1.4.0"), &ranges));

    // An empty constraint set accepts everything.
    assert!(Range::matches_all(&v("0.0.1"), &[]));
}

#[test]
fn test_prerelease_excluded_unless_anchored() {
    assert!(!r("^1.0.0").matches(&v("1.2.0-beta")));
    assert!(!r(">=1.0.0").matches(&v("2.0.0-rc.1")));

    let anchored = r(">=1.2.0-alpha");
    assert!(anchored.matches(&v("1.2.0-beta")));
    assert!(anchored.matches(&v("1.3.0")));
    assert!(!anchored.matches(&v("1.3.0-beta")));
}

#[test]
fn test_exact_prerelease_constraint() {
    let range = r("1.0.0-pr7");
    assert!(range.matches(&v("1.0.0-pr7")));
    assert!(!range.matches(&v("1.0.0")));
    assert!(!range.matches(&v("1.0.0-pr6")));
}

#[test]
fn test_loader_style_constraints() {
    // The shapes the resolver synthesizes for loader and game minimums.
    let game = r(">=109000.0.0");
    assert!(game.matches(&v("109000.0.0")));
    assert!(game.matches(&v("118964.0.0")));
    assert!(!game.matches(&v("108000.0.0")));

    let loader = r(">=2.0.0");
    assert!(loader.matches(&v("2.2.1")));
    assert!(!loader.matches(&v("1.0.1")));
}
