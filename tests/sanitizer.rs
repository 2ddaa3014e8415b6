//! Sanitizer Integration Tests
//!
//! Tests for clean-text idempotence, non-regression after rewriting, the
//! incomplete-sanitization report and scaling with many violations.

use std::time::{Duration, Instant};

use copyguard::core::{SanitizeError, Sanitizer};
use copyguard::detector::Detector;
use copyguard::domain::SinKind;

fn sanitize(text: &str) -> String {
    let detector = Detector::default();
    let violations = detector.detect(text);
    let (out, log) = Sanitizer::new(&detector)
        .sanitize(text, &violations)
        .unwrap_or_else(|e| panic!("sanitizing {:?} failed: {}", text, e));
    assert_eq!(log.len(), violations.len());
    out
}

#[test]
fn test_clean_text_is_returned_unchanged() {
    let detector = Detector::default();
    let sanitizer = Sanitizer::new(&detector);

    for text in ["", "We build tools people like.", "It's not ready yet.", "Pages 3\u{2013}5."] {
        assert!(detector.detect(text).is_empty());
        let (out, log) = sanitizer.sanitize(text, &[]).unwrap();
        assert_eq!(out, text);
        assert!(log.is_empty());
    }
}

#[test]
fn test_rewrites_leave_no_violations() {
    let cases = [
        ("It's not just software; it's a revolution.", "It's a revolution."),
        ("We grew \u{2014} fast \u{2014} and stayed lean.", "We grew, fast, and stayed lean."),
        ("It's not just a product\u{2014}it's a revolution!", "It's a revolution!"),
        ("It's not laziness, it's efficiency.", "It's efficiency."),
        ("This isn't a cost; it's an investment.", "It's an investment."),
        ("They are not vendors, they are partners.", "They are partners."),
        ("We sell outcomes, not hours.", "We sell outcomes."),
        (
            "It's not laziness, it's efficiency. We grew \u{2014} fast \u{2014} and stayed lean.",
            "It's efficiency. We grew, fast, and stayed lean.",
        ),
    ];

    let detector = Detector::default();
    for (input, expected) in cases {
        let out = sanitize(input);
        assert_eq!(out, expected);
        assert!(detector.detect(&out).is_empty(), "violations remain in {:?}", out);
    }
}

#[test]
fn test_scenario_semicolon_contrast() {
    let out = sanitize("It's not just software; it's a revolution.");
    assert!(!out.contains("not just"));
    assert!(!out.contains(';'));
}

#[test]
fn test_scenario_em_dashes_removed() {
    let out = sanitize("We grew \u{2014} fast \u{2014} and stayed lean.");
    assert!(!out.contains('\u{2014}'));
}

#[test]
fn test_rewrite_is_deterministic() {
    let text = "It's not laziness, it's efficiency. We shipped it\u{2014}it works.";
    assert_eq!(sanitize(text), sanitize(text));
}

#[test]
fn test_chained_negation_reports_residual() {
    let text = "We sell outcomes, not hours, not days.";
    let detector = Detector::default();
    let violations = detector.detect(text);
    assert_eq!(violations.len(), 1);

    match Sanitizer::new(&detector).sanitize(text, &violations) {
        Err(SanitizeError::SanitizationIncomplete {
            residual,
            attempts,
            text,
            log,
        }) => {
            assert_eq!(attempts, 2);
            assert!(residual.contains(&SinKind::Antithesis));
            assert_eq!(text, "We sell outcomes, not days.");
            assert_eq!(log.len(), 1);
        }
        other => panic!("expected incomplete sanitization, got {:?}", other),
    }
}

/// Time to sanitize `count` repeated contrasts, checking the rewrite
fn time_repeated_contrasts(count: usize) -> Duration {
    let text = "It's not laziness, it's efficiency. ".repeat(count);
    let detector = Detector::default();
    let violations = detector.detect(&text);
    assert_eq!(violations.len(), count);

    let started = Instant::now();
    let (out, log) = Sanitizer::new(&detector).sanitize(&text, &violations).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(log.len(), count);
    assert_eq!(out, "It's efficiency. ".repeat(count));
    assert!(detector.detect(&out).is_empty());
    elapsed
}

#[test]
fn test_many_violations_scale_linearly() {
    let small = time_repeated_contrasts(750);
    let large = time_repeated_contrasts(3000);

    // Four times the input; a per-violation rescan would cost about sixteen times
    let ratio = large.as_secs_f64() / small.as_secs_f64().max(1e-3);
    assert!(ratio < 10.0, "3000 violations took {:?}, 750 took {:?}", large, small);
}
