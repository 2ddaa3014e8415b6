//! Detector Integration Tests
//!
//! Tests for kind classification, exact offsets and span validity.

use copyguard::detector::{DetectionPolicy, Detector};
use copyguard::domain::{SinKind, TextSpan};

#[test]
fn test_semicolon_contrast_spans_full_clause_pair() {
    let text = "It's not just software; it's a revolution.";
    let violations = Detector::default().detect(text);

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, SinKind::RhetoricalContrast);
    // Whole clause pair, without the final period
    assert_eq!(violations[0].span, TextSpan::new(0, text.len() - 1).unwrap());
}

#[test]
fn test_two_em_dashes_at_exact_offsets() {
    let text = "We grew \u{2014} fast \u{2014} and stayed lean.";
    let violations = Detector::default().detect(text);

    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| v.kind == SinKind::EmDash));
    assert_eq!(violations[0].span, TextSpan::new(8, 11).unwrap());
    assert_eq!(violations[1].span, TextSpan::new(17, 20).unwrap());
}

#[test]
fn test_en_dash_and_hyphen_are_not_em_dashes() {
    let detector = Detector::default();
    assert!(detector.detect("Pages 3\u{2013}5 cover the well-known cases.").is_empty());
    assert!(detector.detect("Ready - set - go.").is_empty());
}

#[test]
fn test_kind_classification() {
    let detector = Detector::default();
    let kind_of = |text: &str| {
        let violations = detector.detect(text);
        assert_eq!(violations.len(), 1, "expected one violation in {:?}", text);
        violations[0].kind
    };

    assert_eq!(kind_of("It's not laziness, it's efficiency."), SinKind::Paradiastole);
    assert_eq!(kind_of("This isn't a cost; it's an investment."), SinKind::ReframingContrast);
    assert_eq!(kind_of("It's not just a car, it's a lifestyle."), SinKind::TaglineFrame);
    assert_eq!(kind_of("They are not vendors, they are partners."), SinKind::Antithesis);
    assert_eq!(kind_of("We sell outcomes, not hours."), SinKind::Antithesis);
}

#[test]
fn test_plain_copy_is_clean() {
    let detector = Detector::default();
    for text in [
        "",
        "We build tools people like.",
        "It's not ready yet.",
        "Not bad, not bad at all.",
        "We shipped, not to mention tested, the release.",
    ] {
        assert!(detector.detect(text).is_empty(), "unexpected violation in {:?}", text);
    }
}

#[test]
fn test_span_validity() {
    let detector = Detector::default();
    let texts = [
        "It's not just software; it's a revolution.",
        "Café \u{2014} naïve \u{2014} déjà vu.",
        "It's not just a product\u{2014}it's a revolution!",
        "We sell outcomes, not hours. We grew\u{2014}fast.",
        "\u{2014}\u{2014}\u{2014}",
    ];

    for text in texts {
        for violation in detector.detect(text) {
            let span = violation.span;
            assert!(span.start < span.end && span.end <= text.len(), "{} out of bounds", span);
            assert!(text.is_char_boundary(span.start) && text.is_char_boundary(span.end));
            if violation.kind == SinKind::EmDash {
                assert_eq!(&text[span.start..span.end], "\u{2014}");
            }
        }
    }
}

#[test]
fn test_accepted_spans_never_overlap() {
    let text = "It's not just a product\u{2014}it's a revolution! We grew \u{2014} fast. \
                We sell outcomes, not hours.";
    let violations = Detector::default().detect(text);

    assert!(violations.len() >= 3);
    for pair in violations.windows(2) {
        assert!(pair[0].span.end <= pair[1].span.start, "{} overlaps {}", pair[0].span, pair[1].span);
    }
}

#[test]
fn test_detection_is_deterministic() {
    let text = "It's not laziness, it's efficiency. We grew \u{2014} fast.";
    let detector = Detector::default();
    assert_eq!(detector.detect(text), detector.detect(text));
}

#[test]
fn test_allow_listed_idiom_is_discounted() {
    let policy = DetectionPolicy {
        allow_list: vec!["not hours".to_string()],
        ..DetectionPolicy::default()
    };
    assert!(Detector::new(policy).detect("We sell outcomes, not hours.").is_empty());
}
