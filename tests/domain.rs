use assert_matches::assert_matches;
use regex::Regex;

use crunchy::domain::{
    CollectionName, FetchOutcome, Identifier, RunSummary, sanitize_name,
};
use crunchy::error::CrunchyError;

const SAMPLES: &[&str] = &[
    "Grateful Dead",
    "String Cheese Incident",
    "Umphrey's McGee",
    "moe.",
    "Test-Band-123",
    "King Gizzard & The Lizard Wizard",
    "  leading and trailing  ",
    "a/b\\c:d*e?f\"g<h>i|j",
    "tabs\tand\nnewlines",
    "__--__",
    "...",
    "",
];

#[test]
fn sanitize_matches_examples() {
    assert_eq!(sanitize_name("Grateful Dead"), "Grateful_Dead");
    assert_eq!(sanitize_name("String Cheese Incident"), "String_Cheese_Incident");
    assert_eq!(sanitize_name("Umphrey's McGee"), "Umphreys_McGee");
    assert_eq!(sanitize_name("moe."), "moe");
    assert_eq!(sanitize_name("Test-Band-123"), "Test-Band-123");
}

#[test]
fn sanitize_output_is_path_safe() {
    let safe = Regex::new(r"^[A-Za-z0-9_-]*$").unwrap();
    for sample in SAMPLES {
        let sanitized = sanitize_name(sample);
        assert!(safe.is_match(&sanitized), "{sample:?} -> {sanitized:?}");
    }
}

#[test]
fn sanitize_is_idempotent() {
    for sample in SAMPLES {
        let once = sanitize_name(sample);
        assert_eq!(sanitize_name(&once), once);
    }
}

#[test]
fn sanitize_punctuation_only_is_empty() {
    assert_eq!(sanitize_name("'.!?,;:()"), "");
}

#[test]
fn sanitize_keeps_unicode_letters() {
    assert_eq!(sanitize_name("Sigur Rós"), "Sigur_Rós");
}

#[test]
fn parse_identifier_valid() {
    let id: Identifier = " gd1977-05-08.sbd.hicks.4982 ".parse().unwrap();
    assert_eq!(id.as_str(), "gd1977-05-08.sbd.hicks.4982");
}

#[test]
fn parse_identifier_rejects_path_segments() {
    for raw in ["../x", "a/b", ".", "", "white space"] {
        assert_matches!(
            raw.parse::<Identifier>(),
            Err(CrunchyError::InvalidIdentifier(_))
        );
    }
}

#[test]
fn parse_collection_rejects_blank() {
    assert_matches!(
        "   ".parse::<CollectionName>(),
        Err(CrunchyError::InvalidCollection(_))
    );
    let name: CollectionName = "GratefulDead".parse().unwrap();
    assert_eq!(name.to_string(), "GratefulDead");
}

#[test]
fn summary_counts_sum_to_total() {
    let outcomes = [
        FetchOutcome::Fetched,
        FetchOutcome::Failed,
        FetchOutcome::SkippedAlreadyPresent,
        FetchOutcome::Fetched,
    ];
    let mut summary = RunSummary::default();
    for outcome in outcomes {
        summary.tally(outcome);
    }
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.fetched + summary.skipped + summary.failed, summary.total);
}
