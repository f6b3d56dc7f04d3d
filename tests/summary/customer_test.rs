//! Customer summary rendering tests.

use persona_relay::profile::{CustomerProfile, Profile};
use persona_relay::summary::{summarize, summarize_at};

fn engineer() -> CustomerProfile {
    CustomerProfile {
        name: "Ahmad".to_owned(),
        gender: Some("Male".to_owned()),
        occupation: Some("Engineer".to_owned()),
        occupation_field: Some("Oil and Gas".to_owned()),
        income: 5000.0,
        age: 35,
        insurance_type: None,
        insurance_coverage: None,
    }
}

#[test]
fn mid_career_engineer_renders_full_paragraph() {
    let text = summarize_at(&Profile::Customer(engineer()), 2025);
    assert_eq!(
        text,
        "Ahmad is a male born in 1990. He is currently 35 years old and is part of \
         Generation Y (Millennial). He is in the career establishment stage. He works as a \
         Engineer in the field of Oil and Gas. His monthly income is RM5,000.00. Currently, \
         he has no active insurance."
    );
}

#[test]
fn engineer_summary_mentions_stage_income_and_insurance() {
    let text = summarize(&Profile::Customer(engineer()));
    assert!(text.contains("career establishment stage"));
    assert!(text.contains("no active insurance"));
    assert!(text.contains("income is RM5,000.00"));
}

#[test]
fn summary_is_deterministic_for_fixed_year() {
    let profile = Profile::Customer(engineer());
    assert_eq!(summarize_at(&profile, 2030), summarize_at(&profile, 2030));
}

#[test]
fn retiree_gets_fixed_sentence_and_no_occupation_fragment() {
    let profile = CustomerProfile {
        occupation: Some("retiree".to_owned()),
        age: 66,
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.contains("He is currently retired."));
    assert!(!text.contains("works as"));
    assert!(text.contains("Boomer Generation"));
}

#[test]
fn undisclosed_field_and_income_are_phrased_explicitly() {
    let profile = CustomerProfile {
        occupation_field: None,
        income: 0.0,
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.contains("in the field of an undisclosed field."));
    assert!(text.contains("His income is not disclosed."));
}

#[test]
fn insurance_clause_has_three_phrasings() {
    let with_both = CustomerProfile {
        insurance_type: Some("Life, Medical".to_owned()),
        insurance_coverage: Some(250_000.0),
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(with_both), 2025);
    assert!(text.ends_with("Currently, he has active insurance Life, Medical with coverage RM250,000.00."));

    let type_only = CustomerProfile {
        insurance_type: Some("Medical".to_owned()),
        insurance_coverage: None,
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(type_only), 2025);
    assert!(text.ends_with("Currently, he has active insurance Medical."));

    let text = summarize_at(&Profile::Customer(engineer()), 2025);
    assert!(text.ends_with("Currently, he has no active insurance."));
}

#[test]
fn unknown_gender_falls_back_to_they() {
    let profile = CustomerProfile {
        gender: Some("Prefer not to say".to_owned()),
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.contains(" They "));
    assert!(text.contains("Their monthly income"));
    assert!(text.contains("Currently, they "));
    assert!(!text.contains(" he ") && !text.contains(" she "));
}

#[test]
fn non_positive_age_is_undisclosed() {
    let profile = CustomerProfile { age: 0, ..engineer() };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.starts_with("Ahmad is a male with an undisclosed age."));
    assert!(!text.contains("born in"));
    assert!(text.contains("is not in the workforce yet"));
}

#[test]
fn absent_values_never_leak_placeholders() {
    let profile = CustomerProfile {
        gender: None,
        occupation: None,
        occupation_field: None,
        income: 0.0,
        insurance_type: None,
        insurance_coverage: None,
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    for placeholder in ["None", "null", "NaN", "undefined"] {
        assert!(!text.contains(placeholder), "{placeholder} leaked into: {text}");
    }
    assert!(text.starts_with("Ahmad is a person born in 1990."));
}

#[test]
fn zero_coverage_reads_as_type_only() {
    let profile = CustomerProfile {
        insurance_type: Some("Medical".to_owned()),
        insurance_coverage: Some(0.0),
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.ends_with("Currently, he has active insurance Medical."), "{text}");

    let profile = CustomerProfile {
        insurance_type: Some("Life".to_owned()),
        insurance_coverage: Some(250_000.0),
        ..engineer()
    };
    let text = summarize_at(&Profile::Customer(profile), 2025);
    assert!(text.ends_with("Currently, he has active insurance Life with coverage RM250,000.00."));
}
