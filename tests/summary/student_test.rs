//! Student summary rendering tests.

use persona_relay::profile::{Profile, StudentProfile};
use persona_relay::summary::summarize;

fn aisyah() -> StudentProfile {
    StudentProfile {
        name: "Aisyah".to_owned(),
        gender: Some("female".to_owned()),
        form: "Form 4".to_owned(),
        school: "SMK Damansara".to_owned(),
        preferred_language: Some("Malay".to_owned()),
        favourite_subjects: vec!["Biology".to_owned(), "Mathematics".to_owned()],
        study_frequency: Some("daily".to_owned()),
    }
}

#[test]
fn full_student_profile_renders_every_clause() {
    let text = summarize(&Profile::Student(aisyah()));
    assert_eq!(
        text,
        "Aisyah is a female student in Form 4 at SMK Damansara. She likes Biology, Mathematics \
         subjects. She studies daily. Her preferred language is Malay."
    );
}

#[test]
fn no_subjects_means_no_likes_clause() {
    let profile = StudentProfile {
        favourite_subjects: vec![],
        ..aisyah()
    };
    let text = summarize(&Profile::Student(profile));
    assert!(!text.contains("likes"));
    assert!(text.contains("She studies"));
    assert!(text.contains("Her preferred language"));
}

#[test]
fn optional_clauses_are_omitted_when_undisclosed() {
    let profile = StudentProfile {
        gender: None,
        preferred_language: None,
        study_frequency: None,
        favourite_subjects: vec![],
        ..aisyah()
    };
    let text = summarize(&Profile::Student(profile));
    assert_eq!(text, "Aisyah is a student in Form 4 at SMK Damansara.");
}

#[test]
fn male_student_uses_he_his() {
    let profile = StudentProfile {
        gender: Some("MALE".to_owned()),
        ..aisyah()
    };
    let text = summarize(&Profile::Student(profile));
    assert!(text.contains("He likes"));
    assert!(text.contains("His preferred language"));
}

#[test]
fn undisclosed_gender_is_dropped_from_intro() {
    let profile = StudentProfile {
        gender: Some("UNDISCLOSED".to_owned()),
        ..aisyah()
    };
    let text = summarize(&Profile::Student(profile));
    assert!(text.starts_with("Aisyah is a student in Form 4"), "{text}");
    assert!(text.contains("They likes Biology"));
}
