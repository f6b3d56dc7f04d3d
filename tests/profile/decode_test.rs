//! Profile decoding and boundary validation tests.

use persona_relay::profile::{self, BodyEncoding, Profile, ValidationError};
use persona_relay::prompt::PersonaDomain;

fn customer(body: &str, encoding: BodyEncoding) -> Result<Profile, ValidationError> {
    profile::decode(PersonaDomain::InsuranceAdvisor, encoding, body.as_bytes())
}

fn student(body: &str, encoding: BodyEncoding) -> Result<Profile, ValidationError> {
    profile::decode(PersonaDomain::Tutor, encoding, body.as_bytes())
}

#[test]
fn content_type_selects_encoding() {
    assert_eq!(
        BodyEncoding::from_content_type(Some("application/x-www-form-urlencoded; charset=utf-8")),
        BodyEncoding::UrlEncoded
    );
    assert_eq!(
        BodyEncoding::from_content_type(Some("application/json")),
        BodyEncoding::Json
    );
    assert_eq!(BodyEncoding::from_content_type(None), BodyEncoding::Json);
}

#[test]
fn json_customer_joins_insurance_list() {
    let body = r#"{"name":"Ahmad","gender":"male","age":35,"income":5000,
        "occupation":"Engineer","occupation_field":"NaN","insurance_type":["Life","Medical"],"insurance_coverage":100000}"#;
    let profile = customer(body, BodyEncoding::Json).expect("valid customer");
    match profile {
        Profile::Customer(c) => {
            assert_eq!(c.insurance_type.as_deref(), Some("Life, Medical"));
            assert_eq!(c.insurance_coverage, Some(100_000.0));
            assert_eq!(c.occupation_field, None);
        }
        other => panic!("expected customer, got {other:?}"),
    }
}

#[test]
fn form_customer_collects_repeated_keys_and_normalises_sentinels() {
    let body = "name=Siti&gender=female&age=52&income=7200.50&occupation=UNDISCLOSED\
                &occupation_field=UNDISCLOSED\
                &insurance_type=Medical&insurance_type=Takaful";
    let profile = customer(body, BodyEncoding::UrlEncoded).expect("valid customer");
    match profile {
        Profile::Customer(c) => {
            assert_eq!(c.name, "Siti");
            assert_eq!(c.occupation, None);
            assert_eq!(c.insurance_type.as_deref(), Some("Medical, Takaful"));
            assert!((c.income - 7200.5).abs() < f64::EPSILON);
        }
        other => panic!("expected customer, got {other:?}"),
    }
}

#[test]
fn missing_required_customer_field_is_named() {
    let err = customer(r#"{"name":"Ahmad","gender":"male","income":5000}"#, BodyEncoding::Json)
        .expect_err("age is required");
    assert_eq!(err, ValidationError::Missing { field: "age" });
    assert_eq!(err.field(), Some("age"));
}

#[test]
fn customer_occupation_is_required() {
    let err = customer(
        r#"{"name":"Ahmad","gender":"male","income":5000,"age":35}"#,
        BodyEncoding::Json,
    )
    .expect_err("occupation is required");
    assert_eq!(err, ValidationError::Missing { field: "occupation" });

    let err = customer(
        "name=Ahmad&gender=male&income=5000&age=35&occupation=Engineer",
        BodyEncoding::UrlEncoded,
    )
    .expect_err("occupation_field is required");
    assert_eq!(err.field(), Some("occupation_field"));
}

#[test]
fn blank_name_counts_as_missing() {
    let err = customer("name=%20&gender=male&age=30&income=1", BodyEncoding::UrlEncoded)
        .expect_err("blank name");
    assert_eq!(err.field(), Some("name"));
}

#[test]
fn non_numeric_form_income_is_invalid() {
    let err = customer("name=A&gender=male&age=30&income=lots", BodyEncoding::UrlEncoded)
        .expect_err("income must parse");
    assert!(matches!(err, ValidationError::Invalid { field: "income", .. }));
}

#[test]
fn malformed_json_is_a_body_error() {
    let err = customer("{not json", BodyEncoding::Json).expect_err("malformed");
    assert!(matches!(err, ValidationError::Body(_)));
    assert_eq!(err.field(), None);
}

#[test]
fn student_subjects_accept_string_or_list() {
    let from_list = student(
        r#"{"name":"Aisyah","gender":"female","form":"Form 4","school":"SMK",
            "favourite_subjects":["Biology"," ","Chemistry"]}"#,
        BodyEncoding::Json,
    )
    .expect("valid student");
    let from_string = student(
        r#"{"name":"Aisyah","gender":"female","form":"Form 4","school":"SMK",
            "favourite_subjects":"Biology"}"#,
        BodyEncoding::Json,
    )
    .expect("valid student");

    match (from_list, from_string) {
        (Profile::Student(a), Profile::Student(b)) => {
            assert_eq!(a.favourite_subjects, vec!["Biology", "Chemistry"]);
            assert_eq!(b.favourite_subjects, vec!["Biology"]);
            assert_eq!(a.preferred_language, None);
        }
        other => panic!("expected students, got {other:?}"),
    }
}

#[test]
fn student_requires_school() {
    let err = student("name=Aisyah&gender=female&form=Form+4", BodyEncoding::UrlEncoded)
        .expect_err("school is required");
    assert_eq!(err, ValidationError::Missing { field: "school" });
}
