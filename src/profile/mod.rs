//! Customer and student profiles.
//!
//! Profiles are immutable once built from inbound form data. Optional
//! fields are normalised at the boundary ([`form`]): blank strings and the
//! `UNDISCLOSED`/`NaN` markers become `None`, so the summarizer only ever
//! sees "disclosed" or "undisclosed", never "empty".

use serde::{Deserialize, Serialize};

use crate::prompt::PersonaDomain;

pub mod form;

pub use form::{CustomerForm, OneOrMany, StudentForm, ValidationError};

/// Occupation value marking a retired customer (case-insensitive).
pub const RETIREE: &str = "RETIREE";

/// An insurance customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Display name.
    pub name: String,
    /// Free-form gender. Pronouns fall back to they/their for anything
    /// other than `male`/`female`.
    pub gender: Option<String>,
    /// Occupation title, or `RETIREE`.
    pub occupation: Option<String>,
    /// Industry or field of the occupation.
    pub occupation_field: Option<String>,
    /// Monthly income in RM. Non-positive means not disclosed.
    pub income: f64,
    /// Age in years. Non-positive means not disclosed.
    pub age: i32,
    /// Comma-joined insurance product types currently held.
    pub insurance_type: Option<String>,
    /// Total coverage in RM.
    pub insurance_coverage: Option<f64>,
}

impl CustomerProfile {
    /// Whether the occupation marks the customer as retired.
    pub fn is_retiree(&self) -> bool {
        self.occupation
            .as_deref()
            .is_some_and(|o| o.trim().eq_ignore_ascii_case(RETIREE))
    }
}

/// A secondary-school student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Display name.
    pub name: String,
    /// Free-form gender.
    pub gender: Option<String>,
    /// School form / grade (e.g. `Form 4`).
    pub form: String,
    /// School name.
    pub school: String,
    /// Preferred language of instruction.
    pub preferred_language: Option<String>,
    /// Favourite subjects, in submission order. May be empty.
    pub favourite_subjects: Vec<String>,
    /// How often the student studies (e.g. `daily`).
    pub study_frequency: Option<String>,
}

/// Either profile variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    /// Insurance customer.
    Customer(CustomerProfile),
    /// Student.
    Student(StudentProfile),
}

impl Profile {
    /// The persona domain this profile is rendered for.
    pub fn domain(&self) -> PersonaDomain {
        match self {
            Self::Customer(_) => PersonaDomain::InsuranceAdvisor,
            Self::Student(_) => PersonaDomain::Tutor,
        }
    }

    /// Profile display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Customer(c) => &c.name,
            Self::Student(s) => &s.name,
        }
    }
}

impl From<CustomerProfile> for Profile {
    fn from(value: CustomerProfile) -> Self {
        Self::Customer(value)
    }
}

impl From<StudentProfile> for Profile {
    fn from(value: StudentProfile) -> Self {
        Self::Student(value)
    }
}

/// How a submitted profile body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/json`.
    Json,
    /// `application/x-www-form-urlencoded`.
    UrlEncoded,
}

impl BodyEncoding {
    /// Pick an encoding from a `Content-Type` value. Anything that is not
    /// urlencoded is read as JSON.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct)
                if ct
                    .trim()
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded") =>
            {
                Self::UrlEncoded
            }
            _ => Self::Json,
        }
    }
}

/// Decode and validate a profile submission for `domain`.
///
/// # Errors
///
/// Returns [`ValidationError`] when the body is malformed or a required
/// field is missing.
pub fn decode(
    domain: PersonaDomain,
    encoding: BodyEncoding,
    body: &[u8],
) -> Result<Profile, ValidationError> {
    let profile: Profile = match (domain, encoding) {
        (PersonaDomain::InsuranceAdvisor, BodyEncoding::Json) => {
            CustomerForm::from_json(body)?.validate()?.into()
        }
        (PersonaDomain::InsuranceAdvisor, BodyEncoding::UrlEncoded) => {
            CustomerForm::from_urlencoded(body)?.validate()?.into()
        }
        (PersonaDomain::Tutor, BodyEncoding::Json) => {
            StudentForm::from_json(body)?.validate()?.into()
        }
        (PersonaDomain::Tutor, BodyEncoding::UrlEncoded) => {
            StudentForm::from_urlencoded(body)?.validate()?.into()
        }
    };
    Ok(profile)
}
