//! Inbound profile forms and boundary validation.
//!
//! Both JSON bodies and `application/x-www-form-urlencoded` bodies decode
//! into the same raw form types. Every field is optional at this layer;
//! [`CustomerForm::validate`] and [`StudentForm::validate`] enforce the
//! required set and normalise optional values.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{CustomerProfile, StudentProfile};

/// Boundary errors raised before any generation starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("missing required field '{field}'")]
    Missing {
        /// Field name as submitted.
        field: &'static str,
    },
    /// A field was present but could not be interpreted.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Field name as submitted.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// The body itself could not be decoded.
    #[error("malformed request body: {0}")]
    Body(String),
}

impl ValidationError {
    /// The offending field, when the error is about a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => Some(field),
            Self::Body(_) => None,
        }
    }
}

/// A JSON value that may be a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value, possibly already comma-separated.
    One(String),
    /// Multiple values.
    Many(Vec<String>),
}

impl OneOrMany {
    /// Non-blank entries, trimmed, in order.
    pub fn into_values(self) -> Vec<String> {
        let raw = match self {
            Self::One(v) => vec![v],
            Self::Many(vs) => vs,
        };
        raw.into_iter()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// Raw customer submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerForm {
    /// Name.
    pub name: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Occupation.
    pub occupation: Option<String>,
    /// Occupation field.
    pub occupation_field: Option<String>,
    /// Monthly income.
    pub income: Option<f64>,
    /// Age in years.
    pub age: Option<i32>,
    /// One or more insurance product types.
    pub insurance_type: Option<OneOrMany>,
    /// Coverage amount.
    pub insurance_coverage: Option<f64>,
}

/// Raw student submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudentForm {
    /// Name.
    pub name: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// School form / grade.
    pub form: Option<String>,
    /// School name.
    pub school: Option<String>,
    /// Preferred language.
    pub preferred_language: Option<String>,
    /// Favourite subjects.
    pub favourite_subjects: Option<OneOrMany>,
    /// Study frequency.
    pub study_frequency: Option<String>,
}

impl CustomerForm {
    /// Decode a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Body`] when the JSON does not match the form shape.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::Body(e.to_string()))
    }

    /// Decode a urlencoded body. Repeated `insurance_type` keys form a list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Invalid`] when a numeric field does not parse.
    pub fn from_urlencoded(body: &[u8]) -> Result<Self, ValidationError> {
        let mut fields = FormFields::parse(body);
        Ok(Self {
            name: fields.take_one("name"),
            gender: fields.take_one("gender"),
            occupation: fields.take_one("occupation"),
            occupation_field: fields.take_one("occupation_field"),
            income: fields.take_number("income")?,
            age: fields.take_number("age")?,
            insurance_type: fields.take_many("insurance_type"),
            insurance_coverage: fields.take_number("insurance_coverage")?,
        })
    }

    /// Enforce the required set and build an immutable profile.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Missing`] for absent required fields and
    /// [`ValidationError::Invalid`] for non-finite numbers.
    pub fn validate(self) -> Result<CustomerProfile, ValidationError> {
        let name = required("name", self.name)?;
        let gender = Some(required("gender", self.gender)?);
        let income = self.income.ok_or(ValidationError::Missing { field: "income" })?;
        let age = self.age.ok_or(ValidationError::Missing { field: "age" })?;
        // Required on the wire; the UNDISCLOSED/NaN markers still map to None.
        let occupation = disclosed(Some(required("occupation", self.occupation)?));
        let occupation_field =
            disclosed(Some(required("occupation_field", self.occupation_field)?));
        if !income.is_finite() {
            return Err(ValidationError::Invalid {
                field: "income",
                reason: "must be a finite number".to_owned(),
            });
        }

        let insurance_type = self
            .insurance_type
            .map(OneOrMany::into_values)
            .filter(|types| !types.is_empty())
            .map(|types| types.join(", "));

        let insurance_coverage = match self.insurance_coverage {
            Some(c) if !c.is_finite() => {
                return Err(ValidationError::Invalid {
                    field: "insurance_coverage",
                    reason: "must be a finite number".to_owned(),
                })
            }
            other => other,
        };

        Ok(CustomerProfile {
            name,
            gender,
            occupation,
            occupation_field,
            income,
            age,
            insurance_type,
            insurance_coverage,
        })
    }
}

impl StudentForm {
    /// Decode a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Body`] when the JSON does not match the form shape.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::Body(e.to_string()))
    }

    /// Decode a urlencoded body. Repeated `favourite_subjects` keys form a list.
    ///
    /// # Errors
    ///
    /// Infallible today; kept fallible to match [`CustomerForm::from_urlencoded`].
    pub fn from_urlencoded(body: &[u8]) -> Result<Self, ValidationError> {
        let mut fields = FormFields::parse(body);
        Ok(Self {
            name: fields.take_one("name"),
            gender: fields.take_one("gender"),
            form: fields.take_one("form"),
            school: fields.take_one("school"),
            preferred_language: fields.take_one("preferred_language"),
            favourite_subjects: fields.take_many("favourite_subjects"),
            study_frequency: fields.take_one("study_frequency"),
        })
    }

    /// Enforce the required set and build an immutable profile.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Missing`] for absent required fields.
    pub fn validate(self) -> Result<StudentProfile, ValidationError> {
        Ok(StudentProfile {
            name: required("name", self.name)?,
            gender: Some(required("gender", self.gender)?),
            form: required("form", self.form)?,
            school: required("school", self.school)?,
            preferred_language: disclosed(self.preferred_language),
            favourite_subjects: self
                .favourite_subjects
                .map(OneOrMany::into_values)
                .unwrap_or_default(),
            study_frequency: disclosed(self.study_frequency),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        _ => Err(ValidationError::Missing { field }),
    }
}

/// Map blank values and the legacy `UNDISCLOSED`/`NaN` markers to `None`.
fn disclosed(value: Option<String>) -> Option<String> {
    let v = value?;
    let trimmed = v.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("UNDISCLOSED")
        || trimmed.eq_ignore_ascii_case("NAN")
    {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Urlencoded key/value pairs grouped by key, preserving value order.
struct FormFields {
    values: BTreeMap<String, Vec<String>>,
}

impl FormFields {
    fn parse(body: &[u8]) -> Self {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            let key = key.strip_suffix("[]").unwrap_or(&key).to_owned();
            values.entry(key).or_default().push(value.into_owned());
        }
        Self { values }
    }

    fn take_one(&mut self, key: &str) -> Option<String> {
        self.values
            .remove(key)
            .and_then(|vs| vs.into_iter().next())
            .filter(|v| !v.trim().is_empty())
    }

    fn take_many(&mut self, key: &str) -> Option<OneOrMany> {
        self.values.remove(key).map(OneOrMany::Many)
    }

    fn take_number<T: std::str::FromStr>(
        &mut self,
        key: &'static str,
    ) -> Result<Option<T>, ValidationError> {
        match self.take_one(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ValidationError::Invalid {
                    field: key,
                    reason: format!("expected a number, got {raw:?}"),
                }),
        }
    }
}
