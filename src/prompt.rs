//! Persona prompt construction.
//!
//! Each persona domain has one fixed instruction template. The summary is
//! interpolated verbatim, exactly once. Business rules (takaful preference,
//! Malay-language preference, product aliasing) are written into the
//! instructions for the model to apply; nothing here evaluates them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which persona the model is asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaDomain {
    /// Insurance advisor profiling a customer.
    InsuranceAdvisor,
    /// Tutor profiling a student.
    Tutor,
}

impl PersonaDomain {
    /// URL path segment for this domain (`customer` / `student`).
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::InsuranceAdvisor => "customer",
            Self::Tutor => "student",
        }
    }

    /// Stable name used in logs and traces.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsuranceAdvisor => "insurance-advisor",
            Self::Tutor => "tutor",
        }
    }
}

impl fmt::Display for PersonaDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "insurance-advisor" | "insurance" => Ok(Self::InsuranceAdvisor),
            "student" | "tutor" => Ok(Self::Tutor),
            other => Err(format!(
                "unknown persona domain {other:?}, expected 'customer' or 'student'"
            )),
        }
    }
}

/// Maximum persona length requested from the model, per domain.
pub fn word_limit(domain: PersonaDomain) -> u32 {
    match domain {
        PersonaDomain::InsuranceAdvisor => 400,
        PersonaDomain::Tutor => 300,
    }
}

/// Build the free-text persona prompt for `domain`.
pub fn build_prompt(summary: &str, domain: PersonaDomain) -> String {
    match domain {
        PersonaDomain::InsuranceAdvisor => insurance_prompt(summary),
        PersonaDomain::Tutor => tutor_prompt(summary),
    }
}

/// Build the structured-output prompt for the student dashboard.
///
/// The response shape itself is enforced by the JSON schema sent alongside
/// (see [`crate::analysis::output_schema`]); the prompt only describes the
/// content of each field.
pub fn build_structured_prompt(summary: &str) -> String {
    format!(
        "You are an experienced tutor analysing a student to plan how they learn best.

Student Information: {summary}

Fill in every field of the requested JSON object:
- reasoning: your short step-by-step reasoning about the student.
- persona: a single-paragraph learner persona of at most {limit} words, in English.
- language_preference: {language_rule}
- learning_methods: exactly six learning methods suited to this student, each with a short name, \
a one-sentence rationale tied to the student information, one concrete example activity, and a \
single emoji icon.

Do not add information that is not present in the student data.",
        limit = word_limit(PersonaDomain::Tutor),
        language_rule = LANGUAGE_RULE,
    )
}

const LANGUAGE_RULE: &str = "if the stated preferred language is Malay or Bahasa Melayu, conclude \
that the student prefers Malay; otherwise conclude the stated preferred language, defaulting to \
English when none is stated.";

fn insurance_prompt(summary: &str) -> String {
    format!(
        "You are an expert insurance advisor creating a customer persona to assess insurance needs.

Customer Information: {summary}

Based on the information above, generate a single-paragraph persona summary (maximum {limit} words). \
Describe the customer's possible personality, interests, lifestyle outlook, and life vision. From \
this persona, infer potential insurance product needs, including saving, medical, legacy, \
investment, education, and retirement solutions, and explain the rationale for each within the \
same paragraph.

Apply this takaful preference rule:
- If all existing products are takaful AND the customer is Malay or Muslim, conclude that the \
customer prefers takaful products.
- Otherwise, conclude that the customer is open to non-takaful or conventional products.

Within the same paragraph, also identify all active and non-active insurance products mentioned. \
Note that \"Smart Golden Life\" should be treated as both a retirement and saving product.

Do not use bullet points or separate sections.
Produce the output in English only, and do not add information not present in the customer data.",
        limit = word_limit(PersonaDomain::InsuranceAdvisor),
    )
}

fn tutor_prompt(summary: &str) -> String {
    format!(
        "You are an experienced tutor creating a learner persona to plan personalised lessons.

Student Information: {summary}

Based on the information above, generate a single-paragraph learner persona (maximum {limit} words). \
Describe the student's likely learning style, motivation, strengths, and challenges.

Apply this language preference rule: {language_rule} State the concluded language preference \
within the paragraph.

Recommend exactly six learning methods suited to this student and, for each, give the rationale \
and one concrete example activity, all within the same paragraph.

Do not use bullet points or separate sections.
Produce the output in English only, and do not add information not present in the student data.",
        limit = word_limit(PersonaDomain::Tutor),
        language_rule = LANGUAGE_RULE,
    )
}
