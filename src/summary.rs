//! Profile summarizer: structured profile → one deterministic paragraph.
//!
//! Pure string assembly. The only environmental input is the current
//! calendar year (for the customer's birth year), read once per call by
//! [`summarize`]; [`summarize_at`] takes it explicitly.

use chrono::Datelike;

use crate::profile::{CustomerProfile, Profile, StudentProfile};

/// Subject and possessive pronouns for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pronouns {
    /// `he` / `she` / `they`.
    pub subject: &'static str,
    /// `his` / `her` / `their`.
    pub possessive: &'static str,
}

impl Pronouns {
    /// Pick pronouns from a free-form gender, case-insensitively.
    pub fn for_gender(gender: Option<&str>) -> Self {
        match gender.map(|g| g.trim().to_ascii_lowercase()).as_deref() {
            Some("male") => Self {
                subject: "he",
                possessive: "his",
            },
            Some("female") => Self {
                subject: "she",
                possessive: "her",
            },
            _ => Self {
                subject: "they",
                possessive: "their",
            },
        }
    }

    fn subject_cap(self) -> String {
        capitalize(self.subject)
    }

    fn possessive_cap(self) -> String {
        capitalize(self.possessive)
    }
}

/// Summarize a profile using the current local year.
pub fn summarize(profile: &Profile) -> String {
    summarize_at(profile, chrono::Local::now().year())
}

/// Summarize a profile as of `current_year`.
pub fn summarize_at(profile: &Profile, current_year: i32) -> String {
    match profile {
        Profile::Customer(c) => customer_summary(c, current_year),
        Profile::Student(s) => student_summary(s),
    }
}

/// Generation label for a birth year.
pub fn generation_for(born_year: i32) -> &'static str {
    match born_year {
        y if y >= 2025 => "Generation Beta",
        y if y >= 2010 => "Generation Alpha",
        y if y >= 1997 => "Generation Z",
        y if y >= 1981 => "Generation Y (Millennial)",
        y if y >= 1965 => "Generation X",
        y if y >= 1946 => "Boomer Generation",
        _ => "Silent Generation",
    }
}

/// Career-stage phrase for an age.
///
/// The bucket edges are uneven (`<=60`, `<50`, `<=40`, `<30`) and checked
/// in this order, so 40 lands in "establishment" and 50 in "approaching
/// retirement".
pub fn career_stage(age: i32) -> &'static str {
    if (50..=60).contains(&age) {
        "is approaching retirement age"
    } else if age > 40 && age < 50 {
        "is in the career advancement stage"
    } else if (30..=40).contains(&age) {
        "is in the career establishment stage"
    } else if (20..30).contains(&age) {
        "is in the career exploration stage"
    } else {
        "is not in the workforce yet"
    }
}

/// Format a ringgit amount as `5,000.00`.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = whole.chars().collect();
    let groups: Vec<String> = digits
        .rchunks(3)
        .rev()
        .map(|chunk| chunk.iter().collect())
        .collect();

    let sign = if amount.is_sign_negative() && amount != 0.0 {
        "-"
    } else {
        ""
    };
    format!("{sign}{}.{fraction}", groups.join(","))
}

fn customer_summary(c: &CustomerProfile, current_year: i32) -> String {
    let p = Pronouns::for_gender(c.gender.as_deref());
    let gender = gender_word(c.gender.as_deref());

    let born_year = (c.age > 0)
        .then(|| current_year.checked_sub(c.age))
        .flatten();
    let intro = match born_year {
        Some(born) => format!(
            "{} is a {gender} born in {born}. {} is currently {} years old and is part of {}.",
            c.name,
            p.subject_cap(),
            c.age,
            generation_for(born)
        ),
        None => format!("{} is a {gender} with an undisclosed age.", c.name),
    };

    let mut career = if c.is_retiree() {
        format!(" {} is currently retired.", p.subject_cap())
    } else {
        format!(" {} {}.", p.subject_cap(), career_stage(c.age))
    };

    if let Some(occupation) = c.occupation.as_deref().filter(|_| !c.is_retiree()) {
        let field = c
            .occupation_field
            .as_deref()
            .unwrap_or("an undisclosed field");
        career.push_str(&format!(
            " {} works as a {occupation} in the field of {field}.",
            p.subject_cap()
        ));
    }

    let income = if c.income > 0.0 {
        format!(
            " {} monthly income is RM{}.",
            p.possessive_cap(),
            format_amount(c.income)
        )
    } else {
        format!(" {} income is not disclosed.", p.possessive_cap())
    };

    let insurance = match (c.insurance_type.as_deref(), c.insurance_coverage) {
        (Some(kind), Some(coverage)) if coverage != 0.0 => format!(
            "Currently, {} has active insurance {kind} with coverage RM{}.",
            p.subject,
            format_amount(coverage)
        ),
        (Some(kind), _) => format!("Currently, {} has active insurance {kind}.", p.subject),
        (None, _) => format!("Currently, {} has no active insurance.", p.subject),
    };

    format!("{intro}{career}{income} {insurance}")
}

fn student_summary(s: &StudentProfile) -> String {
    let p = Pronouns::for_gender(s.gender.as_deref());
    let gender = disclosed_gender(s.gender.as_deref())
        .map(|g| format!("{g} "))
        .unwrap_or_default();

    let mut text = format!(
        "{} is a {gender}student in {} at {}.",
        s.name, s.form, s.school
    );

    if !s.favourite_subjects.is_empty() {
        text.push_str(&format!(
            " {} likes {} subjects.",
            p.subject_cap(),
            s.favourite_subjects.join(", ")
        ));
    }
    if let Some(frequency) = s.study_frequency.as_deref() {
        text.push_str(&format!(" {} studies {frequency}.", p.subject_cap()));
    }
    if let Some(language) = s.preferred_language.as_deref() {
        text.push_str(&format!(
            " {} preferred language is {language}.",
            p.possessive_cap()
        ));
    }
    text
}

fn gender_word(gender: Option<&str>) -> String {
    disclosed_gender(gender).unwrap_or_else(|| "person".to_owned())
}

/// Lowercased gender, or `None` for blank and `undisclosed` values.
fn disclosed_gender(gender: Option<&str>) -> Option<String> {
    gender
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty() && g != "undisclosed")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
