//! Structured student analysis returned by the structured-output mode.
//!
//! The record is delivered whole or not at all: [`StructuredAnalysis::parse`]
//! rejects anything that does not carry exactly [`LEARNING_METHOD_COUNT`]
//! complete learning methods.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Number of learning methods every analysis must carry.
pub const LEARNING_METHOD_COUNT: usize = 6;

/// Schema name sent with the structured-output request.
pub const SCHEMA_NAME: &str = "student_analysis";

/// One recommended way for the student to learn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LearningMethod {
    /// Short method name.
    pub name: String,
    /// Why this method suits the student.
    pub rationale: String,
    /// A concrete example activity.
    pub example: String,
    /// A single emoji.
    pub icon: String,
}

/// Dashboard analysis of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredAnalysis {
    /// Free-text reasoning the model used.
    pub reasoning: String,
    /// Persona paragraph.
    pub persona: String,
    /// Concluded language preference.
    pub language_preference: String,
    /// Exactly six learning methods, in the model's order.
    pub learning_methods: Vec<LearningMethod>,
}

/// Why a structured result was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The payload did not deserialize into the record shape.
    #[error("structured output does not match schema: {0}")]
    Shape(String),
    /// Wrong number of learning methods.
    #[error("expected {LEARNING_METHOD_COUNT} learning methods, got {0}")]
    MethodCount(usize),
    /// A required text field was blank.
    #[error("structured output field '{0}' is empty")]
    EmptyField(&'static str),
}

impl StructuredAnalysis {
    /// Deserialize and validate a provider payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the payload is malformed or incomplete.
    pub fn parse(value: Value) -> Result<Self, SchemaError> {
        let analysis: Self =
            serde_json::from_value(value).map_err(|e| SchemaError::Shape(e.to_string()))?;
        analysis.validate()?;
        Ok(analysis)
    }

    /// Check the invariants the schema alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] on the first violated invariant.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.persona.trim().is_empty() {
            return Err(SchemaError::EmptyField("persona"));
        }
        if self.language_preference.trim().is_empty() {
            return Err(SchemaError::EmptyField("language_preference"));
        }
        if self.learning_methods.len() != LEARNING_METHOD_COUNT {
            return Err(SchemaError::MethodCount(self.learning_methods.len()));
        }
        for method in &self.learning_methods {
            if method.name.trim().is_empty() {
                return Err(SchemaError::EmptyField("learning_methods.name"));
            }
            if method.rationale.trim().is_empty() {
                return Err(SchemaError::EmptyField("learning_methods.rationale"));
            }
        }
        Ok(())
    }
}

/// JSON schema for strict structured output.
pub fn output_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["reasoning", "persona", "language_preference", "learning_methods"],
        "properties": {
            "reasoning": { "type": "string" },
            "persona": { "type": "string" },
            "language_preference": { "type": "string" },
            "learning_methods": {
                "type": "array",
                "minItems": LEARNING_METHOD_COUNT,
                "maxItems": LEARNING_METHOD_COUNT,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name", "rationale", "example", "icon"],
                    "properties": {
                        "name": { "type": "string" },
                        "rationale": { "type": "string" },
                        "example": { "type": "string" },
                        "icon": { "type": "string" }
                    }
                }
            }
        }
    })
}
