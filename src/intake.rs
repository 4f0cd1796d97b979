//! Boundary to whatever turns a user's request into a structured one.
//!
//! The engine never depends on how interpretation is done. A free-text
//! interpreter lives outside this crate and implements [`RequestInterpreter`];
//! [`JsonInterpreter`] covers callers that already send structured JSON.

use serde_json::Value;

use crate::error::ParseError;
use crate::pipeline::GenerationRequest;
use crate::refinement::Delta;

/// A structured request.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Generate(GenerationRequest),
    Refine(Delta),
}

/// Turns request text into an [`Interpretation`].
pub trait RequestInterpreter {
    /// `prior` is the request behind the caller's current schedule, if any.
    ///
    /// # Errors
    /// [`ParseError`] when the text cannot be understood, or asks for a
    /// refinement with nothing to refine.
    fn interpret(&self, text: &str, prior: Option<&GenerationRequest>) -> Result<Interpretation, ParseError>;
}

/// Reads `{"generate": <GenerationRequest>}` or `{"refine": <Delta>}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInterpreter;

impl RequestInterpreter for JsonInterpreter {
    fn interpret(&self, text: &str, prior: Option<&GenerationRequest>) -> Result<Interpretation, ParseError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ParseError::Malformed(e.to_string()))?;
        let Value::Object(mut envelope) = value else {
            return Err(ParseError::Malformed("expected a JSON object".into()));
        };
        if envelope.len() != 1 {
            return Err(ParseError::Malformed(format!(
                "expected exactly one intent key, found {}",
                envelope.len()
            )));
        }

        if let Some(body) = envelope.remove("generate") {
            let request = serde_json::from_value(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
            return Ok(Interpretation::Generate(request));
        }
        if let Some(body) = envelope.remove("refine") {
            if prior.is_none() {
                return Err(ParseError::MissingPrior);
            }
            let delta = serde_json::from_value(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
            return Ok(Interpretation::Refine(delta));
        }

        let intent = envelope.keys().next().cloned().unwrap_or_default();
        Err(ParseError::UnsupportedIntent(intent))
    }
}
