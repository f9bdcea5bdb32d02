//! Parameter decoding and result maps shared by the handlers.

use crate::BoardRef;
use boardcmd_board::{Board, Point, Unit};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub type Params = Map<String, Value>;
pub type OperationResult = Map<String, Value>;

/// What a handler reports when an operation cannot be carried out.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub details: String,
}

impl Failure {
    pub fn new(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn no_board() -> Self {
        Self::new("No board is loaded", "Load or create a board first")
    }

    pub fn invalid(details: impl Into<String>) -> Self {
        Self::new("Invalid parameters", details)
    }

    pub fn into_result(self) -> OperationResult {
        let mut result = Map::new();
        result.insert("success".into(), Value::Bool(false));
        result.insert("message".into(), Value::String(self.message));
        result.insert("errorDetails".into(), Value::String(self.details));
        result
    }
}

pub(crate) type Outcome = Result<OperationResult, Failure>;

/// A successful result carrying `payload` under `key`.
pub(crate) fn success(message: impl Into<String>, key: &str, payload: impl Serialize) -> Outcome {
    let payload = serde_json::to_value(payload)
        .map_err(|e| Failure::new("Failed to encode result", e.to_string()))?;
    let mut result = Map::new();
    result.insert("success".into(), Value::Bool(true));
    result.insert("message".into(), Value::String(message.into()));
    result.insert(key.to_string(), payload);
    Ok(result)
}

/// Decode the parameter map into an operation's argument struct.
pub(crate) fn decode<T: DeserializeOwned>(params: Params) -> Result<T, Failure> {
    serde_json::from_value(Value::Object(params)).map_err(|e| Failure::invalid(e.to_string()))
}

/// Run `f` against the locked board, or report that none is loaded.
pub(crate) fn with_board(
    board: Option<&BoardRef>,
    f: impl FnOnce(&mut Board) -> Outcome,
) -> OperationResult {
    let outcome = match board {
        Some(board) => f(&mut board.lock()),
        None => Err(Failure::no_board()),
    };
    outcome.unwrap_or_else(Failure::into_result)
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<f64, Failure> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Failure::invalid(format!(
            "{name} must be greater than zero, got {value}"
        )))
    }
}

/// A `{x, y, unit?}` position.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub unit: Unit,
}

impl Position {
    pub fn to_mm(self) -> Point {
        Point::new(self.unit.to_mm(self.x), self.unit.to_mm(self.y))
    }
}

/// A point reported back to the caller in `unit`.
pub(crate) fn point_json(p: Point, unit: Unit) -> Value {
    json!({
        "x": unit.from_mm(p.x),
        "y": unit.from_mm(p.y),
        "unit": unit.as_str(),
    })
}
