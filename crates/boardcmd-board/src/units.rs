use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length unit accepted from callers. Board files are always millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Mm,
    #[serde(alias = "in")]
    Inch,
}

impl Unit {
    pub const MM_PER_INCH: f64 = 25.4;

    pub fn to_mm(self, value: f64) -> f64 {
        match self {
            Unit::Mm => value,
            Unit::Inch => value * Self::MM_PER_INCH,
        }
    }

    pub fn from_mm(self, value: f64) -> f64 {
        match self {
            Unit::Mm => value,
            Unit::Inch => value / Self::MM_PER_INCH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Mm => "mm",
            Unit::Inch => "inch",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mm" => Ok(Unit::Mm),
            "inch" | "in" => Ok(Unit::Inch),
            other => Err(format!("Unknown unit '{other}', expected 'mm' or 'inch'")),
        }
    }
}
