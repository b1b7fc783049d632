//! Measurement units declared by the schema and requested by callers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{ProtocolError, Result};

/// Length units used for translations, focus distance and sensor geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LengthUnit {
    #[serde(rename = "um")]
    Micrometer,
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[default]
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "in")]
    Inch,
}

impl LengthUnit {
    /// Millimeters in one unit. Millimeters keep the common factors exact.
    const fn millimeters(self) -> f64 {
        match self {
            LengthUnit::Micrometer => 0.001,
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
            LengthUnit::Inch => 25.4,
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: LengthUnit) -> f64 {
        if self == target {
            return value;
        }
        value * self.millimeters() / target.millimeters()
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Micrometer => "um",
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
            LengthUnit::Inch => "in",
        }
    }
}

impl FromStr for LengthUnit {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "um" => Ok(LengthUnit::Micrometer),
            "mm" => Ok(LengthUnit::Millimeter),
            "cm" => Ok(LengthUnit::Centimeter),
            "m" => Ok(LengthUnit::Meter),
            "in" => Ok(LengthUnit::Inch),
            other => Err(ProtocolError::config(format!(
                "Length unit must be one of m, cm, mm, in, um; got '{}'",
                other
            ))),
        }
    }
}

/// Angle units used for rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AngleUnit {
    #[default]
    #[serde(rename = "deg")]
    Degree,
    #[serde(rename = "rad")]
    Radian,
}

impl AngleUnit {
    const fn degrees(self) -> f64 {
        match self {
            AngleUnit::Degree => 1.0,
            AngleUnit::Radian => 180.0 / std::f64::consts::PI,
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: AngleUnit) -> f64 {
        if self == target {
            return value;
        }
        value * self.degrees() / target.degrees()
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            AngleUnit::Degree => "deg",
            AngleUnit::Radian => "rad",
        }
    }
}

impl FromStr for AngleUnit {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deg" => Ok(AngleUnit::Degree),
            "rad" => Ok(AngleUnit::Radian),
            other => {
                Err(ProtocolError::config(format!("Angle unit must be deg or rad; got '{}'", other)))
            }
        }
    }
}

/// A unit as declared by the `units` keyword of the schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Length(LengthUnit),
    Angle(AngleUnit),
    Second,
    Hertz,
    Pixel,
    Sensel,
}

impl Unit {
    /// Map a schema `units` string to a unit this crate can convert.
    pub fn from_schema_name(name: &str) -> Option<Self> {
        let unit = match name {
            "micron" => Unit::Length(LengthUnit::Micrometer),
            "millimeter" => Unit::Length(LengthUnit::Millimeter),
            "centimeter" => Unit::Length(LengthUnit::Centimeter),
            "meter" => Unit::Length(LengthUnit::Meter),
            "inch" => Unit::Length(LengthUnit::Inch),
            "degree" => Unit::Angle(AngleUnit::Degree),
            "radian" => Unit::Angle(AngleUnit::Radian),
            "second" => Unit::Second,
            "hertz" => Unit::Hertz,
            "pixel" => Unit::Pixel,
            "sensel" => Unit::Sensel,
            _ => return None,
        };
        Some(unit)
    }

    /// Convert between units of the same dimension. `None` when the
    /// dimensions differ.
    pub fn convert(self, value: f64, target: Unit) -> Option<f64> {
        match (self, target) {
            (Unit::Length(from), Unit::Length(to)) => Some(from.convert(value, to)),
            (Unit::Angle(from), Unit::Angle(to)) => Some(from.convert(value, to)),
            (from, to) if from == to => Some(value),
            _ => None,
        }
    }

    /// The schema spelling of this unit.
    pub const fn schema_name(self) -> &'static str {
        match self {
            Unit::Length(LengthUnit::Micrometer) => "micron",
            Unit::Length(LengthUnit::Millimeter) => "millimeter",
            Unit::Length(LengthUnit::Centimeter) => "centimeter",
            Unit::Length(LengthUnit::Meter) => "meter",
            Unit::Length(LengthUnit::Inch) => "inch",
            Unit::Angle(AngleUnit::Degree) => "degree",
            Unit::Angle(AngleUnit::Radian) => "radian",
            Unit::Second => "second",
            Unit::Hertz => "hertz",
            Unit::Pixel => "pixel",
            Unit::Sensel => "sensel",
        }
    }
}

/// Presentation of the sample timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeFormat {
    /// Seconds since the PTP epoch as a float
    #[serde(rename = "sec")]
    Seconds,
    /// `HH:MM:SS:FF` measured from midnight
    #[serde(rename = "tc")]
    Timecode,
    /// `year:Y day:D hour:H min:M sec:S nsec:N`
    #[serde(rename = "string")]
    String,
    /// Ordinal date `YYYY-DDDTHH:MM:SS.N`
    #[default]
    #[serde(rename = "iso8601")]
    Iso8601,
}

impl FromStr for TimeFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sec" | "seconds" => Ok(TimeFormat::Seconds),
            "tc" | "timecode" => Ok(TimeFormat::Timecode),
            "string" => Ok(TimeFormat::String),
            "iso8601" => Ok(TimeFormat::Iso8601),
            other => Err(ProtocolError::config(format!(
                "Time format must be sec, tc, string or iso8601; got '{}'",
                other
            ))),
        }
    }
}
