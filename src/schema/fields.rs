//! Declarative table of unit-bearing sample fields
//!
//! Each measured field names where its value lives in a sample payload and
//! where its `units` declaration lives in the schema document. The table is
//! resolved once into [`SchemaUnits`] when a decoder is built.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use super::resolve_path;
use crate::types::{AngleUnit, LengthUnit, Unit};
use crate::{ProtocolError, Result};

/// A sample field whose numeric value carries a schema-declared unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasuredField {
    Translation,
    Rotation,
    FocusDistance,
    FocalLength,
    EntrancePupilOffset,
    SampleTimestamp,
    SensorPhysicalDimensions,
}

/// Location and expected unit of one [`MeasuredField`].
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: MeasuredField,
    /// Candidate payload paths, first present wins. Transform fields are
    /// relative to one entry of `transforms`.
    pub payload_paths: &'static [&'static [&'static str]],
    /// Candidate schema paths to the `units` keyword, first present wins.
    pub schema_paths: &'static [&'static [&'static str]],
    /// Unit the field is expected to be declared in.
    pub expected: Unit,
}

/// Every unit-bearing field the decoder knows about.
pub const FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec {
        field: MeasuredField::Translation,
        payload_paths: &[&["translation"]],
        schema_paths: &[
            &["properties", "transforms", "items", "properties", "translation", "units"],
            &["properties", "transforms", "items", "items", "properties", "translation", "units"],
        ],
        expected: Unit::Length(LengthUnit::Meter),
    },
    FieldSpec {
        field: MeasuredField::Rotation,
        payload_paths: &[&["rotation"]],
        schema_paths: &[
            &["properties", "transforms", "items", "properties", "rotation", "units"],
            &["properties", "transforms", "items", "items", "properties", "rotation", "units"],
        ],
        expected: Unit::Angle(AngleUnit::Degree),
    },
    FieldSpec {
        field: MeasuredField::FocusDistance,
        payload_paths: &[&["lens", "focusDistance"]],
        schema_paths: &[&["properties", "lens", "properties", "focusDistance", "units"]],
        expected: Unit::Length(LengthUnit::Meter),
    },
    FieldSpec {
        field: MeasuredField::FocalLength,
        payload_paths: &[&["lens", "pinholeFocalLength"], &["lens", "focalLength"]],
        schema_paths: &[
            &["properties", "lens", "properties", "pinholeFocalLength", "units"],
            &["properties", "lens", "properties", "focalLength", "units"],
        ],
        expected: Unit::Length(LengthUnit::Millimeter),
    },
    FieldSpec {
        field: MeasuredField::EntrancePupilOffset,
        payload_paths: &[&["lens", "entrancePupilOffset"]],
        schema_paths: &[&["properties", "lens", "properties", "entrancePupilOffset", "units"]],
        expected: Unit::Length(LengthUnit::Meter),
    },
    FieldSpec {
        field: MeasuredField::SampleTimestamp,
        payload_paths: &[&["timing", "sampleTimestamp"]],
        schema_paths: &[&["properties", "timing", "properties", "sampleTimestamp", "units"]],
        expected: Unit::Second,
    },
    FieldSpec {
        field: MeasuredField::SensorPhysicalDimensions,
        payload_paths: &[&["static", "camera", "activeSensorPhysicalDimensions"]],
        schema_paths: &[
            &[
                "properties",
                "static",
                "properties",
                "camera",
                "properties",
                "activeSensorPhysicalDimensions",
                "units",
            ],
            &["properties", "camera", "properties", "activeSensorPhysicalDimensions", "units"],
        ],
        expected: Unit::Length(LengthUnit::Millimeter),
    },
];

impl MeasuredField {
    /// Table entry for this field.
    pub fn spec(self) -> &'static FieldSpec {
        let row = match self {
            MeasuredField::Translation => 0,
            MeasuredField::Rotation => 1,
            MeasuredField::FocusDistance => 2,
            MeasuredField::FocalLength => 3,
            MeasuredField::EntrancePupilOffset => 4,
            MeasuredField::SampleTimestamp => 5,
            MeasuredField::SensorPhysicalDimensions => 6,
        };
        &FIELD_TABLE[row]
    }

    /// First payload value present for this field, relative to `root`.
    pub fn locate<'a>(self, root: &'a Value) -> Option<&'a Value> {
        self.spec().payload_paths.iter().find_map(|path| resolve_path(root, path))
    }
}

/// Outcome of looking up one field's declared unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitResolution {
    /// The schema declares a unit this crate converts
    Known(Unit),
    /// The schema declares a unit string this crate does not recognize
    Unrecognized(String),
    /// The schema does not declare a unit for the field
    Missing,
}

impl UnitResolution {
    pub fn unit(&self) -> Option<Unit> {
        match self {
            UnitResolution::Known(unit) => Some(*unit),
            _ => None,
        }
    }

    /// The declared unit string, whether recognized or not.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            UnitResolution::Known(unit) => Some(unit.schema_name()),
            UnitResolution::Unrecognized(name) => Some(name),
            UnitResolution::Missing => None,
        }
    }
}

/// Declared units of every [`MeasuredField`], resolved from one schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaUnits {
    resolved: HashMap<MeasuredField, UnitResolution>,
}

impl Default for SchemaUnits {
    /// No schema: every field resolves to [`UnitResolution::Missing`].
    fn default() -> Self {
        let resolved = FIELD_TABLE.iter().map(|s| (s.field, UnitResolution::Missing)).collect();
        Self { resolved }
    }
}

impl SchemaUnits {
    /// Resolve the field table against a schema document.
    ///
    /// Fails if the document is not an object or if a `units` keyword on a
    /// table path is not a string. Absent or unrecognized units are recorded,
    /// not rejected.
    pub fn from_schema(schema: &Value) -> Result<Self> {
        if !schema.is_object() {
            return Err(ProtocolError::schema("schema root", "document is not a JSON object"));
        }

        let mut resolved = HashMap::with_capacity(FIELD_TABLE.len());
        for spec in FIELD_TABLE {
            let declared = spec.schema_paths.iter().find_map(|path| {
                resolve_path(schema, path).map(|value| (path.join("."), value))
            });

            let resolution = match declared {
                None => {
                    debug!("Schema declares no units for {:?}", spec.field);
                    UnitResolution::Missing
                }
                Some((path, Value::String(name))) => match Unit::from_schema_name(name) {
                    Some(unit) => UnitResolution::Known(unit),
                    None => {
                        warn!("Unrecognized unit '{}' at {}", name, path);
                        UnitResolution::Unrecognized(name.clone())
                    }
                },
                Some((path, other)) => {
                    return Err(ProtocolError::schema(
                        path,
                        format!("units must be a string, found {}", other),
                    ));
                }
            };
            resolved.insert(spec.field, resolution);
        }

        Ok(Self { resolved })
    }

    /// Parse schema JSON text and resolve it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::schema("schema document", e.to_string()))?;
        Self::from_schema(&schema)
    }

    /// Read a schema file and resolve it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::io(format!("reading schema {}", path.display()), e))?;
        Self::from_json_str(&text)
    }

    pub fn resolution(&self, field: MeasuredField) -> &UnitResolution {
        self.resolved.get(&field).unwrap_or(&UnitResolution::Missing)
    }

    /// Declared unit for `field`, if recognized.
    pub fn unit(&self, field: MeasuredField) -> Option<Unit> {
        self.resolution(field).unit()
    }
}
