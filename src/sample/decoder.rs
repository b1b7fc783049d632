//! Unit-converting accessors over decoded samples

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::Sample;
use crate::schema::{MeasuredField, SchemaUnits};
use crate::types::{AngleUnit, LengthUnit, SampleTimeParts, TimeFormat, Unit};

/// Transform id matched by the `camera_*` accessors.
pub const DEFAULT_TRANSFORM_ID: &str = "Camera";

/// Units and presentation the caller wants measurements in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitPreferences {
    pub translation: LengthUnit,
    pub rotation: AngleUnit,
    pub focus_distance: LengthUnit,
    pub time_format: TimeFormat,
}

/// Whether a measurement was converted from its declared unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Converted from the schema-declared unit into the requested one
    Applied { from: Unit, to: Unit },
    /// Returned as carried in the payload: the schema declares no unit, an
    /// unrecognized one, or one of a different dimension
    Unresolved,
}

/// A payload value together with how it was converted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement<T> {
    pub value: T,
    pub conversion: Conversion,
}

impl<T> Measurement<T> {
    pub fn is_converted(&self) -> bool {
        matches!(self.conversion, Conversion::Applied { .. })
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Measurement<U> {
        Measurement { value: f(self.value), conversion: self.conversion }
    }
}

impl Measurement<f64> {
    /// The value expressed back in the schema-declared unit.
    pub fn in_declared_unit(&self) -> f64 {
        match self.conversion {
            Conversion::Applied { from, to } => to.convert(self.value, from).unwrap_or(self.value),
            Conversion::Unresolved => self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pan: f64,
    pub tilt: f64,
    pub roll: f64,
}

/// Physical size of the active sensor area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorDimensions {
    pub height: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationAxis {
    X,
    Y,
    Z,
}

impl TranslationAxis {
    pub const fn key(self) -> &'static str {
        match self {
            TranslationAxis::X => "x",
            TranslationAxis::Y => "y",
            TranslationAxis::Z => "z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationAxis {
    Pan,
    Tilt,
    Roll,
}

impl RotationAxis {
    pub const fn key(self) -> &'static str {
        match self {
            RotationAxis::Pan => "pan",
            RotationAxis::Tilt => "tilt",
            RotationAxis::Roll => "roll",
        }
    }
}

/// A sample timestamp in one of the [`TimeFormat`] presentations.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleTime {
    Seconds(f64),
    Text(String),
}

impl SampleTime {
    pub fn as_secs(&self) -> Option<f64> {
        match self {
            SampleTime::Seconds(secs) => Some(*secs),
            SampleTime::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleTime::Seconds(_) => None,
            SampleTime::Text(text) => Some(text),
        }
    }
}

/// Reads measurements out of samples in the caller's preferred units.
///
/// Built once from the schema's resolved units. Preferences change only
/// through the setters and apply to every subsequent accessor call.
#[derive(Debug, Clone, Default)]
pub struct SampleDecoder {
    units: SchemaUnits,
    preferences: UnitPreferences,
}

impl SampleDecoder {
    pub fn new(units: SchemaUnits) -> Self {
        Self { units, preferences: UnitPreferences::default() }
    }

    pub fn with_preferences(units: SchemaUnits, preferences: UnitPreferences) -> Self {
        Self { units, preferences }
    }

    pub fn units(&self) -> &SchemaUnits {
        &self.units
    }

    pub fn preferences(&self) -> UnitPreferences {
        self.preferences
    }

    pub fn set_translation_units(&mut self, unit: LengthUnit) {
        self.warn_if_unconvertible(MeasuredField::Translation);
        self.preferences.translation = unit;
    }

    pub fn set_rotation_units(&mut self, unit: AngleUnit) {
        self.warn_if_unconvertible(MeasuredField::Rotation);
        self.preferences.rotation = unit;
    }

    pub fn set_focus_distance_units(&mut self, unit: LengthUnit) {
        self.warn_if_unconvertible(MeasuredField::FocusDistance);
        self.preferences.focus_distance = unit;
    }

    pub fn set_time_format(&mut self, format: TimeFormat) {
        self.preferences.time_format = format;
    }

    fn warn_if_unconvertible(&self, field: MeasuredField) {
        if self.units.unit(field).is_none() {
            debug!(
                "No recognized schema unit for {:?}; values will be returned unconverted",
                field
            );
        }
    }

    /// Convert `value` of `field` into `target` if the declared unit allows it.
    fn measure(&self, field: MeasuredField, value: f64, target: Unit) -> Measurement<f64> {
        let converted = self
            .units
            .unit(field)
            .and_then(|from| from.convert(value, target).map(|v| (from, v)));
        match converted {
            Some((from, value)) => {
                Measurement { value, conversion: Conversion::Applied { from, to: target } }
            }
            None => Measurement { value, conversion: Conversion::Unresolved },
        }
    }

    fn transform_component(
        &self,
        sample: &Sample,
        field: MeasuredField,
        id: &str,
        key: &str,
    ) -> Option<f64> {
        let transform = sample.transform(id)?;
        field.locate(transform)?.get(key)?.as_f64()
    }

    /// One translation axis of the first transform whose id contains `id`.
    pub fn translation(
        &self,
        sample: &Sample,
        id: &str,
        axis: TranslationAxis,
    ) -> Option<Measurement<f64>> {
        let raw = self.transform_component(sample, MeasuredField::Translation, id, axis.key())?;
        Some(self.measure(
            MeasuredField::Translation,
            raw,
            Unit::Length(self.preferences.translation),
        ))
    }

    /// All three translation axes; `None` unless every axis is present.
    pub fn translations(&self, sample: &Sample, id: &str) -> Option<Measurement<Translation>> {
        let x = self.translation(sample, id, TranslationAxis::X)?;
        let y = self.translation(sample, id, TranslationAxis::Y)?;
        let z = self.translation(sample, id, TranslationAxis::Z)?;
        Some(x.map(|x| Translation { x, y: y.value, z: z.value }))
    }

    pub fn rotation(
        &self,
        sample: &Sample,
        id: &str,
        axis: RotationAxis,
    ) -> Option<Measurement<f64>> {
        let raw = self.transform_component(sample, MeasuredField::Rotation, id, axis.key())?;
        Some(self.measure(MeasuredField::Rotation, raw, Unit::Angle(self.preferences.rotation)))
    }

    /// All three rotation axes; `None` unless every axis is present.
    pub fn rotations(&self, sample: &Sample, id: &str) -> Option<Measurement<Rotation>> {
        let pan = self.rotation(sample, id, RotationAxis::Pan)?;
        let tilt = self.rotation(sample, id, RotationAxis::Tilt)?;
        let roll = self.rotation(sample, id, RotationAxis::Roll)?;
        Some(pan.map(|pan| Rotation { pan, tilt: tilt.value, roll: roll.value }))
    }

    pub fn camera_translation(
        &self,
        sample: &Sample,
        axis: TranslationAxis,
    ) -> Option<Measurement<f64>> {
        self.translation(sample, DEFAULT_TRANSFORM_ID, axis)
    }

    pub fn camera_translations(&self, sample: &Sample) -> Option<Measurement<Translation>> {
        self.translations(sample, DEFAULT_TRANSFORM_ID)
    }

    pub fn camera_rotation(&self, sample: &Sample, axis: RotationAxis) -> Option<Measurement<f64>> {
        self.rotation(sample, DEFAULT_TRANSFORM_ID, axis)
    }

    pub fn camera_rotations(&self, sample: &Sample) -> Option<Measurement<Rotation>> {
        self.rotations(sample, DEFAULT_TRANSFORM_ID)
    }

    fn scalar(&self, sample: &Sample, field: MeasuredField, target: Unit) -> Option<Measurement<f64>> {
        let raw = field.locate(sample.value())?.as_f64()?;
        Some(self.measure(field, raw, target))
    }

    /// Focus distance in the preferred focus-distance unit.
    pub fn focus_distance(&self, sample: &Sample) -> Option<Measurement<f64>> {
        let target = Unit::Length(self.preferences.focus_distance);
        self.scalar(sample, MeasuredField::FocusDistance, target)
    }

    /// Focal length in millimeters. Reads `pinholeFocalLength`, falling back
    /// to `focalLength`.
    pub fn focal_length(&self, sample: &Sample) -> Option<Measurement<f64>> {
        self.scalar(sample, MeasuredField::FocalLength, Unit::Length(LengthUnit::Millimeter))
    }

    /// Entrance pupil offset in the preferred translation unit.
    pub fn entrance_pupil_offset(&self, sample: &Sample) -> Option<Measurement<f64>> {
        let target = Unit::Length(self.preferences.translation);
        self.scalar(sample, MeasuredField::EntrancePupilOffset, target)
    }

    /// Physical active sensor size in millimeters, from the static block.
    pub fn sensor_physical_dimensions(
        &self,
        sample: &Sample,
    ) -> Option<Measurement<SensorDimensions>> {
        let field = MeasuredField::SensorPhysicalDimensions;
        let dims = field.locate(sample.value())?;
        let axis = |key: &str| dims.get(key).and_then(Value::as_f64);
        let target = Unit::Length(LengthUnit::Millimeter);
        let height = self.measure(field, axis("height")?, target);
        let width = self.measure(field, axis("width")?, target);
        Some(height.map(|height| SensorDimensions { height, width: width.value }))
    }

    /// Unit string the schema declares for the sensor physical dimensions.
    pub fn sensor_dimension_units(&self) -> Option<&str> {
        self.units.resolution(MeasuredField::SensorPhysicalDimensions).declared_name()
    }

    /// Calendar decomposition of the sample timestamp.
    pub fn sample_time_parts(&self, sample: &Sample) -> Option<SampleTimeParts> {
        sample.sample_timestamp().map(|stamp| stamp.parts())
    }

    /// Sample timestamp in the preferred presentation.
    pub fn sample_time(&self, sample: &Sample) -> Option<SampleTime> {
        self.sample_time_as(sample, self.preferences.time_format)
    }

    /// Sample timestamp in `format`.
    ///
    /// The timecode presentation needs the timecode frame rate; without one
    /// it yields `None`.
    pub fn sample_time_as(&self, sample: &Sample, format: TimeFormat) -> Option<SampleTime> {
        let stamp = sample.sample_timestamp()?;
        let time = match format {
            TimeFormat::Seconds => SampleTime::Seconds(stamp.as_secs_f64()),
            TimeFormat::Timecode => {
                SampleTime::Text(stamp.parts().timecode(sample.timecode_frame_rate()?))
            }
            TimeFormat::String => SampleTime::Text(stamp.parts().to_string()),
            TimeFormat::Iso8601 => SampleTime::Text(stamp.parts().iso8601()),
        };
        Some(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SampleBuilder, schema_document};
    use proptest::prelude::*;
    use serde_json::json;

    fn decoder() -> SampleDecoder {
        SampleDecoder::new(SchemaUnits::from_schema(&schema_document()).unwrap())
    }

    #[test]
    fn one_meter_reads_as_one_hundred_centimeters() {
        let sample = SampleBuilder::new().translation(0.0, 0.0, 1.0).build();
        let mut decoder = decoder();
        decoder.set_translation_units(LengthUnit::Centimeter);

        let z = decoder.camera_translation(&sample, TranslationAxis::Z).unwrap();
        assert_eq!(z.value, 100.0);
        assert_eq!(
            z.conversion,
            Conversion::Applied {
                from: Unit::Length(LengthUnit::Meter),
                to: Unit::Length(LengthUnit::Centimeter)
            }
        );

        let all = decoder.camera_translations(&sample).unwrap();
        assert_eq!(all.value, Translation { x: 0.0, y: 0.0, z: 100.0 });
    }

    #[test]
    fn rotations_convert_to_radians() {
        let sample = SampleBuilder::new().rotation(180.0, -90.0, 0.0).build();
        let mut decoder = decoder();
        decoder.set_rotation_units(AngleUnit::Radian);

        let rotation = decoder.camera_rotations(&sample).unwrap().value;
        assert!((rotation.pan - std::f64::consts::PI).abs() < 1e-12);
        assert!((rotation.tilt + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(rotation.roll, 0.0);
    }

    #[test]
    fn missing_schema_returns_raw_values() {
        let sample = SampleBuilder::new().translation(1.5, 2.5, 3.5).build();
        let mut decoder = SampleDecoder::default();
        decoder.set_translation_units(LengthUnit::Millimeter);

        let x = decoder.camera_translation(&sample, TranslationAxis::X).unwrap();
        assert_eq!(x.value, 1.5);
        assert_eq!(x.conversion, Conversion::Unresolved);
        assert!(!x.is_converted());
    }

    #[test]
    fn mismatched_dimension_is_unresolved() {
        let schema = json!({"properties": {"transforms": {"items": {"properties": {
            "translation": {"units": "degree"}
        }}}}});
        let decoder = SampleDecoder::new(SchemaUnits::from_schema(&schema).unwrap());
        let sample = SampleBuilder::new().translation(1.0, 2.0, 3.0).build();
        let y = decoder.camera_translation(&sample, TranslationAxis::Y).unwrap();
        assert_eq!(y.value, 2.0);
        assert_eq!(y.conversion, Conversion::Unresolved);
    }

    #[test]
    fn named_transform_lookup() {
        let sample = Sample::from_value(json!({"transforms": [
            {"id": "Crane", "translation": {"x": 9.0, "y": 9.0, "z": 9.0}},
            {"id": "Camera", "translation": {"x": 1.0, "y": 2.0, "z": 3.0}},
        ]}));
        let decoder = decoder();
        let crane = decoder.translations(&sample, "Crane").unwrap().value;
        assert_eq!(crane.x, 9.0);
        let camera = decoder.camera_translations(&sample).unwrap().value;
        assert_eq!(camera, Translation { x: 1.0, y: 2.0, z: 3.0 });
        assert!(decoder.translations(&sample, "Jib").is_none());
        assert!(decoder.camera_rotations(&sample).is_none());
    }

    #[test]
    fn lens_measurements() {
        let sample = SampleBuilder::new().focus_distance(2.5).build();
        let mut decoder = decoder();
        decoder.set_focus_distance_units(LengthUnit::Millimeter);

        assert_eq!(decoder.focus_distance(&sample).unwrap().value, 2500.0);
        let focal = decoder.focal_length(&sample).unwrap();
        assert_eq!(focal.value, 24.305);
        assert!(focal.is_converted());

        decoder.set_translation_units(LengthUnit::Centimeter);
        let pupil = decoder.entrance_pupil_offset(&sample).unwrap();
        assert!((pupil.value - 12.3).abs() < 1e-9);
    }

    #[test]
    fn focal_length_falls_back_to_legacy_key() {
        let sample = Sample::from_value(json!({"lens": {"focalLength": 35.0}}));
        assert_eq!(SampleDecoder::default().focal_length(&sample).unwrap().value, 35.0);
    }

    #[test]
    fn sensor_dimensions() {
        let sample = SampleBuilder::new().with_static_block().build();
        let decoder = decoder();
        let dims = decoder.sensor_physical_dimensions(&sample).unwrap();
        assert_eq!(dims.value, SensorDimensions { height: 24.0, width: 36.0 });
        assert_eq!(decoder.sensor_dimension_units(), Some("millimeter"));
        assert_eq!(SampleDecoder::default().sensor_dimension_units(), None);
    }

    #[test]
    fn sample_time_presentations() {
        // Day 1 of 1971, 13:45:30.5
        let seconds = 31_536_000 + 86_400 + 13 * 3_600 + 45 * 60 + 30;
        let sample = SampleBuilder::new().timestamp(seconds, 500_000_000).build();
        let mut decoder = decoder();
        assert_eq!(
            decoder.sample_time(&sample).unwrap().as_text(),
            Some("1971-001T13:45:30.500000000")
        );

        decoder.set_time_format(TimeFormat::Seconds);
        let secs = decoder.sample_time(&sample).unwrap().as_secs().unwrap();
        assert!((secs - (seconds as f64 + 0.5)).abs() < 1e-6);

        decoder.set_time_format(TimeFormat::Timecode);
        // 24000/1001 fps: floor(0.5 * 23.976) = 11
        assert_eq!(decoder.sample_time(&sample).unwrap().as_text(), Some("13:45:30:11"));

        decoder.set_time_format(TimeFormat::String);
        assert_eq!(
            decoder.sample_time(&sample).unwrap().as_text(),
            Some("year:1971 day:1 hour:13 min:45 sec:30 nsec:500000000")
        );

        assert_eq!(
            decoder.sample_time_as(&sample, TimeFormat::Iso8601).unwrap().as_text(),
            Some("1971-001T13:45:30.500000000")
        );

        let parts = decoder.sample_time_parts(&sample).unwrap();
        assert_eq!((parts.year, parts.day, parts.hour), (1971, 1, 13));
    }

    #[test]
    fn timecode_presentation_needs_a_frame_rate() {
        let sample = Sample::from_value(json!({
            "timing": {"sampleTimestamp": {"seconds": 10, "nanoseconds": 0}}
        }));
        let decoder = decoder();
        assert!(decoder.sample_time_as(&sample, TimeFormat::Timecode).is_none());
        assert!(decoder.sample_time_as(&sample, TimeFormat::Seconds).is_some());
    }

    proptest! {
        #[test]
        fn centimeter_reading_reconverts_to_declared_meters(
            x in -1.0e4f64..1.0e4,
            y in -1.0e4f64..1.0e4,
            z in -1.0e4f64..1.0e4,
        ) {
            let sample = SampleBuilder::new().translation(x, y, z).build();
            let mut decoder = decoder();
            decoder.set_translation_units(LengthUnit::Centimeter);

            for (axis, raw) in [(TranslationAxis::X, x), (TranslationAxis::Y, y), (TranslationAxis::Z, z)] {
                let reading = decoder.camera_translation(&sample, axis).unwrap();
                prop_assert!((reading.value - raw * 100.0).abs() <= 1e-9 * raw.abs().max(1.0) * 100.0);
                prop_assert!((reading.in_declared_unit() - raw).abs() <= 1e-9 * raw.abs().max(1.0));
            }
        }
    }
}
