//! Schema-driven unit conversion through the public API

mod common;

use std::io::Write;

use anyhow::Result;
use opentrackio::sample::{Conversion, SampleTime, TranslationAxis};
use opentrackio::schema::MeasuredField;
use opentrackio::{AngleUnit, LengthUnit, Sample, SampleDecoder, SchemaUnits, TimeFormat, Unit};
use proptest::prelude::*;

use common::sample_at;

fn decoder() -> SampleDecoder {
    SampleDecoder::new(SchemaUnits::from_json_str(common::schema_text()).expect("schema parses"))
}

#[test]
fn one_meter_reads_as_one_hundred_centimeters() {
    let sample = Sample::from_value(sample_at([0.0, 0.0, 1.0]));
    let mut decoder = decoder();
    decoder.set_translation_units(LengthUnit::Centimeter);

    let t = decoder.camera_translations(&sample).unwrap();
    assert_eq!((t.value.x, t.value.y), (0.0, 0.0));
    assert!((t.value.z - 100.0).abs() < 1e-9);
    assert_eq!(
        t.conversion,
        Conversion::Applied {
            from: Unit::Length(LengthUnit::Meter),
            to: Unit::Length(LengthUnit::Centimeter)
        }
    );
}

#[test]
fn rotation_converts_to_radians() {
    let sample = Sample::from_value(sample_at([0.0, 0.0, 0.0]));
    let mut decoder = decoder();
    decoder.set_rotation_units(AngleUnit::Radian);

    let r = decoder.camera_rotations(&sample).unwrap();
    assert!((r.value.pan - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
}

#[test]
fn undeclared_units_are_reported_not_guessed() {
    let schema = SchemaUnits::from_json_str(r#"{"properties": {}}"#).unwrap();
    let mut decoder = SampleDecoder::new(schema);
    decoder.set_translation_units(LengthUnit::Millimeter);

    let sample = Sample::from_value(sample_at([0.0, 0.0, 1.0]));
    let z = decoder.translation(&sample, "Camera", TranslationAxis::Z).unwrap();
    assert_eq!(z.value, 1.0);
    assert_eq!(z.conversion, Conversion::Unresolved);
}

#[test]
fn focus_distance_and_focal_length() {
    let sample = Sample::from_value(sample_at([0.0, 0.0, 0.0]));
    let mut decoder = decoder();
    decoder.set_focus_distance_units(LengthUnit::Millimeter);

    assert!((decoder.focus_distance(&sample).unwrap().value - 2500.0).abs() < 1e-9);
    assert_eq!(decoder.focal_length(&sample).unwrap().value, 35.0);
}

#[test]
fn sample_time_presentations() {
    let sample = Sample::from_value(sample_at([0.0, 0.0, 0.0]));
    let mut decoder = decoder();

    assert_eq!(
        decoder.sample_time(&sample),
        Some(SampleTime::Text("1970-000T00:01:40.0".to_string()))
    );

    decoder.set_time_format(TimeFormat::Seconds);
    assert_eq!(decoder.sample_time(&sample), Some(SampleTime::Seconds(100.0)));
}

#[test]
fn schema_loads_from_disk() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(common::schema_text().as_bytes())?;

    let units = SchemaUnits::from_file(file.path())?;
    assert_eq!(units.unit(MeasuredField::Rotation), Some(Unit::Angle(AngleUnit::Degree)));
    assert_eq!(units.unit(MeasuredField::SampleTimestamp), None);
    Ok(())
}

proptest! {
    #[test]
    fn centimeters_back_to_meters_is_identity(z in -1.0e4f64..1.0e4) {
        let sample = Sample::from_value(sample_at([0.0, 0.0, z]));
        let mut decoder = decoder();
        decoder.set_translation_units(LengthUnit::Centimeter);
        let in_cm = decoder.translation(&sample, "Camera", TranslationAxis::Z).unwrap();

        let back = in_cm.in_declared_unit();
        prop_assert!((back - z).abs() <= 1e-9 * z.abs().max(1.0));
    }
}
