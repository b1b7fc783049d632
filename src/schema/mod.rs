//! Schema-driven field lookup.
//!
//! Sample payloads are generic value trees. This module walks them by key
//! path and resolves, once per schema document, the unit each measured field
//! is declared in.
//!
//! ```rust
//! use opentrackio::schema::{MeasuredField, SchemaUnits, resolve_path};
//! use serde_json::json;
//!
//! let payload = json!({"lens": {"focusDistance": 2.5}});
//! assert_eq!(resolve_path(&payload, &["lens", "focusDistance"]), Some(&json!(2.5)));
//! assert_eq!(resolve_path(&payload, &["lens", "fStop"]), None);
//!
//! let units = SchemaUnits::from_schema(&json!({"properties": {}}))?;
//! assert!(units.unit(MeasuredField::Translation).is_none());
//! # Ok::<(), opentrackio::ProtocolError>(())
//! ```

mod fields;

pub use fields::{FIELD_TABLE, FieldSpec, MeasuredField, SchemaUnits, UnitResolution};

use serde_json::Value;

/// Walk nested object keys, returning `None` at the first missing key.
pub fn resolve_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}
