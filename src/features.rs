//! Request fields, model columns, and the adapter between them.
//!
//! Requests use 13 short field names; the model was trained on 13 named
//! columns in a fixed order. The table below is the single source of truth
//! for that mapping. Everything downstream works on `FeatureVector`, a
//! fixed-width array in training order, so a column-order mistake cannot
//! survive past this module.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::errors::{MedvError, MedvResult};

/// Width of the model input. Fixed at training time.
pub const FEATURE_COUNT: usize = 13;

/// One model input: the request field name and the column name the model
/// was trained with.
#[derive(Debug, Clone, Copy)]
pub struct FeatureColumn {
    pub field: &'static str,
    pub column: &'static str,
}

/// Field-to-column table, in training order.
pub const COLUMNS: [FeatureColumn; FEATURE_COUNT] = [
    FeatureColumn { field: "lcr", column: "crim" },
    FeatureColumn { field: "lpz", column: "zn" },
    FeatureColumn { field: "ia", column: "indus" },
    FeatureColumn { field: "wp", column: "chas" },
    FeatureColumn { field: "pl", column: "nox" },
    FeatureColumn { field: "rph", column: "rm" },
    FeatureColumn { field: "age", column: "age" },
    FeatureColumn { field: "dis", column: "dis" },
    FeatureColumn { field: "ha", column: "rad" },
    FeatureColumn { field: "tax", column: "tax" },
    FeatureColumn { field: "ptratio", column: "ptratio" },
    FeatureColumn { field: "ld", column: "b" },
    FeatureColumn { field: "lip", column: "lstat" },
];

/// Column name for a request field, if the field is recognized.
pub fn column_for_field(field: &str) -> Option<&'static str> {
    COLUMNS
        .iter()
        .find(|c| c.field == field)
        .map(|c| c.column)
}

/// Request field name for a model column, if the column is known.
pub fn field_for_column(column: &str) -> Option<&'static str> {
    COLUMNS
        .iter()
        .find(|c| c.column == column)
        .map(|c| c.field)
}

/// Confirm the table is a bijection: every field and every column appears
/// exactly once. The table is `const`, so this can only fail after a bad
/// edit; it runs once at startup so a broken table never serves traffic.
pub fn verify_columns() -> MedvResult<()> {
    let mut fields = HashSet::new();
    let mut columns = HashSet::new();
    for entry in &COLUMNS {
        if !fields.insert(entry.field) {
            return Err(MedvError::config(format!(
                "duplicate request field '{}' in column table",
                entry.field
            )));
        }
        if !columns.insert(entry.column) {
            return Err(MedvError::config(format!(
                "duplicate model column '{}' in column table",
                entry.column
            )));
        }
    }
    Ok(())
}

/// Ordered model input, one slot per column in training order. Immutable
/// once built; created per request and discarded after scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Values received from the caller, keyed by request field name. Only
/// recognized fields are retained, and every retained value has already
/// passed numeric coercion; fields absent here default to 0.0 in `adapt`.
#[derive(Debug, Clone, Default)]
pub struct RawFeatures(HashMap<&'static str, f64>);

impl RawFeatures {
    /// Build from a JSON object. Numbers are taken as-is; strings are
    /// accepted if they parse as a number (callers routinely post form
    /// values re-encoded as JSON strings). Anything else fails fast with
    /// the offending field named, before any model math runs.
    pub fn from_json(object: &Map<String, Value>) -> MedvResult<Self> {
        let mut values = HashMap::new();
        for entry in &COLUMNS {
            match object.get(entry.field) {
                None => {}
                Some(Value::Number(n)) => {
                    let parsed = n.as_f64().ok_or_else(|| {
                        MedvError::validation(entry.field, "value is out of range for a float")
                    })?;
                    values.insert(entry.field, parsed);
                }
                Some(Value::String(s)) => {
                    values.insert(entry.field, Self::parse_number(entry.field, s)?);
                }
                Some(_) => {
                    return Err(MedvError::validation(entry.field, "value is not numeric"));
                }
            }
        }
        Ok(Self(values))
    }

    /// Build from decoded form fields. Form values arrive as strings and
    /// must parse as numbers; unknown fields are ignored.
    pub fn from_form(fields: &HashMap<String, String>) -> MedvResult<Self> {
        let mut values = HashMap::new();
        for entry in &COLUMNS {
            if let Some(s) = fields.get(entry.field) {
                values.insert(entry.field, Self::parse_number(entry.field, s)?);
            }
        }
        Ok(Self(values))
    }

    fn parse_number(field: &str, s: &str) -> MedvResult<f64> {
        s.trim()
            .parse::<f64>()
            .map_err(|_| MedvError::validation(field, "value is not numeric"))
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Place request values into the model's column order. Missing fields
/// default to 0.0; the request contract is deliberately permissive there.
/// Pure and deterministic: the same input mapping always yields the same
/// vector.
pub fn adapt(raw: &RawFeatures) -> FeatureVector {
    let mut values = [0.0; FEATURE_COUNT];
    for (slot, entry) in values.iter_mut().zip(COLUMNS.iter()) {
        if let Some(v) = raw.get(entry.field) {
            *slot = v;
        }
    }
    FeatureVector(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> Map<String, Value> {
        let body = json!({
            "lcr": 0.00632,
            "lpz": 18.0,
            "ia": 2.31,
            "wp": 0.0,
            "pl": 0.538,
            "rph": 6.575,
            "age": 65.2,
            "dis": 4.09,
            "ha": 1.0,
            "tax": 296.0,
            "ptratio": 15.3,
            "ld": 396.9,
            "lip": 4.98
        });
        match body {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn adapt_places_fields_in_training_order() {
        let raw = RawFeatures::from_json(&sample_request()).expect("valid request");
        let vector = adapt(&raw);
        let expected = [
            0.00632, 18.0, 2.31, 0.0, 0.538, 6.575, 65.2, 4.09, 1.0, 296.0, 15.3, 396.9, 4.98,
        ];
        assert_eq!(vector.as_slice(), &expected);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let body = json!({ "rph": 6.5 });
        let raw = RawFeatures::from_json(body.as_object().unwrap()).unwrap();
        let vector = adapt(&raw);
        // rm is the sixth training column
        assert_eq!(vector.as_slice()[5], 6.5);
        let zeros = vector.as_slice().iter().filter(|v| **v == 0.0).count();
        assert_eq!(zeros, FEATURE_COUNT - 1);
    }

    #[test]
    fn empty_request_adapts_to_all_zeros() {
        let raw = RawFeatures::from_json(&Map::new()).unwrap();
        assert!(raw.is_empty());
        assert_eq!(adapt(&raw).as_slice(), &[0.0; FEATURE_COUNT]);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let body = json!({ "tax": "296.0", "age": " 65.2 " });
        let raw = RawFeatures::from_json(body.as_object().unwrap()).unwrap();
        assert_eq!(raw.get("tax"), Some(296.0));
        assert_eq!(raw.get("age"), Some(65.2));
    }

    #[test]
    fn non_numeric_value_names_the_field() {
        let body = json!({ "lcr": "downtown" });
        let err = RawFeatures::from_json(body.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("lcr"));

        let body = json!({ "wp": true });
        let err = RawFeatures::from_json(body.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("wp"));

        let body = json!({ "dis": null });
        let err = RawFeatures::from_json(body.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("dis"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let body = json!({ "rph": 6.5, "basement": 1.0 });
        let raw = RawFeatures::from_json(body.as_object().unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn form_fields_parse_or_fail_by_name() {
        let mut fields = HashMap::new();
        fields.insert("tax".to_string(), "296".to_string());
        let raw = RawFeatures::from_form(&fields).unwrap();
        assert_eq!(raw.get("tax"), Some(296.0));

        fields.insert("ptratio".to_string(), "".to_string());
        let err = RawFeatures::from_form(&fields).unwrap_err();
        assert!(err.to_string().contains("ptratio"));
    }

    #[test]
    fn column_table_is_a_bijection() {
        verify_columns().expect("table verifies");
        for entry in &COLUMNS {
            let column = column_for_field(entry.field).expect("field maps to a column");
            assert_eq!(field_for_column(column), Some(entry.field));
        }
        assert_eq!(COLUMNS.len(), FEATURE_COUNT);
    }
}
