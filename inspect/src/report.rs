//! Builds the format registry report for one payload.

use crate::error::AppResult;
use datatypes_engine::{Error, FormatFinder, FormatId, ROOT_FORMAT_ID};
use serde_json::{json, Map, Value};

/// Scan `payload` completely and describe every registered format.
///
/// The report carries the whole registry under `formats` (keyed by id) and
/// the requested format under `resolved`, or `null` when the payload never
/// defines it.
pub fn inspect(payload: &Value, format_id: Option<FormatId>) -> AppResult<Value> {
    let mut finder = FormatFinder::new(payload);
    finder.scan()?;

    let mut formats = Map::new();
    for (id, format) in finder.formats() {
        formats.insert(id.to_string(), serde_json::to_value(format)?);
    }
    tracing::info!("Found {} formats", formats.len());

    let id = format_id.unwrap_or(ROOT_FORMAT_ID);
    let resolved = match finder.format(Some(id)) {
        Ok(format) => serde_json::to_value(format)?,
        Err(Error::FormatNotFound(_)) => {
            tracing::warn!("Format {} is not defined in the payload", id);
            Value::Null
        }
        Err(e) => return Err(e.into()),
    };

    Ok(json!({
        "formats": formats,
        "resolved": {"id": id, "format": resolved},
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn family() -> Value {
        json!({
            "f": 0,
            "s": [
                {"n": "@Parent", "t": "Integer"},
                {"n": "Children", "t": {"n": "Array", "t": "Object"}}
            ],
            "d": [0, [
                {"f": 1, "s": [{"n": "Name", "t": "String"}], "d": ["Vova"]},
                {"f": 1, "d": ["Olga"]}
            ]]
        })
    }

    #[test]
    fn test_registry_and_root() {
        let report = inspect(&family(), None).unwrap();

        assert_eq!(report["formats"].as_object().map(Map::len), Some(2));
        assert_eq!(report["formats"]["1"], json!([{"n": "Name", "t": "String"}]));
        assert_eq!(report["resolved"]["id"], json!(0));
        assert_eq!(report["resolved"]["format"][0]["n"], json!("@Parent"));
        assert_eq!(
            report["resolved"]["format"][1]["t"],
            json!({"n": "Array", "t": "Object"})
        );
    }

    #[test]
    fn test_requested_id() {
        let report = inspect(&family(), Some(1)).unwrap();
        assert_eq!(report["resolved"]["format"][0]["n"], json!("Name"));
    }

    #[test]
    fn test_undefined_id_is_null() {
        let report = inspect(&family(), Some(9)).unwrap();
        assert_eq!(report["resolved"]["format"], Value::Null);

        let report = inspect(&json!([1, 2, 3]), None).unwrap();
        assert_eq!(report["formats"], json!({}));
        assert_eq!(report["resolved"]["format"], Value::Null);
    }

    #[test]
    fn test_malformed_payload() {
        let payload = json!({"f": "zero", "s": [], "d": []});
        assert!(matches!(
            inspect(&payload, None),
            Err(AppError::Engine(Error::InvalidFormat(_)))
        ));
    }
}
