//! Adapter over plain JSON.
//!
//! Tables are arrays of objects, records are objects. Field order follows
//! key insertion order. These views have no clone capability, so a
//! copy-on-write wrapper duplicates their data structurally.

use crate::{
    adapter::{check_index, Adapter, RecordAdapter, TableAdapter},
    error::Result,
    Error, FieldFormat, FieldKind, FieldName, RawData, SharedFormat,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Factory for JSON views.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl JsonAdapter {
    pub const MODULE: &'static str = "adapter.json";

    pub fn new() -> Self {
        Self
    }
}

impl Adapter for JsonAdapter {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn for_table(&self, data: RawData) -> Result<Box<dyn TableAdapter>> {
        Ok(Box::new(JsonTable::new(data)?))
    }

    fn for_record(&self, data: RawData) -> Result<Box<dyn RecordAdapter>> {
        Ok(Box::new(JsonRecord::new(data)?))
    }

    fn key_field(&self, _data: &Value) -> Option<FieldName> {
        None
    }

    /// Reads a dotted path (`"a.b.0"`) through objects and arrays.
    fn property(&self, data: &Value, name: &str) -> Option<Value> {
        let mut node = data;
        for segment in name.split('.') {
            node = match node {
                Value::Object(obj) => obj.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node.clone())
    }

    /// Writes a dotted path, creating intermediate objects as needed.
    fn set_property(&self, data: &mut Value, name: &str, value: Value) -> Result<()> {
        let mut segments = name.split('.').peekable();
        let mut node = data;
        while let Some(segment) = segments.next() {
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            let obj = node.as_object_mut().ok_or_else(|| {
                Error::InvalidData(format!("cannot set '{}': '{}' is not an object", name, segment))
            })?;
            if segments.peek().is_none() {
                obj.insert(segment.to_string(), value);
                return Ok(());
            }
            node = obj.entry(segment.to_string()).or_insert(Value::Null);
        }
        Ok(())
    }

    fn serialize(&self, data: &Value) -> Value {
        data.clone()
    }
}

/// Format of `name` detected from the first non-null value among `objects`.
fn detect_format<'a>(
    objects: impl Iterator<Item = &'a Map<String, Value>>,
    name: &str,
) -> Result<FieldFormat> {
    let mut found = false;
    for obj in objects {
        match obj.get(name) {
            Some(Value::Null) => found = true,
            Some(value) => return Ok(FieldFormat::nullable(name, FieldKind::detect(value))),
            None => {}
        }
    }
    if found {
        Ok(FieldFormat::nullable(name, FieldKind::Any))
    } else {
        Err(Error::FieldNotFound(name.to_string()))
    }
}

/// Table view over a JSON array of objects.
#[derive(Debug, Clone)]
pub struct JsonTable {
    data: RawData,
}

impl JsonTable {
    pub fn new(data: RawData) -> Result<Self> {
        if !data.is_array() {
            return Err(Error::InvalidData("table data must be an array".into()));
        }
        Ok(Self { data })
    }

    fn records(&self) -> &[Value] {
        self.data.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    fn records_mut(&mut self) -> Result<&mut Vec<Value>> {
        Arc::make_mut(&mut self.data)
            .as_array_mut()
            .ok_or_else(|| Error::InvalidData("table data must be an array".into()))
    }

    fn objects(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.records().iter().filter_map(Value::as_object)
    }
}

impl TableAdapter for JsonTable {
    fn data(&self) -> &Value {
        &self.data
    }

    fn count(&self) -> usize {
        self.records().len()
    }

    fn at(&self, index: usize) -> Option<Value> {
        self.records().get(index).cloned()
    }

    fn fields(&self) -> Vec<FieldName> {
        let mut names: Vec<FieldName> = Vec::new();
        for obj in self.objects() {
            for key in obj.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        detect_format(self.objects(), name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        let index = self
            .fields()
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        let format = self.format(name)?;
        Ok(SharedFormat {
            name: format.name,
            kind: format.kind,
            index,
        })
    }

    fn add(&mut self, record: Value, at: Option<usize>) -> Result<()> {
        let count = self.count();
        let at = at.unwrap_or(count);
        check_index(at, count, true)?;
        self.records_mut()?.insert(at, record);
        Ok(())
    }

    fn remove(&mut self, at: usize) -> Result<()> {
        check_index(at, self.count(), false)?;
        self.records_mut()?.remove(at);
        Ok(())
    }

    fn replace(&mut self, record: Value, at: usize) -> Result<()> {
        check_index(at, self.count(), false)?;
        self.records_mut()?[at] = record;
        Ok(())
    }

    fn move_record(&mut self, source: usize, target: usize) -> Result<()> {
        let count = self.count();
        check_index(source, count, false)?;
        check_index(target, count, false)?;
        if source == target {
            return Ok(());
        }
        let records = self.records_mut()?;
        let record = records.remove(source);
        records.insert(target, record);
        Ok(())
    }

    fn merge(&mut self, acceptor: usize, donor: usize, id_field: &str) -> Result<()> {
        let count = self.count();
        check_index(acceptor, count, false)?;
        check_index(donor, count, false)?;
        if acceptor == donor {
            return Ok(());
        }
        let extension = match self.records()[donor].as_object() {
            Some(obj) if self.records()[acceptor].is_object() => obj.clone(),
            _ => return Err(Error::InvalidData("merged records must be objects".into())),
        };

        let records = self.records_mut()?;
        if let Some(target) = records[acceptor].as_object_mut() {
            let id = target.get(id_field).cloned();
            for (key, value) in extension {
                target.insert(key, value);
            }
            match id {
                Some(id) => {
                    target.insert(id_field.to_string(), id);
                }
                None => {
                    target.shift_remove(id_field);
                }
            }
        }
        records.remove(donor);
        Ok(())
    }

    fn copy(&mut self, index: usize) -> Result<Value> {
        check_index(index, self.count(), false)?;
        let records = self.records_mut()?;
        let duplicate = records[index].clone();
        records.insert(index + 1, duplicate.clone());
        Ok(duplicate)
    }

    fn clear(&mut self) -> Result<()> {
        self.records_mut()?.clear();
        Ok(())
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        format.validate_default()?;
        let fields = self.fields();
        if fields.contains(&format.name) {
            return Err(Error::FieldAlreadyExists(format.name));
        }
        let at = at.unwrap_or(fields.len());
        check_index(at, fields.len(), true)?;

        // Each object gets the key after whichever of the preceding fields it holds
        let preceding = &fields[..at];
        for record in self.records_mut()? {
            if let Some(obj) = record.as_object_mut() {
                let index = obj.keys().filter(|key| preceding.contains(*key)).count();
                obj.shift_insert(index, format.name.clone(), format.default_value.clone());
            }
        }
        Ok(())
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        if !self.fields().iter().any(|field| field == name) {
            return Err(Error::FieldNotFound(name.to_string()));
        }
        for record in self.records_mut()? {
            if let Some(obj) = record.as_object_mut() {
                obj.shift_remove(name);
            }
        }
        Ok(())
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        let fields = self.fields();
        let name = fields
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, fields.len()))?;
        self.remove_field(name)
    }
}

/// Record view over a JSON object.
#[derive(Debug, Clone)]
pub struct JsonRecord {
    data: RawData,
}

impl JsonRecord {
    pub fn new(data: RawData) -> Result<Self> {
        if !data.is_object() {
            return Err(Error::InvalidData("record data must be an object".into()));
        }
        Ok(Self { data })
    }

    fn object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    fn object_mut(&mut self) -> Result<&mut Map<String, Value>> {
        Arc::make_mut(&mut self.data)
            .as_object_mut()
            .ok_or_else(|| Error::InvalidData("record data must be an object".into()))
    }
}

impl RecordAdapter for JsonRecord {
    fn data(&self) -> &Value {
        &self.data
    }

    fn has(&self, name: &str) -> bool {
        self.object().is_some_and(|obj| obj.contains_key(name))
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.object()?.get(name).cloned()
    }

    fn fields(&self) -> Vec<FieldName> {
        self.object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        detect_format(self.object().into_iter(), name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        let index = self
            .object()
            .and_then(|obj| obj.keys().position(|key| key == name))
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        let format = self.format(name)?;
        Ok(SharedFormat {
            name: format.name,
            kind: format.kind,
            index,
        })
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        self.object_mut()?.insert(name.to_string(), value);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.object_mut()?.clear();
        Ok(())
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        format.validate_default()?;
        if self.has(&format.name) {
            return Err(Error::FieldAlreadyExists(format.name));
        }
        let count = self.fields().len();
        let at = at.unwrap_or(count);
        check_index(at, count, true)?;
        self.object_mut()?
            .shift_insert(at, format.name, format.default_value);
        Ok(())
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        if !self.has(name) {
            return Err(Error::FieldNotFound(name.to_string()));
        }
        self.object_mut()?.shift_remove(name);
        Ok(())
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        let fields = self.fields();
        let name = fields
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, fields.len()))?;
        self.remove_field(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(data: Value) -> JsonTable {
        JsonTable::new(Arc::new(data)).unwrap()
    }

    fn record(data: Value) -> JsonRecord {
        JsonRecord::new(Arc::new(data)).unwrap()
    }

    #[test]
    fn table_requires_array() {
        let result = JsonTable::new(Arc::new(json!({"a": 1})));
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn table_reads() {
        let t = table(json!([{"id": 1, "name": "a"}, {"id": 2, "extra": true}]));
        assert_eq!(t.count(), 2);
        assert_eq!(t.at(1), Some(json!({"id": 2, "extra": true})));
        assert_eq!(t.at(2), None);
        assert_eq!(t.fields(), vec!["id", "name", "extra"]);
        assert_eq!(t.format("extra").unwrap().kind, FieldKind::Boolean);
        assert_eq!(t.shared_format("name").unwrap().index, 1);
        assert!(matches!(t.format("missing"), Err(Error::FieldNotFound(_))));
    }

    #[test]
    fn table_add_and_remove() {
        let mut t = table(json!([{"id": 1}]));
        t.add(json!({"id": 0}), Some(0)).unwrap();
        t.add(json!({"id": 2}), None).unwrap();
        assert_eq!(t.data(), &json!([{"id": 0}, {"id": 1}, {"id": 2}]));

        assert_eq!(
            t.add(json!({}), Some(9)),
            Err(Error::IndexOutOfRange { index: 9, count: 3 })
        );
        t.remove(1).unwrap();
        assert_eq!(t.data(), &json!([{"id": 0}, {"id": 2}]));
        assert!(t.remove(2).is_err());
    }

    #[test]
    fn table_move_replace_copy() {
        let mut t = table(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        t.move_record(0, 2).unwrap();
        assert_eq!(t.data(), &json!([{"id": 2}, {"id": 3}, {"id": 1}]));

        t.replace(json!({"id": 9}), 1).unwrap();
        assert_eq!(t.at(1), Some(json!({"id": 9})));

        let duplicate = t.copy(0).unwrap();
        assert_eq!(duplicate, json!({"id": 2}));
        assert_eq!(t.data(), &json!([{"id": 2}, {"id": 2}, {"id": 9}, {"id": 1}]));
    }

    #[test]
    fn table_merge_keeps_acceptor_id() {
        let mut t = table(json!([
            {"id": 1, "name": "old", "kept": true},
            {"id": 2, "name": "new"}
        ]));
        t.merge(0, 1, "id").unwrap();
        assert_eq!(t.data(), &json!([{"id": 1, "name": "new", "kept": true}]));
    }

    #[test]
    fn table_fields() {
        let mut t = table(json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}]));
        t.add_field(FieldFormat::required("c", FieldKind::Integer, json!(0)), None)
            .unwrap();
        assert_eq!(t.at(1), Some(json!({"a": 3, "b": 4, "c": 0})));
        assert!(matches!(
            t.add_field(FieldFormat::nullable("a", FieldKind::Any), None),
            Err(Error::FieldAlreadyExists(_))
        ));

        t.remove_field("a").unwrap();
        assert_eq!(t.fields(), vec!["b", "c"]);
        t.remove_field_at(1).unwrap();
        assert_eq!(t.data(), &json!([{"b": 2}, {"b": 4}]));
        assert!(matches!(t.remove_field("zzz"), Err(Error::FieldNotFound(_))));
        assert!(t.remove_field_at(5).is_err());
    }

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_object()
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn table_add_field_at_position() {
        let mut t = table(json!([{"a": 1, "b": 2}, {"b": 3}, {"a": 4}]));
        t.add_field(
            FieldFormat::required("c", FieldKind::Integer, json!(0)),
            Some(1),
        )
        .unwrap();

        assert_eq!(t.fields(), vec!["a", "c", "b"]);
        assert_eq!(keys(&t.at(0).unwrap()), vec!["a", "c", "b"]);
        assert_eq!(keys(&t.at(1).unwrap()), vec!["c", "b"]);
        assert_eq!(keys(&t.at(2).unwrap()), vec!["a", "c"]);

        t.add_field(FieldFormat::nullable("first", FieldKind::Any), Some(0))
            .unwrap();
        assert_eq!(t.fields(), vec!["first", "a", "c", "b"]);
        assert!(t
            .add_field(FieldFormat::nullable("far", FieldKind::Any), Some(5))
            .is_err());
    }

    #[test]
    fn record_ops() {
        let mut r = record(json!({"foo": "bar", "n": 1.5}));
        assert!(r.has("foo"));
        assert_eq!(r.get("foo"), Some(json!("bar")));
        assert_eq!(r.format("n").unwrap().kind, FieldKind::Real);

        r.set("foo", json!("baz")).unwrap();
        r.add_field(FieldFormat::nullable("extra", FieldKind::String), Some(0))
            .unwrap();
        assert_eq!(r.fields(), vec!["extra", "foo", "n"]);
        r.add_field(FieldFormat::nullable("last", FieldKind::Any), None)
            .unwrap();
        assert_eq!(r.fields(), vec!["extra", "foo", "n", "last"]);
        assert!(matches!(
            r.add_field(FieldFormat::nullable("far", FieldKind::Any), Some(9)),
            Err(Error::IndexOutOfRange { index: 9, count: 4 })
        ));

        r.remove_field_at(1).unwrap();
        r.remove_field("last").unwrap();
        assert_eq!(r.data(), &json!({"extra": null, "n": 1.5}));
        assert_eq!(r.fields(), vec!["extra", "n"]);

        r.clear().unwrap();
        assert_eq!(r.data(), &json!({}));
    }

    #[test]
    fn mutating_shared_data_leaves_it_untouched() {
        let shared = Arc::new(json!({"foo": "bar"}));
        let mut r = JsonRecord::new(Arc::clone(&shared)).unwrap();
        r.set("foo", json!("baz")).unwrap();
        assert_eq!(*shared, json!({"foo": "bar"}));
        assert_eq!(r.get("foo"), Some(json!("baz")));
    }

    #[test]
    fn dotted_properties() {
        let adapter = JsonAdapter::new();
        let mut data = json!({"a": {"b": [10, 20]}});
        assert_eq!(adapter.property(&data, "a.b.1"), Some(json!(20)));
        assert_eq!(adapter.property(&data, "a.x"), None);

        adapter.set_property(&mut data, "a.c.d", json!(true)).unwrap();
        assert_eq!(data["a"]["c"]["d"], json!(true));
        assert!(matches!(
            adapter.set_property(&mut data, "a.b.x", json!(1)),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(adapter.key_field(&data), None);
    }
}
