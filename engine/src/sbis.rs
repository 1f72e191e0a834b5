//! Adapter over the compact `{d, s, f}` wire format.
//!
//! A record is `{"d": [values...], "s": [{"n", "t"}...]}`: values are
//! positional and the field list gives them names. A table is
//! `{"d": [[row...], ...], "s": [...]}` with one field list for every row.
//! A node may carry a format id `f` instead of `s`; such links are resolved
//! through [`FormatFinder`].
//!
//! Views here declare the clone capability, so a copy-on-write wrapper asks
//! them for a clone instead of duplicating their data itself.

use crate::{
    adapter::{check_index, Adapter, Cloneable, RecordAdapter, TableAdapter},
    error::Result,
    finder::{format_id, FormatFinder},
    format::{field_names, parse_format, position, FieldDescriptor, Format},
    Error, FieldFormat, FieldName, RawData, SharedFormat,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Factory for wire-format views.
#[derive(Debug, Clone, Copy, Default)]
pub struct SbisAdapter;

impl SbisAdapter {
    pub const MODULE: &'static str = "adapter.sbis";

    pub fn new() -> Self {
        Self
    }
}

impl Adapter for SbisAdapter {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn for_table(&self, data: RawData) -> Result<Box<dyn TableAdapter>> {
        Ok(Box::new(SbisTable::new(data)?))
    }

    fn for_record(&self, data: RawData) -> Result<Box<dyn RecordAdapter>> {
        Ok(Box::new(SbisRecord::new(data)?))
    }

    fn key_field(&self, data: &Value) -> Option<FieldName> {
        key_field(&node_format(data).ok()?)
    }

    fn property(&self, data: &Value, name: &str) -> Option<Value> {
        let index = node_format(data)
            .ok()
            .and_then(|format| position(&format, name));
        match index {
            Some(index) => data.get("d")?.get(index).cloned(),
            None => data.get(name).cloned(),
        }
    }

    fn set_property(&self, data: &mut Value, name: &str, value: Value) -> Result<()> {
        let format = node_format(data)?;
        let index = position(&format, name).ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        let values = data
            .get_mut("d")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| Error::InvalidData("record must carry a 'd' array".into()))?;
        if values.len() <= index {
            values.resize(index + 1, Value::Null);
        }
        values[index] = value;
        Ok(())
    }

    fn serialize(&self, data: &Value) -> Value {
        data.clone()
    }
}

/// First `@`-prefixed field, else the first field.
fn key_field(format: &[FieldDescriptor]) -> Option<FieldName> {
    format
        .iter()
        .find(|field| field.name.starts_with('@'))
        .or_else(|| format.first())
        .map(|field| field.name.clone())
}

/// Field list of a node: inline `s`, a resolved link `f`, or empty.
fn node_format(data: &Value) -> Result<Format> {
    let obj = data
        .as_object()
        .ok_or_else(|| Error::InvalidData("data must be an object".into()))?;
    match (obj.get("s"), obj.get("f")) {
        (Some(raw), _) => parse_format(raw),
        (None, Some(raw_id)) => {
            let id = format_id(raw_id)?;
            Ok(FormatFinder::new(data).format(Some(id))?.to_vec())
        }
        (None, None) => Ok(Format::new()),
    }
}

fn field_format(format: &[FieldDescriptor], name: &str) -> Result<FieldFormat> {
    format
        .iter()
        .find(|field| field.name == name)
        .map(FieldFormat::from_descriptor)
        .ok_or_else(|| Error::FieldNotFound(name.to_string()))
}

fn shared_format(format: &[FieldDescriptor], name: &str) -> Result<SharedFormat> {
    let index = position(format, name).ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
    Ok(SharedFormat {
        name: name.to_string(),
        kind: format[index].kind(),
        index,
    })
}

/// Write `format` into the `s` slot; an explicit list supersedes any link.
fn store_format(data: &mut RawData, format: &[FieldDescriptor]) -> Result<()> {
    let raw = serde_json::to_value(format).map_err(|e| Error::InvalidFormat(e.to_string()))?;
    let obj = Arc::make_mut(data)
        .as_object_mut()
        .ok_or_else(|| Error::InvalidData("data must be an object".into()))?;
    obj.insert("s".to_string(), raw);
    obj.shift_remove("f");
    Ok(())
}

fn values_mut(data: &mut RawData) -> Result<&mut Vec<Value>> {
    Arc::make_mut(data)
        .get_mut("d")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Error::InvalidData("data must carry a 'd' array".into()))
}

fn pad(values: &mut Vec<Value>, len: usize) {
    if values.len() < len {
        values.resize(len, Value::Null);
    }
}

/// Record view over `{d, s}`.
#[derive(Debug, Clone)]
pub struct SbisRecord {
    data: RawData,
    format: Format,
}

impl SbisRecord {
    pub fn new(data: RawData) -> Result<Self> {
        if !data.get("d").is_some_and(Value::is_array) {
            return Err(Error::InvalidData("record must carry a 'd' array".into()));
        }
        let format = node_format(&data)?;
        Ok(Self { data, format })
    }

    fn values(&self) -> &[Value] {
        self.data
            .get("d")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        position(&self.format, name).ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Value of a field with every nested format link resolved, so that the
    /// value can be read on its own.
    pub fn resolved(&self, name: &str) -> Result<Value> {
        let index = self.index_of(name)?;
        let value = self.values().get(index).cloned().unwrap_or(Value::Null);
        FormatFinder::new(&self.data).resolve_links(&value)
    }

    /// Primary key field of this record.
    pub fn key_field(&self) -> Option<FieldName> {
        key_field(&self.format)
    }
}

impl RecordAdapter for SbisRecord {
    fn data(&self) -> &Value {
        &self.data
    }

    fn has(&self, name: &str) -> bool {
        position(&self.format, name).is_some()
    }

    fn get(&self, name: &str) -> Option<Value> {
        let index = position(&self.format, name)?;
        self.values().get(index).cloned()
    }

    fn fields(&self) -> Vec<FieldName> {
        field_names(&self.format)
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        field_format(&self.format, name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        shared_format(&self.format, name)
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self.index_of(name)?;
        let values = values_mut(&mut self.data)?;
        pad(values, index + 1);
        values[index] = value;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        values_mut(&mut self.data)?.clear();
        self.format.clear();
        store_format(&mut self.data, &self.format)
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        format.validate_default()?;
        if self.has(&format.name) {
            return Err(Error::FieldAlreadyExists(format.name));
        }
        let count = self.format.len();
        let at = at.unwrap_or(count);
        check_index(at, count, true)?;

        let values = values_mut(&mut self.data)?;
        pad(values, count);
        values.insert(at, format.default_value.clone());
        self.format.insert(at, format.descriptor());
        store_format(&mut self.data, &self.format)
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        self.remove_field_at(index)
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        check_index(index, self.format.len(), false)?;
        let values = values_mut(&mut self.data)?;
        if index < values.len() {
            values.remove(index);
        }
        self.format.remove(index);
        store_format(&mut self.data, &self.format)
    }

    fn as_cloneable(&self) -> Option<&dyn Cloneable<Output = Box<dyn RecordAdapter>>> {
        Some(self)
    }
}

impl Cloneable for SbisRecord {
    type Output = Box<dyn RecordAdapter>;

    fn clone_adapter(&self) -> Result<Self::Output> {
        Ok(Box::new(SbisRecord {
            data: Arc::new(Value::clone(&self.data)),
            format: self.format.clone(),
        }))
    }
}

/// Table view over `{d: [[...]], s}`.
#[derive(Debug, Clone)]
pub struct SbisTable {
    data: RawData,
    format: Format,
}

impl SbisTable {
    pub fn new(data: RawData) -> Result<Self> {
        let rows = data
            .get("d")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidData("table must carry a 'd' array".into()))?;
        if !rows.iter().all(Value::is_array) {
            return Err(Error::InvalidData("table rows must be arrays".into()));
        }
        let format = node_format(&data)?;
        Ok(Self { data, format })
    }

    fn rows(&self) -> &[Value] {
        self.data
            .get("d")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Wrap a row into a standalone record value.
    fn record_value(&self, row: Value) -> Result<Value> {
        let format =
            serde_json::to_value(&self.format).map_err(|e| Error::InvalidFormat(e.to_string()))?;
        let mut obj = Map::new();
        obj.insert("d".to_string(), row);
        obj.insert("s".to_string(), format);
        Ok(Value::Object(obj))
    }

    /// Extract the row of an incoming record. Returns the record's format
    /// when the table has none yet and should adopt it.
    fn take_row(&self, record: Value) -> Result<(Value, Option<Format>)> {
        let (row, adopted) = match record {
            row @ Value::Array(_) => (row, None),
            Value::Object(mut obj) => {
                let row = match obj.shift_remove("d") {
                    Some(row @ Value::Array(_)) => row,
                    _ => return Err(Error::InvalidData("record must carry a 'd' array".into())),
                };
                match obj.get("s") {
                    Some(raw_format) => (row, self.check_format(parse_format(raw_format)?)?),
                    None => (row, None),
                }
            }
            _ => {
                return Err(Error::InvalidData(
                    "record must be a row array or a {d, s} object".into(),
                ))
            }
        };

        let width = adopted.as_ref().unwrap_or(&self.format).len();
        let len = row.as_array().map_or(0, Vec::len);
        if len != width {
            return Err(Error::FormatMismatch(format!(
                "row has {} values but the format has {} fields",
                len, width
            )));
        }
        Ok((row, adopted))
    }

    /// Compare a record's format with the table's. `Some` means adopt it.
    fn check_format(&self, format: Format) -> Result<Option<Format>> {
        if self.format.is_empty() {
            return Ok(Some(format));
        }
        if field_names(&format) != field_names(&self.format) {
            return Err(Error::FormatMismatch(format!(
                "record fields {:?} differ from table fields {:?}",
                field_names(&format),
                field_names(&self.format)
            )));
        }
        Ok(None)
    }

    fn adopt(&mut self, format: Option<Format>) -> Result<()> {
        match format {
            Some(format) => {
                self.format = format;
                store_format(&mut self.data, &self.format)
            }
            None => Ok(()),
        }
    }

    /// Primary key field of this table.
    pub fn key_field(&self) -> Option<FieldName> {
        key_field(&self.format)
    }
}

impl TableAdapter for SbisTable {
    fn data(&self) -> &Value {
        &self.data
    }

    fn count(&self) -> usize {
        self.rows().len()
    }

    fn at(&self, index: usize) -> Option<Value> {
        let row = self.rows().get(index)?.clone();
        self.record_value(row).ok()
    }

    fn fields(&self) -> Vec<FieldName> {
        field_names(&self.format)
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        field_format(&self.format, name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        shared_format(&self.format, name)
    }

    fn add(&mut self, record: Value, at: Option<usize>) -> Result<()> {
        let count = self.count();
        let at = at.unwrap_or(count);
        check_index(at, count, true)?;
        let (row, adopted) = self.take_row(record)?;
        self.adopt(adopted)?;
        values_mut(&mut self.data)?.insert(at, row);
        Ok(())
    }

    fn remove(&mut self, at: usize) -> Result<()> {
        check_index(at, self.count(), false)?;
        values_mut(&mut self.data)?.remove(at);
        Ok(())
    }

    fn replace(&mut self, record: Value, at: usize) -> Result<()> {
        check_index(at, self.count(), false)?;
        let (row, adopted) = self.take_row(record)?;
        self.adopt(adopted)?;
        values_mut(&mut self.data)?[at] = row;
        Ok(())
    }

    fn move_record(&mut self, source: usize, target: usize) -> Result<()> {
        let count = self.count();
        check_index(source, count, false)?;
        check_index(target, count, false)?;
        if source == target {
            return Ok(());
        }
        let rows = values_mut(&mut self.data)?;
        let row = rows.remove(source);
        rows.insert(target, row);
        Ok(())
    }

    fn merge(&mut self, acceptor: usize, donor: usize, id_field: &str) -> Result<()> {
        let count = self.count();
        check_index(acceptor, count, false)?;
        check_index(donor, count, false)?;
        if acceptor == donor {
            return Ok(());
        }
        let id_index = position(&self.format, id_field);
        let extension = self.rows()[donor].as_array().cloned().unwrap_or_default();

        let rows = values_mut(&mut self.data)?;
        if let Some(target) = rows[acceptor].as_array_mut() {
            pad(target, extension.len());
            for (index, value) in extension.into_iter().enumerate() {
                if Some(index) != id_index {
                    target[index] = value;
                }
            }
        }
        rows.remove(donor);
        Ok(())
    }

    fn copy(&mut self, index: usize) -> Result<Value> {
        check_index(index, self.count(), false)?;
        let row = self.rows()[index].clone();
        values_mut(&mut self.data)?.insert(index + 1, row.clone());
        self.record_value(row)
    }

    fn clear(&mut self) -> Result<()> {
        values_mut(&mut self.data)?.clear();
        Ok(())
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        format.validate_default()?;
        if position(&self.format, &format.name).is_some() {
            return Err(Error::FieldAlreadyExists(format.name));
        }
        let count = self.format.len();
        let at = at.unwrap_or(count);
        check_index(at, count, true)?;

        for row in values_mut(&mut self.data)? {
            if let Some(values) = row.as_array_mut() {
                pad(values, count);
                values.insert(at, format.default_value.clone());
            }
        }
        self.format.insert(at, format.descriptor());
        store_format(&mut self.data, &self.format)
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        let index =
            position(&self.format, name).ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        self.remove_field_at(index)
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        check_index(index, self.format.len(), false)?;
        for row in values_mut(&mut self.data)? {
            if let Some(values) = row.as_array_mut() {
                if index < values.len() {
                    values.remove(index);
                }
            }
        }
        self.format.remove(index);
        store_format(&mut self.data, &self.format)
    }

    fn as_cloneable(&self) -> Option<&dyn Cloneable<Output = Box<dyn TableAdapter>>> {
        Some(self)
    }
}

impl Cloneable for SbisTable {
    type Output = Box<dyn TableAdapter>;

    fn clone_adapter(&self) -> Result<Self::Output> {
        Ok(Box::new(SbisTable {
            data: Arc::new(Value::clone(&self.data)),
            format: self.format.clone(),
        }))
    }
}
