//! Adapter capability traits and the serialized adapter envelope.
//!
//! An [`Adapter`] is a factory for views over raw data. A
//! [`TableAdapter`] views an ordered set of records, a [`RecordAdapter`]
//! views one record. Views that can duplicate themselves cheaper than a
//! structural copy of their data declare it through `as_cloneable()`.

use crate::{
    cow::CowAdapter, error::Result, json::JsonAdapter, sbis::SbisAdapter, Error, FieldFormat,
    FieldName, RawData, SharedFormat,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Optional capability: produce an independent copy of a view.
///
/// The copy must share no mutable state with the original.
pub trait Cloneable {
    type Output;

    fn clone_adapter(&self) -> Result<Self::Output>;
}

/// A view over an ordered set of records.
pub trait TableAdapter: fmt::Debug {
    /// Raw data this view currently reads and writes.
    fn data(&self) -> &Value;

    /// Number of records.
    fn count(&self) -> usize;

    /// Raw record at `index`, if any.
    fn at(&self, index: usize) -> Option<Value>;

    /// Field names, in order.
    fn fields(&self) -> Vec<FieldName>;

    /// Typed format of a field.
    fn format(&self, name: &str) -> Result<FieldFormat>;

    /// Lightweight format of a field.
    fn shared_format(&self, name: &str) -> Result<SharedFormat>;

    /// Insert a record at `at`, or append when `at` is `None`.
    fn add(&mut self, record: Value, at: Option<usize>) -> Result<()>;

    fn remove(&mut self, at: usize) -> Result<()>;

    fn replace(&mut self, record: Value, at: usize) -> Result<()>;

    /// Move the record at `source` so that it ends up at `target`.
    fn move_record(&mut self, source: usize, target: usize) -> Result<()>;

    /// Merge the `donor` record into the `acceptor` record, keeping the
    /// acceptor's `id_field`, then drop the donor.
    fn merge(&mut self, acceptor: usize, donor: usize, id_field: &str) -> Result<()>;

    /// Duplicate the record at `index` right after it and return the duplicate.
    fn copy(&mut self, index: usize) -> Result<Value>;

    fn clear(&mut self) -> Result<()>;

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()>;

    fn remove_field(&mut self, name: &str) -> Result<()>;

    fn remove_field_at(&mut self, index: usize) -> Result<()>;

    fn as_cloneable(&self) -> Option<&dyn Cloneable<Output = Box<dyn TableAdapter>>> {
        None
    }
}

/// A view over a single record.
pub trait RecordAdapter: fmt::Debug {
    /// Raw data this view currently reads and writes.
    fn data(&self) -> &Value;

    fn has(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Value>;

    /// Field names, in order.
    fn fields(&self) -> Vec<FieldName>;

    fn format(&self, name: &str) -> Result<FieldFormat>;

    fn shared_format(&self, name: &str) -> Result<SharedFormat>;

    fn set(&mut self, name: &str, value: Value) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()>;

    fn remove_field(&mut self, name: &str) -> Result<()>;

    fn remove_field_at(&mut self, index: usize) -> Result<()>;

    fn as_cloneable(&self) -> Option<&dyn Cloneable<Output = Box<dyn RecordAdapter>>> {
        None
    }
}

/// Factory for table and record views plus adapter-level helpers.
pub trait Adapter: fmt::Debug {
    /// Type tag written into the envelope.
    fn module(&self) -> &'static str;

    fn for_table(&self, data: RawData) -> Result<Box<dyn TableAdapter>>;

    fn for_record(&self, data: RawData) -> Result<Box<dyn RecordAdapter>>;

    /// Name of the primary key field, if the data declares one.
    fn key_field(&self, data: &Value) -> Option<FieldName>;

    fn property(&self, data: &Value, name: &str) -> Option<Value>;

    fn set_property(&self, data: &mut Value, name: &str, value: Value) -> Result<()>;

    /// Wire value for `data`.
    fn serialize(&self, data: &Value) -> Value;

    /// Adapter this one delegates to, if it is a wrapper.
    fn wrapped(&self) -> Option<&dyn Adapter> {
        None
    }

    /// Adapter state stored under `$options` in the envelope.
    fn options(&self) -> Result<Value> {
        Ok(Value::Object(Default::default()))
    }

    fn to_envelope(&self) -> Result<Envelope> {
        Ok(Envelope::new(self.module(), self.options()?))
    }

    fn to_json(&self) -> Result<String> {
        self.to_envelope()?.to_json()
    }
}

/// Serialized form of an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub module: String,
    pub state: EnvelopeState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeState {
    #[serde(rename = "$options")]
    pub options: Value,
}

impl Envelope {
    pub fn new(module: impl Into<String>, options: Value) -> Self {
        Self {
            module: module.into(),
            state: EnvelopeState { options },
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidEnvelope(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidEnvelope(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidEnvelope(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidEnvelope(e.to_string()))
    }
}

/// Rebuild an adapter from its envelope.
///
/// Copy-on-write adapters come back uncopied, wrapping a freshly rebuilt
/// original.
pub fn from_envelope(envelope: &Envelope) -> Result<Arc<dyn Adapter>> {
    match envelope.module.as_str() {
        JsonAdapter::MODULE => Ok(Arc::new(JsonAdapter::new())),
        SbisAdapter::MODULE => Ok(Arc::new(SbisAdapter::new())),
        CowAdapter::MODULE => {
            let inner = Envelope::from_value(envelope.state.options.clone())?;
            Ok(Arc::new(CowAdapter::new(from_envelope(&inner)?)))
        }
        other => Err(Error::UnknownAdapter(other.to_string())),
    }
}

/// Rebuild an adapter from its JSON envelope.
pub fn from_json(json: &str) -> Result<Arc<dyn Adapter>> {
    from_envelope(&Envelope::from_json(json)?)
}

/// Check `index` against `count`; `inclusive` admits `index == count`.
pub(crate) fn check_index(index: usize, count: usize, inclusive: bool) -> Result<()> {
    let in_range = if inclusive {
        index <= count
    } else {
        index < count
    };
    if in_range {
        Ok(())
    } else {
        Err(Error::out_of_range(index, count))
    }
}
