//! Copy-on-write wrappers.
//!
//! [`CowAdapter`] wraps any [`Adapter`] and hands out [`CowTable`] and
//! [`CowRecord`] views. Until the first mutating call these views read
//! straight from the shared data through the wrapped adapter's own view.
//! The first mutating call makes a private copy, and every later call goes
//! to that copy. The shared data is never written.
//!
//! The private copy comes from the wrapped view's `clone_adapter()` when the
//! view declares the clone capability, otherwise from a structural duplicate
//! of the data handed to a fresh view from the wrapped adapter. Stacked
//! copy-on-write layers are skipped for the duplicate: the copy is already
//! private, so it goes straight to the innermost adapter.

use crate::{
    adapter::{Adapter, RecordAdapter, TableAdapter},
    error::Result,
    FieldFormat, FieldName, RawData, SharedFormat,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Adapter producing copy-on-write views over another adapter.
#[derive(Debug, Clone)]
pub struct CowAdapter {
    original: Arc<dyn Adapter>,
}

impl CowAdapter {
    pub const MODULE: &'static str = "adapter.cow";

    pub fn new(original: Arc<dyn Adapter>) -> Self {
        Self { original }
    }

    /// The wrapped adapter.
    pub fn original(&self) -> &Arc<dyn Adapter> {
        &self.original
    }
}

impl Adapter for CowAdapter {
    fn module(&self) -> &'static str {
        Self::MODULE
    }

    fn for_table(&self, data: RawData) -> Result<Box<dyn TableAdapter>> {
        Ok(Box::new(CowTable::new(data, Arc::clone(&self.original))?))
    }

    fn for_record(&self, data: RawData) -> Result<Box<dyn RecordAdapter>> {
        Ok(Box::new(CowRecord::new(data, Arc::clone(&self.original))?))
    }

    fn key_field(&self, data: &Value) -> Option<FieldName> {
        self.original.key_field(data)
    }

    fn property(&self, data: &Value, name: &str) -> Option<Value> {
        self.original.property(data, name)
    }

    fn set_property(&self, data: &mut Value, name: &str, value: Value) -> Result<()> {
        self.original.set_property(data, name, value)
    }

    fn serialize(&self, data: &Value) -> Value {
        self.original.serialize(data)
    }

    fn wrapped(&self) -> Option<&dyn Adapter> {
        Some(&*self.original)
    }

    /// Only the wrapped adapter is stored; copy state never is.
    fn options(&self) -> Result<Value> {
        self.original.to_envelope()?.to_value()
    }
}

/// Innermost adapter below any wrappers.
fn base_adapter(adapter: &dyn Adapter) -> &dyn Adapter {
    let mut adapter = adapter;
    while let Some(inner) = adapter.wrapped() {
        adapter = inner;
    }
    adapter
}

/// Copy-on-write table view.
#[derive(Debug)]
pub struct CowTable {
    factory: Arc<dyn Adapter>,
    original: Box<dyn TableAdapter>,
    copy: Option<Box<dyn TableAdapter>>,
}

impl CowTable {
    /// Wrap `factory`'s table view over the shared `data`.
    pub fn new(data: RawData, factory: Arc<dyn Adapter>) -> Result<Self> {
        let original = factory.for_table(data)?;
        Ok(Self {
            factory,
            original,
            copy: None,
        })
    }

    /// The wrapped view over the shared data, whatever the copy state.
    pub fn original(&self) -> &dyn TableAdapter {
        &*self.original
    }

    /// Whether the private copy has been made.
    pub fn is_copied(&self) -> bool {
        self.copy.is_some()
    }

    fn active(&self) -> &dyn TableAdapter {
        self.copy.as_deref().unwrap_or(&*self.original)
    }

    fn private_copy(&mut self) -> Result<&mut Box<dyn TableAdapter>> {
        let copy = match self.copy.take() {
            Some(copy) => copy,
            None => self.make_copy()?,
        };
        Ok(self.copy.insert(copy))
    }

    fn make_copy(&self) -> Result<Box<dyn TableAdapter>> {
        match self.original.as_cloneable() {
            Some(cloneable) => {
                debug!(adapter = self.factory.module(), "cloning table view");
                cloneable.clone_adapter()
            }
            None => {
                let base = base_adapter(&*self.factory);
                debug!(adapter = base.module(), "duplicating table data");
                base.for_table(Arc::new(self.original.data().clone()))
            }
        }
    }
}

impl TableAdapter for CowTable {
    fn data(&self) -> &Value {
        self.active().data()
    }

    fn count(&self) -> usize {
        self.active().count()
    }

    fn at(&self, index: usize) -> Option<Value> {
        self.active().at(index)
    }

    fn fields(&self) -> Vec<FieldName> {
        self.active().fields()
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        self.active().format(name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        self.active().shared_format(name)
    }

    fn add(&mut self, record: Value, at: Option<usize>) -> Result<()> {
        self.private_copy()?.add(record, at)
    }

    fn remove(&mut self, at: usize) -> Result<()> {
        self.private_copy()?.remove(at)
    }

    fn replace(&mut self, record: Value, at: usize) -> Result<()> {
        self.private_copy()?.replace(record, at)
    }

    fn move_record(&mut self, source: usize, target: usize) -> Result<()> {
        self.private_copy()?.move_record(source, target)
    }

    fn merge(&mut self, acceptor: usize, donor: usize, id_field: &str) -> Result<()> {
        self.private_copy()?.merge(acceptor, donor, id_field)
    }

    fn copy(&mut self, index: usize) -> Result<Value> {
        self.private_copy()?.copy(index)
    }

    fn clear(&mut self) -> Result<()> {
        self.private_copy()?.clear()
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        self.private_copy()?.add_field(format, at)
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        self.private_copy()?.remove_field(name)
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        self.private_copy()?.remove_field_at(index)
    }
}

/// Copy-on-write record view.
#[derive(Debug)]
pub struct CowRecord {
    factory: Arc<dyn Adapter>,
    original: Box<dyn RecordAdapter>,
    copy: Option<Box<dyn RecordAdapter>>,
}

impl CowRecord {
    /// Wrap `factory`'s record view over the shared `data`.
    pub fn new(data: RawData, factory: Arc<dyn Adapter>) -> Result<Self> {
        let original = factory.for_record(data)?;
        Ok(Self {
            factory,
            original,
            copy: None,
        })
    }

    /// The wrapped view over the shared data, whatever the copy state.
    pub fn original(&self) -> &dyn RecordAdapter {
        &*self.original
    }

    /// Whether the private copy has been made.
    pub fn is_copied(&self) -> bool {
        self.copy.is_some()
    }

    fn active(&self) -> &dyn RecordAdapter {
        self.copy.as_deref().unwrap_or(&*self.original)
    }

    fn private_copy(&mut self) -> Result<&mut Box<dyn RecordAdapter>> {
        let copy = match self.copy.take() {
            Some(copy) => copy,
            None => self.make_copy()?,
        };
        Ok(self.copy.insert(copy))
    }

    fn make_copy(&self) -> Result<Box<dyn RecordAdapter>> {
        match self.original.as_cloneable() {
            Some(cloneable) => {
                debug!(adapter = self.factory.module(), "cloning record view");
                cloneable.clone_adapter()
            }
            None => {
                let base = base_adapter(&*self.factory);
                debug!(adapter = base.module(), "duplicating record data");
                base.for_record(Arc::new(self.original.data().clone()))
            }
        }
    }
}

impl RecordAdapter for CowRecord {
    fn data(&self) -> &Value {
        self.active().data()
    }

    fn has(&self, name: &str) -> bool {
        self.active().has(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.active().get(name)
    }

    fn fields(&self) -> Vec<FieldName> {
        self.active().fields()
    }

    fn format(&self, name: &str) -> Result<FieldFormat> {
        self.active().format(name)
    }

    fn shared_format(&self, name: &str) -> Result<SharedFormat> {
        self.active().shared_format(name)
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        self.private_copy()?.set(name, value)
    }

    fn clear(&mut self) -> Result<()> {
        self.private_copy()?.clear()
    }

    fn add_field(&mut self, format: FieldFormat, at: Option<usize>) -> Result<()> {
        self.private_copy()?.add_field(format, at)
    }

    fn remove_field(&mut self, name: &str) -> Result<()> {
        self.private_copy()?.remove_field(name)
    }

    fn remove_field_at(&mut self, index: usize) -> Result<()> {
        self.private_copy()?.remove_field_at(index)
    }
}
