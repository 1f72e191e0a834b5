//! Format resolution for payloads with de-duplicated nested formats.
//!
//! A nested record node carries its field list inline the first time a format
//! appears (`{"f": 1, "s": [...], "d": [...]}`) and only the id afterwards
//! (`{"f": 1, "d": [...]}`). [`FormatFinder`] walks the payload, registers
//! every inline format under its id and answers id lookups.
//!
//! # Scan
//!
//! The walk is depth-first pre-order over an explicit stack, and it is
//! resumable: a lookup for an id that is not cached yet continues the walk
//! only until that id shows up. Every node is visited at most once across all
//! calls on the same finder.

use crate::{
    error::Result,
    format::{parse_format, FieldDescriptor, Format},
    Error, FormatId,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Id of the top-level format by payload convention.
pub const ROOT_FORMAT_ID: FormatId = 0;

/// Parse the `f` slot of a record node.
pub fn format_id(raw: &Value) -> Result<FormatId> {
    raw.as_u64()
        .and_then(|id| FormatId::try_from(id).ok())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "format id must be a non-negative integer, got {}",
                raw
            ))
        })
}

/// Format cache for one payload.
#[derive(Debug)]
pub struct FormatFinder<'a> {
    /// Registered formats by id
    cache: BTreeMap<FormatId, Format>,
    /// Nodes not visited yet
    pending: Vec<&'a Value>,
}

impl<'a> FormatFinder<'a> {
    pub fn new(payload: &'a Value) -> Self {
        Self {
            cache: BTreeMap::new(),
            pending: vec![payload],
        }
    }

    /// Resolve a format by id.
    ///
    /// A cached id is returned without scanning. An unknown id resumes the
    /// scan until it is registered. `None` scans the whole payload and returns
    /// the root format ([`ROOT_FORMAT_ID`]).
    ///
    /// Fails with [`Error::FormatNotFound`] if the payload never defines the
    /// requested id inline.
    pub fn format(&mut self, id: Option<FormatId>) -> Result<&[FieldDescriptor]> {
        let id = match id {
            Some(id) => {
                if !self.cache.contains_key(&id) {
                    self.scan_until(Some(id))?;
                }
                id
            }
            None => {
                self.scan()?;
                ROOT_FORMAT_ID
            }
        };
        self.cache
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(Error::FormatNotFound(id))
    }

    /// Finish walking the payload, registering every inline format.
    pub fn scan(&mut self) -> Result<()> {
        self.scan_until(None)
    }

    /// Cached format for `id`, without scanning.
    pub fn cached(&self, id: FormatId) -> Option<&[FieldDescriptor]> {
        self.cache.get(&id).map(Vec::as_slice)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.cache.keys().copied()
    }

    /// Registered formats in ascending id order.
    pub fn formats(&self) -> impl Iterator<Item = (FormatId, &[FieldDescriptor])> + '_ {
        self.cache.iter().map(|(id, format)| (*id, format.as_slice()))
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether the whole payload has been visited.
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Copy `node`, inlining the format of every link-only record in it.
    pub fn resolve_links(&mut self, node: &Value) -> Result<Value> {
        match node {
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_links(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(obj) => {
                let mut resolved = Map::new();
                for (key, value) in obj {
                    let value = if key == "s" {
                        value.clone()
                    } else {
                        self.resolve_links(value)?
                    };
                    resolved.insert(key.clone(), value);
                }
                if obj.contains_key("d") && !obj.contains_key("s") {
                    if let Some(raw_id) = obj.get("f") {
                        let format = self.format(Some(format_id(raw_id)?))?;
                        let format = serde_json::to_value(format)
                            .map_err(|e| Error::InvalidFormat(e.to_string()))?;
                        resolved.insert("s".to_string(), format);
                    }
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn scan_until(&mut self, wanted: Option<FormatId>) -> Result<()> {
        if !self.pending.is_empty() {
            trace!(?wanted, pending = self.pending.len(), "resuming format scan");
        }
        while let Some(&node) = self.pending.last() {
            // Parse before popping so a malformed node fails the same way next time.
            let inline = self.inline_format(node)?;
            self.pending.pop();
            self.push_children(node);

            if let Some((id, format)) = inline {
                trace!(id, fields = format.len(), "registered inline format");
                self.cache.insert(id, format);
                if wanted == Some(id) {
                    return Ok(());
                }
            }
        }
        debug!(formats = self.cache.len(), "format scan complete");
        Ok(())
    }

    /// Inline definition carried by `node`, unless its id is already known.
    fn inline_format(&self, node: &Value) -> Result<Option<(FormatId, Format)>> {
        let Some(obj) = node.as_object() else {
            return Ok(None);
        };
        if !obj.contains_key("d") {
            return Ok(None);
        }
        let (Some(raw_id), Some(raw_format)) = (obj.get("f"), obj.get("s")) else {
            return Ok(None);
        };
        let id = format_id(raw_id)?;
        if self.cache.contains_key(&id) {
            return Ok(None);
        }
        Ok(Some((id, parse_format(raw_format)?)))
    }

    fn push_children(&mut self, node: &'a Value) {
        let nested = |value: &&'a Value| value.is_object() || value.is_array();
        match node {
            Value::Array(items) => self.pending.extend(items.iter().rev().filter(nested)),
            Value::Object(obj) => self.pending.extend(
                obj.iter()
                    .rev()
                    .filter(|(key, _)| key.as_str() != "s")
                    .map(|(_, value)| value)
                    .filter(nested),
            ),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldKind;
    use serde_json::json;

    fn family() -> Value {
        json!({
            "f": 0,
            "s": [
                {"n": "@Parent", "t": "Integer"},
                {"n": "Name", "t": "String"},
                {"n": "Children", "t": {"n": "Array", "t": "Object"}}
            ],
            "d": [0, "Peter", [
                {"f": 1, "s": [{"n": "@Child", "t": "Integer"}, {"n": "Name", "t": "String"}], "d": [0, "Vova"]},
                {"f": 1, "d": [0, "Olga"]}
            ]]
        })
    }

    fn names(format: &[FieldDescriptor]) -> Vec<&str> {
        format.iter().map(|field| field.name.as_str()).collect()
    }

    #[test]
    fn resolves_root_and_child() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);

        let root = finder.format(Some(0)).unwrap().to_vec();
        assert_eq!(names(&root), vec!["@Parent", "Name", "Children"]);
        assert_eq!(
            root[2].kind(),
            FieldKind::Array(Box::new(FieldKind::Object))
        );

        let child = finder.format(Some(1)).unwrap().to_vec();
        assert_eq!(names(&child), vec!["@Child", "Name"]);
    }

    #[test]
    fn missing_id_is_a_reference_error() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);
        assert_eq!(finder.format(Some(2)), Err(Error::FormatNotFound(2)));
        assert!(finder.is_exhausted());
        assert_eq!(finder.format(Some(2)), Err(Error::FormatNotFound(2)));
    }

    #[test]
    fn lookup_scans_lazily() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);

        finder.format(Some(0)).unwrap();
        assert!(!finder.is_exhausted());
        assert_eq!(finder.cached(1), None);

        finder.scan().unwrap();
        assert!(finder.is_exhausted());
        assert_eq!(finder.ids().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn cached_lookup_is_stable() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);
        let first = finder.format(Some(1)).unwrap().to_vec();
        let second = finder.format(Some(1)).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(finder.len(), 2);
    }

    #[test]
    fn no_id_returns_root_after_full_scan() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);
        assert_eq!(finder.format(None).unwrap().len(), 3);
        assert!(finder.is_exhausted());
        assert!(finder.cached(1).is_some());
    }

    #[test]
    fn no_id_without_root_fails() {
        let payload = json!({"f": 5, "s": [{"n": "a", "t": "String"}], "d": ["x"]});
        let mut finder = FormatFinder::new(&payload);
        assert_eq!(finder.format(None), Err(Error::FormatNotFound(ROOT_FORMAT_ID)));
        assert!(finder.cached(5).is_some());
    }

    #[test]
    fn malformed_nodes_fail_repeatably() {
        let payload = json!({"f": "zero", "s": [], "d": []});
        let mut finder = FormatFinder::new(&payload);
        assert!(matches!(finder.scan(), Err(Error::InvalidFormat(_))));
        assert!(matches!(finder.scan(), Err(Error::InvalidFormat(_))));

        let payload = json!({"f": 0, "s": [{"t": "String"}], "d": []});
        let mut finder = FormatFinder::new(&payload);
        assert!(matches!(finder.format(Some(0)), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn finds_formats_inside_wrappers() {
        let payload = json!({
            "jsonrpc": "2.0",
            "result": [
                {"f": 3, "s": [{"n": "x", "t": "Integer"}], "d": [1]}
            ]
        });
        let mut finder = FormatFinder::new(&payload);
        assert_eq!(names(finder.format(Some(3)).unwrap()), vec!["x"]);
    }

    #[test]
    fn resolve_links_inlines_formats() {
        let payload = family();
        let mut finder = FormatFinder::new(&payload);
        let children = finder.resolve_links(&payload["d"][2]).unwrap();

        assert_eq!(children[1]["s"], payload["d"][2][0]["s"]);
        assert_eq!(children[1]["d"], json!([0, "Olga"]));
        assert_eq!(children[0], payload["d"][2][0]);
    }

    #[test]
    fn resolve_links_fails_on_dangling_link() {
        let payload = json!({"f": 7, "d": []});
        let mut finder = FormatFinder::new(&payload);
        assert_eq!(
            finder.resolve_links(&payload),
            Err(Error::FormatNotFound(7))
        );
    }
}
