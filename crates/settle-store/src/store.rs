//! Generic Document Persistence
//!
//! The persistence interface the gateway drives. Owned by an external
//! store in production; the in-memory implementation supports the filter
//! and aggregation subset the platform actually issues and backs tests
//! and single-node deployments.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Aggregation stage the store cannot execute
    #[error("unsupported aggregation stage: {0}")]
    UnsupportedStage(String),
    /// Document or filter shape the store cannot work with
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Generic document store contract
///
/// Filters are JSON objects: `null` matches absent-or-null, plain values
/// match by equality, and `$ne` / `$in` / `$exists` operator objects are
/// supported. `update_one` applies `$set` semantics and returns the
/// matched count.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents matching the filter
    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, StoreError>;

    /// First document matching the filter
    async fn find_one(&self, collection: &str, filter: &Value)
        -> Result<Option<Value>, StoreError>;

    /// Insert a document
    async fn insert(&self, collection: &str, doc: Value) -> Result<(), StoreError>;

    /// Patch the first matching document, returning the matched count
    async fn update_one(
        &self,
        collection: &str,
        filter: &Value,
        patch: &Value,
    ) -> Result<u64, StoreError>;

    /// Physically remove the first matching document, returning the count
    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<u64, StoreError>;

    /// Run a multi-stage pipeline
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Value>, StoreError>;
}

/// In-memory document store
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Raw document count in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read();
        let docs = collections.get(collection).cloned().unwrap_or_default();
        docs.into_iter()
            .filter(|doc| matches(doc, filter))
            .map(Ok)
            .collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Value,
    ) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, filter)).cloned()))
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
        if !doc.is_object() {
            return Err(StoreError::Malformed("document must be an object".into()));
        }
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Value,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| StoreError::Malformed("patch must be an object".into()))?;

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(doc) = docs.iter_mut().find(|doc| matches(doc, filter)) else {
            return Ok(0);
        };
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::Malformed("stored document is not an object".into()))?;
        for (key, value) in patch {
            obj.insert(key.clone(), value.clone());
        }
        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<u64, StoreError> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        if let Some(pos) = docs.iter().position(|doc| matches(doc, filter)) {
            docs.remove(pos);
        }
        Ok((before - docs.len()) as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Value>, StoreError> {
        let mut docs = {
            let collections = self.collections.read();
            collections.get(collection).cloned().unwrap_or_default()
        };

        for stage in pipeline {
            let stage = stage
                .as_object()
                .ok_or_else(|| StoreError::Malformed("stage must be an object".into()))?;
            let (name, spec) = stage
                .iter()
                .next()
                .ok_or_else(|| StoreError::Malformed("empty stage".into()))?;
            match name.as_str() {
                "$match" => docs.retain(|doc| matches(doc, spec)),
                "$group" => docs = run_group(&docs, spec)?,
                "$sort" => run_sort(&mut docs, spec)?,
                "$limit" => {
                    let n = spec.as_u64().ok_or_else(|| {
                        StoreError::Malformed("$limit takes a number".into())
                    })?;
                    docs.truncate(n as usize);
                }
                other => return Err(StoreError::UnsupportedStage(other.to_string())),
            }
        }
        Ok(docs)
    }
}

/// Filter evaluation over one document
fn matches(doc: &Value, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return false;
    };
    conditions.iter().all(|(field, cond)| {
        let present = doc.get(field).is_some();
        let value = doc.get(field).unwrap_or(&Value::Null);
        match cond {
            Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                ops.iter().all(|(op, arg)| match op.as_str() {
                    "$ne" => value != arg,
                    "$in" => arg.as_array().is_some_and(|arr| arr.contains(value)),
                    "$exists" => arg.as_bool().is_some_and(|want| want == present),
                    _ => false,
                })
            }
            cond => value == cond,
        }
    })
}

fn resolve_operand<'a>(operand: &'a Value, doc: &'a Value) -> &'a Value {
    if let Some(path) = operand.as_str().and_then(|s| s.strip_prefix('$')) {
        doc.get(path).unwrap_or(&Value::Null)
    } else {
        operand
    }
}

fn run_group(docs: &[Value], spec: &Value) -> Result<Vec<Value>, StoreError> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::Malformed("$group takes an object".into()))?;
    let id_spec = spec.get("_id").cloned().unwrap_or(Value::Null);

    let mut groups: BTreeMap<String, (Value, Map<String, Value>)> = BTreeMap::new();
    for doc in docs {
        let key = resolve_operand(&id_spec, doc).clone();
        let key_repr = key.to_string();
        let (_, accumulators) = groups
            .entry(key_repr)
            .or_insert_with(|| (key.clone(), Map::new()));

        for (name, accumulator) in spec.iter().filter(|(name, _)| *name != "_id") {
            let operand = accumulator
                .get("$sum")
                .ok_or_else(|| StoreError::UnsupportedStage(format!("$group:{name}")))?;
            let delta = resolve_operand(operand, doc).as_i64().unwrap_or(0);
            let current = accumulators
                .get(name)
                .and_then(Value::as_i64)
                .unwrap_or(0);
            accumulators.insert(name.clone(), Value::from(current + delta));
        }
    }

    Ok(groups
        .into_values()
        .map(|(key, mut accumulators)| {
            accumulators.insert("_id".into(), key);
            Value::Object(accumulators)
        })
        .collect())
}

fn run_sort(docs: &mut [Value], spec: &Value) -> Result<(), StoreError> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::Malformed("$sort takes an object".into()))?;
    let Some((field, direction)) = spec.iter().next() else {
        return Ok(());
    };
    let descending = direction.as_i64() == Some(-1);
    docs.sort_by(|a, b| {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ordering = compare(left, right);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(())
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
