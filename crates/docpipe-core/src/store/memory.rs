//! In-memory document store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::document::{get_path, join_key, set_path, sort_order, unset_path};
use super::eval::Predicate;
use super::{Document, DocumentStore};
use crate::error::Error;
use crate::query::Stage;

type Collections = HashMap<String, Arc<Vec<Document>>>;

/// A thread-safe, in-memory map of collections to documents.
///
/// Collections are snapshotted under the read lock and pipelines run on the
/// snapshot, so writers never wait for a running aggregation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to a collection.
    pub fn insert(&self, collection: &str, doc: Document) {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        Arc::make_mut(docs).push(doc);
    }

    /// Append JSON objects to a collection. Non-object values are rejected.
    pub fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Value>,
    ) -> Result<usize, Error> {
        let docs = docs
            .into_iter()
            .map(|value| match value {
                Value::Object(doc) => Ok(doc),
                other => Err(Error::Store(format!(
                    "documents must be objects, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = docs.len();
        let mut collections = self.collections.write();
        Arc::make_mut(collections.entry(collection.to_string()).or_default()).extend(docs);
        Ok(count)
    }

    /// Load collections from a JSON object of `{collection: [documents]}`.
    pub fn load_json(&self, data: &Value) -> Result<usize, Error> {
        let Value::Object(collections) = data else {
            return Err(Error::Store(
                "seed data must be an object of collections".to_string(),
            ));
        };

        let mut total = 0;
        for (name, docs) in collections {
            let Value::Array(docs) = docs else {
                return Err(Error::Store(format!(
                    "collection '{}' must be an array of documents",
                    name
                )));
            };
            total += self.insert_many(name, docs.iter().cloned())?;
        }
        Ok(total)
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }

    /// Names of all collections.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot the base collection and every collection a `$lookup` reads.
    fn snapshot(&self, collection: &str, pipeline: &[Value]) -> Collections {
        let mut names: HashSet<&str> = HashSet::new();
        names.insert(collection);
        for stage in pipeline {
            if let Some(from) = stage
                .get("$lookup")
                .and_then(|lookup| lookup.get("from"))
                .and_then(Value::as_str)
            {
                names.insert(from);
            }
        }

        let collections = self.collections.read();
        names
            .into_iter()
            .filter_map(|name| {
                collections
                    .get(name)
                    .map(|docs| (name.to_string(), Arc::clone(docs)))
            })
            .collect()
    }

    /// Run a compiled pipeline over a snapshot.
    fn run(
        snapshot: &Collections,
        collection: &str,
        pipeline: &[Value],
    ) -> Result<Vec<Document>, Error> {
        let mut docs: Vec<Document> = snapshot
            .get(collection)
            .map(|docs| Vec::clone(docs))
            .unwrap_or_default();

        for stage in pipeline {
            let (name, spec) = single_key(stage)?;
            docs = match name {
                "$lookup" => lookup(snapshot, docs, spec)?,
                "$match" => {
                    let predicate = Predicate::compile(spec)?;
                    docs.retain(|doc| predicate.matches(doc));
                    docs
                }
                "$unset" => {
                    let paths = string_list(name, spec)?;
                    for doc in &mut docs {
                        for path in &paths {
                            unset_path(doc, path);
                        }
                    }
                    docs
                }
                "$count" => count(docs, spec)?,
                "$skip" => {
                    let n = non_negative(name, spec)?;
                    docs.into_iter().skip(n).collect()
                }
                "$limit" => {
                    let n = non_negative(name, spec)?;
                    if n == 0 {
                        return Err(Error::InvalidPipeline(
                            "$limit must be positive".to_string(),
                        ));
                    }
                    docs.truncate(n);
                    docs
                }
                "$sort" => sort(docs, spec)?,
                "$project" => project(docs, spec)?,
                "$set" | "$addFields" => add_fields(docs, name, spec)?,
                other => {
                    return Err(Error::InvalidPipeline(format!(
                        "unsupported stage '{}'",
                        other
                    )))
                }
            };
            trace!(stage = name, remaining = docs.len(), "Applied stage");
        }

        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>, Error> {
        let compiled: Vec<Value> = pipeline.iter().map(Stage::to_document).collect();
        let snapshot = self.snapshot(collection, &compiled);
        let docs = Self::run(&snapshot, collection, &compiled)?;
        debug!(
            collection = %collection,
            stages = compiled.len(),
            documents = docs.len(),
            "Aggregation complete"
        );
        Ok(docs)
    }
}

fn single_key(stage: &Value) -> Result<(&str, &Value), Error> {
    match stage {
        Value::Object(map) if map.len() == 1 => map
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| Error::InvalidPipeline("empty stage".to_string())),
        other => Err(Error::InvalidPipeline(format!(
            "a stage must be an object with exactly one key, got {}",
            other
        ))),
    }
}

fn string_list(stage: &str, spec: &Value) -> Result<Vec<String>, Error> {
    match spec {
        Value::String(path) => Ok(vec![path.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    Error::InvalidPipeline(format!("{} expects field path strings", stage))
                })
            })
            .collect(),
        _ => Err(Error::InvalidPipeline(format!(
            "{} expects a path or a list of paths",
            stage
        ))),
    }
}

fn non_negative(stage: &str, spec: &Value) -> Result<usize, Error> {
    spec.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::InvalidPipeline(format!("{} expects a non-negative integer", stage))
        })
}

fn object_spec<'a>(stage: &str, spec: &'a Value) -> Result<&'a Map<String, Value>, Error> {
    spec.as_object()
        .ok_or_else(|| Error::InvalidPipeline(format!("{} expects an object", stage)))
}

/// Hash join: index the foreign collection once, then look up each document.
fn lookup(snapshot: &Collections, docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, Error> {
    let spec = object_spec("$lookup", spec)?;
    let field = |key: &str| {
        spec.get(key).and_then(Value::as_str).ok_or_else(|| {
            Error::InvalidPipeline(format!("$lookup requires a string '{}'", key))
        })
    };
    let from = field("from")?;
    let local_field = field("localField")?;
    let foreign_field = field("foreignField")?;
    let alias = field("as")?;

    let foreign: &[Document] = snapshot
        .get(from)
        .map(|docs| docs.as_slice())
        .unwrap_or_default();

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, doc) in foreign.iter().enumerate() {
        let mut keys: Vec<String> = flatten(&get_path(doc, foreign_field))
            .into_iter()
            .map(join_key)
            .collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            index.entry(key).or_default().push(position);
        }
    }

    Ok(docs
        .into_iter()
        .map(|mut doc| {
            let mut positions: Vec<usize> = flatten(&get_path(&doc, local_field))
                .into_iter()
                .filter_map(|value| index.get(&join_key(value)))
                .flatten()
                .copied()
                .collect();
            positions.sort_unstable();
            positions.dedup();

            let joined = positions
                .into_iter()
                .map(|p| Value::Object(foreign[p].clone()))
                .collect();
            set_path(&mut doc, alias, Value::Array(joined));
            doc
        })
        .collect())
}

/// Expand array values into their elements.
fn flatten<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(values.len());
    for &value in values {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

fn count(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, Error> {
    let field = spec
        .as_str()
        .filter(|f| !f.is_empty() && !f.starts_with('$') && !f.contains('.'))
        .ok_or_else(|| Error::InvalidPipeline("$count expects a field name".to_string()))?;

    if docs.is_empty() {
        return Ok(Vec::new());
    }
    let mut row = Map::new();
    row.insert(field.to_string(), Value::from(docs.len()));
    Ok(vec![row])
}

fn sort(mut docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, Error> {
    let spec = object_spec("$sort", spec)?;
    if spec.is_empty() {
        return Err(Error::InvalidPipeline("$sort requires at least one key".to_string()));
    }
    let keys = spec
        .iter()
        .map(|(path, direction)| match direction.as_i64() {
            Some(1) => Ok((path.as_str(), false)),
            Some(-1) => Ok((path.as_str(), true)),
            _ => Err(Error::InvalidPipeline(format!(
                "$sort direction for '{}' must be 1 or -1",
                path
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(path, descending)| {
                let ord = sort_order(
                    get_path(a, path).first().copied(),
                    get_path(b, path).first().copied(),
                );
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(docs)
}

fn project(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, Error> {
    let spec = object_spec("$project", spec)?;

    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    for (path, flag) in spec {
        let on = match flag {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
            _ => {
                return Err(Error::InvalidPipeline(format!(
                    "$project value for '{}' must be a boolean or number",
                    path
                )))
            }
        };
        if path == "_id" {
            keep_id = on;
        } else if on {
            include.push(path.as_str());
        } else {
            exclude.push(path.as_str());
        }
    }

    if !include.is_empty() && !exclude.is_empty() {
        return Err(Error::InvalidPipeline(
            "$project cannot mix inclusion and exclusion".to_string(),
        ));
    }

    if include.is_empty() {
        return Ok(docs
            .into_iter()
            .map(|mut doc| {
                for path in &exclude {
                    unset_path(&mut doc, path);
                }
                if !keep_id {
                    doc.remove("_id");
                }
                doc
            })
            .collect());
    }

    Ok(docs
        .into_iter()
        .map(|doc| {
            let mut out = Map::new();
            if keep_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
            }
            for path in &include {
                if let Some(value) = get_path(&doc, path).first() {
                    set_path(&mut out, path, (*value).clone());
                }
            }
            out
        })
        .collect())
}

fn add_fields(docs: Vec<Document>, stage: &str, spec: &Value) -> Result<Vec<Document>, Error> {
    let spec = object_spec(stage, spec)?;
    for (path, value) in spec {
        if let Value::Object(map) = value {
            let literal =
                map.len() == 1 && (map.contains_key("$literal") || map.contains_key("$oid"));
            if !literal && map.keys().any(|k| k.starts_with('$')) {
                return Err(Error::InvalidPipeline(format!(
                    "{} does not support expressions (field '{}')",
                    stage, path
                )));
            }
        }
    }

    Ok(docs
        .into_iter()
        .map(|mut doc| {
            for (path, value) in spec {
                let resolved = resolve_value(&doc, value);
                set_path(&mut doc, path, resolved);
            }
            doc
        })
        .collect())
}

/// Resolve `"$field"` references and `{"$literal": v}`; anything else is a literal.
fn resolve_value(doc: &Document, value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with('$') && !s.starts_with("$$") => get_path(doc, &s[1..])
            .first()
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
        Value::Object(map) if map.len() == 1 && map.contains_key("$literal") => {
            map.get("$literal").cloned().unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::JoinSpec;
    use serde_json::json;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .load_json(&json!({
                "groups": [
                    {"_id": 1, "name": "admins", "code": "x1"},
                    {"_id": 2, "name": "users", "code": "x2"},
                ],
                "people": [
                    {"_id": 10, "name": "ann", "group": 1, "friends": [11, 12], "age": 30},
                    {"_id": 11, "name": "bob", "group": 2, "friends": [], "age": 25},
                    {"_id": 12, "name": "cid", "group": 2, "friends": [10], "age": 41},
                ],
            }))
            .unwrap();
        store
    }

    fn join(local: &str, collection: &str, alias: &str) -> Stage {
        Stage::Lookup(JoinSpec {
            local_field: local.to_string(),
            entity: collection.to_string(),
            collection: collection.to_string(),
            foreign_field: "_id".to_string(),
            alias: alias.to_string(),
            many: false,
        })
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter()
            .filter_map(|d| d.get("name").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_match_sort_skip_limit() {
        let docs = store()
            .aggregate(
                "people",
                &[
                    Stage::Match(json!({"age": {"$gte": 25}})),
                    Stage::Sort(json!({"age": -1})),
                    Stage::Skip(1),
                    Stage::Limit(1),
                ],
            )
            .await
            .unwrap();
        assert_eq!(names(&docs), ["ann"]);
    }

    #[tokio::test]
    async fn test_count() {
        let store = store();
        let docs = store
            .aggregate("people", &[Stage::Count("n".to_string())])
            .await
            .unwrap();
        assert_eq!(Value::Object(docs[0].clone()), json!({"n": 3}));

        let none = store
            .aggregate(
                "people",
                &[Stage::Match(json!({"name": "zed"})), Stage::Count("n".to_string())],
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_and_unset_per_element() {
        let docs = store()
            .aggregate(
                "people",
                &[
                    join("group", "groups", "group"),
                    join("friends", "people", "friends"),
                    Stage::Match(json!({"_id": 10})),
                    Stage::Unset(vec!["group.code".to_string(), "friends.age".to_string()]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc["group"], json!([{"_id": 1, "name": "admins"}]));
        let friends = doc["friends"].as_array().unwrap();
        assert_eq!(friends.len(), 2);
        assert!(friends.iter().all(|f| f.get("age").is_none()));
    }

    #[tokio::test]
    async fn test_lookup_missing_collection() {
        let docs = store()
            .aggregate("people", &[join("group", "nowhere", "g"), Stage::Limit(1)])
            .await
            .unwrap();
        assert_eq!(docs[0]["g"], json!([]));
    }

    #[tokio::test]
    async fn test_project_and_set() {
        let docs = store()
            .aggregate(
                "people",
                &[
                    Stage::Match(json!({"_id": 11})),
                    Stage::Raw(json!({"$set": {"label": "$name", "flag": true}})),
                    Stage::Raw(json!({"$project": {"label": 1, "flag": 1, "_id": 0}})),
                ],
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(docs[0].clone()), json!({"label": "bob", "flag": true}));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let docs = store().aggregate("ghosts", &[]).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_stages() {
        let store = store();
        for stage in [
            json!({"$group": {"_id": "$group"}}),
            json!({"$limit": 0}),
            json!({"$skip": -1}),
            json!({"$sort": {"age": 2}}),
            json!({"$project": {"a": 1, "b": 0}}),
            json!({"$match": 1, "$limit": 1}),
        ] {
            let result = store.aggregate("people", &[Stage::Raw(stage.clone())]).await;
            assert!(
                matches!(result, Err(Error::InvalidPipeline(_))),
                "expected failure for {}",
                stage
            );
        }
    }

    #[test]
    fn test_insert_rejects_non_objects() {
        let store = MemoryStore::new();
        assert!(store.insert_many("c", vec![json!(1)]).is_err());
        assert_eq!(store.insert_many("c", vec![json!({"a": 1})]).unwrap(), 1);
        assert_eq!(store.count("c"), 1);
        assert_eq!(store.collection_names(), ["c".to_string()]);
    }
}
