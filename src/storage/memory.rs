use super::engine::{FindMany, Model, NestedWrite, Persistable, WriteData};
use crate::core::{Result, StoreError, fields_to_json};
use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Row = JsonMap<String, JsonValue>;

/// A child collection written through its parent.
#[derive(Debug, Clone)]
struct NestedRelation {
    field: String,
    parent_key: String,
}

/// Access counters, mostly useful to assert that a code path never touched storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub reads: usize,
    pub writes: usize,
}

/// In-memory table backed by JSON rows.
///
/// Rows are kept as JSON objects and decoded into `R` on the way out, so a
/// write that does not satisfy the model is rejected as a constraint violation
/// before it is stored.
pub struct MemoryTable<R> {
    name: String,
    unique: Vec<Vec<String>>,
    relations: Vec<NestedRelation>,
    rows: RwLock<BTreeMap<i64, Row>>,
    next_id: AtomicI64,
    next_child_id: AtomicI64,
    reads: AtomicUsize,
    writes: AtomicUsize,
    _model: PhantomData<fn() -> R>,
}

impl<R: Model> MemoryTable<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: Vec::new(),
            relations: Vec::new(),
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            next_child_id: AtomicI64::new(1),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            _model: PhantomData,
        }
    }

    /// Declares a (possibly composite) unique constraint.
    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.unique
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Declares a child collection stored under `field`; each child gets its
    /// own id and a `parent_key` back reference.
    pub fn nested(mut self, field: &str, parent_key: &str) -> Self {
        self.relations.push(NestedRelation {
            field: field.to_string(),
            parent_key: parent_key.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn materialize(&self, id: i64, data: WriteData) -> Result<Row> {
        let mut row = fields_to_json(&data.fields);
        row.insert("id".to_string(), JsonValue::from(id));

        for (field, write) in data.nested {
            let relation = self
                .relations
                .iter()
                .find(|relation| relation.field == field)
                .ok_or_else(|| {
                    StoreError::ConstraintViolation(format!(
                        "{} has no nested relation '{}'",
                        self.name, field
                    ))
                })?;

            let NestedWrite::Create(children) = write;
            let children = children
                .into_iter()
                .map(|mut child| {
                    let child_id = self.next_child_id.fetch_add(1, Ordering::SeqCst);
                    child.insert("id".to_string(), JsonValue::from(child_id));
                    child.insert(relation.parent_key.clone(), JsonValue::from(id));
                    JsonValue::Object(child)
                })
                .collect();
            row.insert(field, JsonValue::Array(children));
        }

        Ok(row)
    }

    fn check_unique<'a>(
        &self,
        candidate: &Row,
        existing: impl Iterator<Item = &'a Row> + Clone,
    ) -> Result<()> {
        for constraint in &self.unique {
            let key: Option<Vec<&JsonValue>> = constraint
                .iter()
                .map(|field| candidate.get(field).filter(|value| !value.is_null()))
                .collect();
            let Some(key) = key else {
                continue;
            };

            let taken = existing.clone().any(|row| {
                constraint
                    .iter()
                    .zip(&key)
                    .all(|(field, value)| row.get(field) == Some(*value))
            });
            if taken {
                return Err(StoreError::UniqueViolation {
                    table: self.name.clone(),
                    fields: constraint.clone(),
                });
            }
        }
        Ok(())
    }

    fn decode(&self, row: &Row) -> Result<R> {
        serde_json::from_value(JsonValue::Object(row.clone())).map_err(|err| {
            StoreError::ConstraintViolation(format!("{} record rejected: {}", self.name, err))
        })
    }

    fn strip_relations(&self, row: &mut Row, include: &[String]) {
        for relation in &self.relations {
            if !include.contains(&relation.field) {
                row.remove(&relation.field);
            }
        }
    }
}

#[async_trait]
impl<R: Model> Persistable<R> for MemoryTable<R> {
    async fn find_one(&self, id: i64) -> Result<Option<R>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read().await;
        rows.get(&id).map(|row| self.decode(row)).transpose()
    }

    async fn find_many(&self, query: FindMany) -> Result<Vec<R>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read().await;

        rows.values()
            .filter(|row| query.filter.as_ref().is_none_or(|filter| filter.matches(row)))
            .map(|row| {
                let mut row = row.clone();
                self.strip_relations(&mut row, &query.include);
                self.decode(&row)
            })
            .collect()
    }

    async fn create(&self, data: WriteData) -> Result<R> {
        let mut rows = self.rows.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let row = self.materialize(id, data)?;
        self.check_unique(&row, rows.values())?;
        let record = self.decode(&row)?;

        rows.insert(id, row);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn create_many(&self, data: Vec<WriteData>) -> Result<Vec<R>> {
        let mut rows = self.rows.write().await;
        let mut staged: Vec<(i64, Row)> = Vec::with_capacity(data.len());
        let mut records = Vec::with_capacity(data.len());

        for item in data {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let row = self.materialize(id, item)?;
            self.check_unique(&row, rows.values().chain(staged.iter().map(|(_, row)| row)))?;
            records.push(self.decode(&row)?);
            staged.push((id, row));
        }

        self.writes.fetch_add(staged.len(), Ordering::SeqCst);
        rows.extend(staged);
        Ok(records)
    }

    async fn update(&self, id: i64, data: WriteData) -> Result<R> {
        let mut rows = self.rows.write().await;
        let current = rows.get(&id).ok_or_else(|| StoreError::NotFound {
            table: self.name.clone(),
            id,
        })?;

        if !data.nested.is_empty() {
            return Err(StoreError::ConstraintViolation(
                "nested writes are only supported on create".to_string(),
            ));
        }

        let mut merged = current.clone();
        for (field, value) in fields_to_json(&data.fields) {
            if field != "id" {
                merged.insert(field, value);
            }
        }

        self.check_unique(
            &merged,
            rows.iter()
                .filter(move |(row_id, _)| **row_id != id)
                .map(|(_, row)| row),
        )?;
        let record = self.decode(&merged)?;

        rows.insert(id, merged);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<R> {
        let mut rows = self.rows.write().await;
        let row = rows.remove(&id).ok_or_else(|| StoreError::NotFound {
            table: self.name.clone(),
            id,
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.decode(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fields, Value};
    use crate::storage::Filter;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: i64,
        item_id: i64,
        label: String,
    }

    impl Model for Item {
        fn id(&self) -> i64 {
            self.id
        }
    }

    fn table() -> MemoryTable<Item> {
        MemoryTable::new("Item").unique(&["code"]).nested("parts", "item_id")
    }

    fn write(code: &str) -> WriteData {
        let mut fields = Fields::new();
        fields.insert("code".into(), Value::from(code));
        WriteData::new(fields)
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let table = table();
        let a = table.create(write("a")).await.unwrap();
        let b = table.create(write("b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_unique_constraint_is_enforced() {
        let table = table();
        table.create(write("a")).await.unwrap();
        let err = table.create(write("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        let batch = table.create_many(vec![write("b"), write("b")]).await;
        assert!(batch.is_err());
        assert_eq!(table.len().await, 1, "failed batch must not insert anything");
    }

    #[tokio::test]
    async fn test_nested_children_get_ids_and_parent_key() {
        let table = table();
        let mut data = write("a");
        data.nested.insert(
            "parts".into(),
            NestedWrite::Create(vec![
                json!({ "label": "x" }).as_object().cloned().unwrap(),
                json!({ "label": "y" }).as_object().cloned().unwrap(),
            ]),
        );

        let item = table.create(data).await.unwrap();
        let parts = item.parts.unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|part| part.item_id == item.id));
        assert_ne!(parts[0].id, parts[1].id);
    }

    #[tokio::test]
    async fn test_find_many_strips_relations_not_included() {
        let table = table();
        let mut data = write("a");
        data.nested.insert(
            "parts".into(),
            NestedWrite::Create(vec![json!({ "label": "x" }).as_object().cloned().unwrap()]),
        );
        table.create(data).await.unwrap();

        let bare = table.find_many(FindMany::all()).await.unwrap();
        assert!(bare[0].parts.is_none());

        let full = table.find_many(FindMany::all().include(["parts"])).await.unwrap();
        assert_eq!(full[0].parts.as_ref().map(Vec::len), Some(1));

        let one = table.find_one(1).await.unwrap().unwrap();
        assert!(one.parts.is_some());
    }

    #[tokio::test]
    async fn test_find_many_filter() {
        let table = table();
        for code in ["a", "b", "c"] {
            table.create(write(code)).await.unwrap();
        }
        let found = table
            .find_many(FindMany::filtered(
                Filter::new().any_of("code", vec![json!("a"), json!("c"), json!("z")]),
            ))
            .await
            .unwrap();
        let codes: Vec<_> = found.iter().map(|item| item.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing_rows() {
        let table = table();
        assert!(matches!(
            table.update(9, write("x")).await,
            Err(StoreError::NotFound { id: 9, .. })
        ));
        assert!(matches!(table.delete(9).await, Err(StoreError::NotFound { .. })));

        let item = table.create(write("a")).await.unwrap();
        let updated = table.update(item.id, write("b")).await.unwrap();
        assert_eq!(updated.code, "b");
        let deleted = table.delete(item.id).await.unwrap();
        assert_eq!(deleted.code, "b");
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_rows_not_matching_model_are_rejected() {
        let table = table();
        let err = table.create(WriteData::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_stats_count_reads_and_writes() {
        let table = table();
        table.create(write("a")).await.unwrap();
        table.find_one(1).await.unwrap();
        table.find_many(FindMany::all()).await.unwrap();
        assert_eq!(table.stats(), TableStats { reads: 2, writes: 1 });
    }
}
