use crate::core::{Fields, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

/// A concrete record type stored in one table.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Synthetic numeric key.
    fn id(&self) -> i64;
}

/// Child records created together with their parent.
///
/// Only create-with-parent is supported; connecting existing children is not.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedWrite {
    Create(Vec<JsonMap<String, JsonValue>>),
}

impl NestedWrite {
    pub fn len(&self) -> usize {
        match self {
            Self::Create(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Data handed to `create`/`update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteData {
    pub fields: Fields,
    pub nested: BTreeMap<String, NestedWrite>,
}

impl WriteData {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            nested: BTreeMap::new(),
        }
    }
}

/// Conjunction of `field IN (values)` clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Vec<JsonValue>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause matching records whose `field` equals any of `values`.
    pub fn any_of(mut self, field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        self.clauses.push((field.into(), values));
        self
    }

    pub fn clauses(&self) -> &[(String, Vec<JsonValue>)] {
        &self.clauses
    }

    pub fn matches(&self, row: &JsonMap<String, JsonValue>) -> bool {
        self.clauses.iter().all(|(field, values)| {
            row.get(field)
                .is_some_and(|actual| values.iter().any(|candidate| candidate == actual))
        })
    }
}

/// Arguments of a set-based read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindMany {
    pub filter: Option<Filter>,
    /// Related fields to include; anything not named here is left out.
    pub include: Vec<String>,
}

impl FindMany {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            include: Vec::new(),
        }
    }

    pub fn include<I, T>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.include.extend(relations.into_iter().map(Into::into));
        self
    }
}

/// Persistence capability for one record type.
///
/// The engine is written once against this trait; each store provides the
/// atomicity of single-record writes. Concurrent updates to the same record
/// are last-writer-wins.
#[async_trait]
pub trait Persistable<R: Model>: Send + Sync {
    /// Returns the record with every related field populated.
    async fn find_one(&self, id: i64) -> Result<Option<R>>;

    async fn find_many(&self, query: FindMany) -> Result<Vec<R>>;

    async fn create(&self, data: WriteData) -> Result<R>;

    /// All-or-nothing batch insert.
    async fn create_many(&self, data: Vec<WriteData>) -> Result<Vec<R>>;

    async fn update(&self, id: i64, data: WriteData) -> Result<R>;

    async fn delete(&self, id: i64) -> Result<R>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_requires_every_clause() {
        let filter = Filter::new()
            .any_of("quiz_id", vec![json!(1), json!(2)])
            .any_of("user_id", vec![json!(7)]);

        let row = |quiz: i64, user: i64| {
            json!({ "quiz_id": quiz, "user_id": user })
                .as_object()
                .cloned()
                .unwrap()
        };

        assert!(filter.matches(&row(2, 7)));
        assert!(!filter.matches(&row(3, 7)));
        assert!(!filter.matches(&row(1, 8)));
        assert!(!filter.matches(&JsonMap::new()));
    }
}
