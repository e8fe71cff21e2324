use super::access::{Crud, Decision};
use super::orchestrator::{Table, split_nested};
use super::pipeline::compute;
use super::projector::project;
use super::response::{Data, Record, Response, SeedSummary};
use crate::connection::SeedPool;
use crate::core::{Actor, Fields, Role, Value};
use crate::storage::{Filter, FindMany, Model, Persistable, WriteData};
use serde_json::Value as JsonValue;
use tracing::{error, info};

impl<R: Model, S: Persistable<R>> Table<R, S> {
    /// Bulk-imports a named pool, skipping candidates whose unique-key tuple
    /// already exists. `pool_name = None` picks the first declared pool.
    pub async fn seed<P>(
        &self,
        actor: Option<&Actor>,
        pool_name: Option<&str>,
        pool: &P,
    ) -> Response
    where
        P: SeedPool + ?Sized,
    {
        let descriptor = self.descriptor();
        let pragma = match pool_name {
            None => descriptor.seed.first(),
            Some(name) => descriptor.seed.iter().find(|pragma| pragma.pool == name),
        };
        let Some(pragma) = pragma else {
            return self.no_handler(Crud::Seeding);
        };

        let Some(current_actor) = actor else {
            return self.refuse(Decision::Unauthenticated, Crud::Seeding, actor);
        };
        if !pragma.unconditional.contains(&current_actor.role) {
            let allowed: Vec<&str> = pragma.unconditional.iter().map(Role::as_str).collect();
            let message = format!(
                "Get outta town! {} can only be seeded by {}",
                descriptor.name,
                allowed.join(",")
            );
            return self.refuse(Decision::Deny(message), Crud::Seeding, actor);
        }

        let candidates = match pool.fetch(&pragma.pool).await {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(
                    table = %descriptor.name,
                    pool = %pragma.pool,
                    error = %err,
                    "seed fetch failed"
                );
                return Response::internal(err.to_string());
            }
        };

        let mut projection: Vec<&str> = descriptor.writable();
        for field in &descriptor.unique {
            if !projection.contains(&field.as_str()) {
                projection.push(field);
            }
        }
        let candidates: Vec<_> = candidates
            .iter()
            .map(|candidate| project(&projection, candidate))
            .collect();

        let existing = match self.existing_tuples(&candidates).await {
            Ok(existing) => existing,
            Err(response) => return response,
        };

        let mut summary = SeedSummary::default();
        let mut seen: Vec<Record> = existing;
        let mut writes = Vec::new();
        for mut fields in candidates {
            let tuple = self.unique_tuple(|field| fields.get(field).map(Value::to_json));
            if !descriptor.unique.is_empty() && seen.contains(&tuple) {
                summary.skipped.push(tuple);
                continue;
            }

            let nested = match split_nested(&descriptor.nested_schema, &mut fields) {
                Ok(nested) => nested,
                Err(message) => return Response::bad_request(message),
            };
            if let Err(err) = compute(&descriptor.computed, &mut fields).await {
                return self.compute_failure(err);
            }

            seen.push(tuple);
            writes.push(WriteData { fields, nested });
        }

        let created = match self.store().create_many(writes).await {
            Ok(created) => created,
            Err(err) => return self.store_failure(err),
        };
        for record in &created {
            match serde_json::to_value(record) {
                Ok(JsonValue::Object(row)) => {
                    summary
                        .imported
                        .push(self.unique_tuple(|field| row.get(field).map(normalized)));
                }
                Ok(_) => {}
                Err(err) => return self.store_failure(err.into()),
            }
        }

        info!(
            table = %descriptor.name,
            pool = %pragma.pool,
            imported = summary.imported.len(),
            skipped = summary.skipped.len(),
            "seed finished"
        );
        Response::created(format!("{} successfully seeded", descriptor.name))
            .with_data(Data::Seeded(summary))
    }

    /// Unique-key tuples of stored records that could collide with a
    /// candidate, read with one set-based query.
    async fn existing_tuples(&self, candidates: &[Fields]) -> Result<Vec<Record>, Response> {
        let unique = &self.descriptor().unique;
        if unique.is_empty() || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let filter = unique.iter().fold(Filter::new(), |filter, field| {
            let mut values: Vec<JsonValue> = Vec::new();
            for candidate in candidates {
                let value = candidate.get(field).map_or(JsonValue::Null, Value::to_json);
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            filter.any_of(field.clone(), values)
        });

        let records = self
            .store()
            .find_many(FindMany::filtered(filter))
            .await
            .map_err(|err| self.store_failure(err))?;

        records
            .iter()
            .map(|record| match serde_json::to_value(record) {
                Ok(JsonValue::Object(row)) => {
                    Ok(self.unique_tuple(|field| row.get(field).map(normalized)))
                }
                Ok(_) => Ok(Record::new()),
                Err(err) => Err(self.store_failure(err.into())),
            })
            .collect()
    }

    fn unique_tuple<F>(&self, lookup: F) -> Record
    where
        F: Fn(&str) -> Option<JsonValue>,
    {
        self.descriptor()
            .unique
            .iter()
            .map(|field| (field.clone(), lookup(field).unwrap_or(JsonValue::Null)))
            .collect()
    }
}

/// Stored values pass through the same coercion as candidates, so numeric
/// text compares equal to its projected form.
fn normalized(value: &JsonValue) -> JsonValue {
    Value::from_json(value).to_json()
}
