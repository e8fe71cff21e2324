use super::access::{Crud, Decision, authorize_many, authorize_roles};
use super::descriptor::{ComputedField, TableDescriptor};
use super::pipeline::{compute, mask};
use super::projector::project;
use super::response::{Data, Record, Response};
use crate::core::{Actor, Fields, InvalidInput, StoreError, Value};
use crate::storage::{FindMany, Model, NestedWrite, Persistable, WriteData};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Message used whenever an operation arrives without a resolved actor.
pub const UNAUTHENTICATED: &str = "Failed to validate authentication";

/// One record type wired to its store: the single engine implementation every
/// table goes through.
pub struct Table<R, S> {
    descriptor: Arc<TableDescriptor<R>>,
    store: Arc<S>,
}

impl<R, S> Clone for Table<R, S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            store: Arc::clone(&self.store),
        }
    }
}

impl<R, S> fmt::Debug for Table<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<R: Model, S: Persistable<R>> Table<R, S> {
    pub fn new(descriptor: TableDescriptor<R>, store: Arc<S>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &TableDescriptor<R> {
        &self.descriptor
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create(&self, actor: Option<&Actor>, payload: &Record) -> Response {
        let descriptor = &*self.descriptor;
        let Some(roles) = descriptor.access.create.as_deref() else {
            return self.no_handler(Crud::Creation);
        };
        let decision = authorize_roles(actor, roles, Crud::Creation);
        if let Err(refusal) = self.admit(decision, Crud::Creation, actor) {
            return refusal;
        }

        let mut fields = project(&descriptor.writable(), payload);

        for validator in &descriptor.validators {
            if !validator.check(&fields).await {
                let message = validator
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} failed validation", descriptor.name));
                debug!(table = %descriptor.name, msg = %message, "validation failed");
                return Response::bad_request(message);
            }
        }

        let nested = match split_nested(&descriptor.nested_schema, &mut fields) {
            Ok(nested) => nested,
            Err(message) => return Response::bad_request(message),
        };

        if let Err(err) = compute(&descriptor.computed, &mut fields).await {
            return self.compute_failure(err);
        }

        let record = match self.store.create(WriteData { fields, nested }).await {
            Ok(record) => record,
            Err(err) => return self.store_failure(err),
        };
        let data = match self.outbound(&record) {
            Ok(data) => data,
            Err(err) => return self.store_failure(err),
        };

        if let Some(hook) = &descriptor.on_create {
            if let Err(err) = hook(record).await {
                warn!(table = %descriptor.name, error = %err, "post-create action failed");
                let mut response = Response::created(format!(
                    "{} successfully created, but a follow-up action failed: {}",
                    descriptor.name, err
                ))
                .with_data(Data::One(data));
                response.degraded = true;
                return response;
            }
        }

        Response::created(format!("{} successfully created", descriptor.name))
            .with_data(Data::One(data))
    }

    pub async fn read_one(&self, actor: Option<&Actor>, id: i64) -> Response {
        let Some(permission) = &self.descriptor.access.read else {
            return self.no_handler(Crud::Read);
        };

        let record = match self.store.find_one(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.not_found(id),
            Err(err) => return self.store_failure(err),
        };

        let decision = permission.authorize(actor, &record, Crud::Read);
        if let Err(refusal) = self.admit(decision, Crud::Read, actor) {
            return refusal;
        }

        match self.outbound(&record) {
            Ok(data) => Response::success(format!("Fetched record {} from {}", id, self.name()))
                .with_data(Data::One(data)),
            Err(err) => self.store_failure(err),
        }
    }

    /// Listing only consults the role list; records are never filtered one by one.
    pub async fn read_many(&self, actor: Option<&Actor>) -> Response {
        let roles = self.descriptor.access.read_many.as_deref();
        if !authorize_many(actor, roles) {
            let decision = match actor {
                None => Decision::Unauthenticated,
                Some(_) => Decision::Forbidden,
            };
            return self.refuse(decision, Crud::Read, actor);
        }

        let query = FindMany::all().include(
            self.descriptor
                .relations
                .iter()
                .map(|relation| relation.name.as_str()),
        );
        let records = match self.store.find_many(query).await {
            Ok(records) => records,
            Err(err) => return self.store_failure(err),
        };

        if records.is_empty() {
            return Response::success(format!("No {}s found", self.name()));
        }

        let data: Result<Vec<Record>, StoreError> =
            records.iter().map(|record| self.outbound(record)).collect();
        match data {
            Ok(data) => {
                Response::success(format!("Fetched {} records from {}", data.len(), self.name()))
                    .with_data(Data::Many(data))
            }
            Err(err) => self.store_failure(err),
        }
    }

    pub async fn update(&self, actor: Option<&Actor>, id: i64, payload: &Record) -> Response {
        let descriptor = &*self.descriptor;
        let Some(permission) = &descriptor.access.update else {
            return self.no_handler(Crud::Modification);
        };
        let Some(current_actor) = actor else {
            return self.refuse(Decision::Unauthenticated, Crud::Modification, actor);
        };

        let record = match self.store.find_one(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.not_found(id),
            Err(err) => return self.store_failure(err),
        };

        let offending: Vec<&str> = descriptor
            .immutables_for(current_actor.role)
            .iter()
            .map(String::as_str)
            .filter(|field| {
                payload
                    .get(*field)
                    .is_some_and(|raw| !Value::from_json(raw).is_empty())
            })
            .collect();
        if !offending.is_empty() {
            debug!(table = %descriptor.name, id, fields = ?offending, "immutable fields in update");
            return Response::bad_request(format!(
                "Whoops! The following fields are immutable: {}",
                offending.join(", ")
            ));
        }

        if let Err(refusal) = self.admit(
            permission.authorize(actor, &record, Crud::Modification),
            Crud::Modification,
            actor,
        ) {
            return refusal;
        }

        let mut fields = project(&descriptor.schema, payload);
        let present: Vec<&ComputedField> = descriptor
            .computed
            .iter()
            .filter(|computed| fields.contains_key(&computed.name))
            .collect();
        if let Err(err) = compute(present, &mut fields).await {
            return self.compute_failure(err);
        }

        let updated = match self.store.update(id, WriteData::new(fields)).await {
            Ok(updated) => updated,
            Err(err) => return self.store_failure(err),
        };

        match self.outbound(&updated) {
            Ok(data) => Response::success(format!(
                "{} with the id: {} successfully updated",
                descriptor.name, id
            ))
            .with_data(Data::One(data)),
            Err(err) => self.store_failure(err),
        }
    }

    /// The deny-list and role tiers are settled before the record is read.
    pub async fn delete(&self, actor: Option<&Actor>, id: i64) -> Response {
        let Some(permission) = &self.descriptor.access.delete else {
            return self.no_handler(Crud::Deletion);
        };

        let screened = permission.screen(actor, Crud::Deletion);
        let needs_record = match screened {
            Decision::Allow => false,
            Decision::NeedsRecord => true,
            refused => return self.refuse(refused, Crud::Deletion, actor),
        };

        let record = match self.store.find_one(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.not_found(id),
            Err(err) => return self.store_failure(err),
        };

        if needs_record {
            if let Err(refusal) = self.admit(
                permission.authorize(actor, &record, Crud::Deletion),
                Crud::Deletion,
                actor,
            ) {
                return refusal;
            }
        }

        match self.store.delete(id).await {
            Ok(_) => Response::success(format!(
                "{} with the id: {} successfully deleted",
                self.name(),
                id
            )),
            Err(err) => self.store_failure(err),
        }
    }

    /// Success-shaped answer for an id with no record behind it.
    pub fn not_found(&self, id: impl fmt::Display) -> Response {
        Response::success(format!("No {} with the id: {} found", self.name(), id))
    }

    pub(crate) fn no_handler(&self, op: Crud) -> Response {
        Response::not_found(format!("No Handler is available for {} {}", self.name(), op))
    }

    pub(crate) fn admit(
        &self,
        decision: Decision,
        op: Crud,
        actor: Option<&Actor>,
    ) -> Result<(), Response> {
        match decision {
            Decision::Allow => Ok(()),
            refused => Err(self.refuse(refused, op, actor)),
        }
    }

    pub(crate) fn refuse(&self, decision: Decision, op: Crud, actor: Option<&Actor>) -> Response {
        let response = match decision {
            Decision::Unauthenticated => Response::unauthorized(UNAUTHENTICATED),
            Decision::Deny(message) => Response::forbidden(message),
            Decision::Forbidden | Decision::NeedsRecord | Decision::Allow => {
                Response::forbidden(op.elevation_message())
            }
        };
        debug!(
            table = %self.name(),
            operation = %op,
            role = ?actor.map(|actor| actor.role),
            msg = %response.msg(),
            "access denied"
        );
        response
    }

    pub(crate) fn store_failure(&self, err: StoreError) -> Response {
        match err {
            StoreError::NotFound { id, .. } => self.not_found(id),
            StoreError::UniqueViolation { .. } => Response::conflict(err.to_string()),
            StoreError::ConstraintViolation(_) => Response::bad_request(err.to_string()),
            StoreError::Serialization(_) | StoreError::Transport(_) => {
                error!(table = %self.name(), error = %err, "persistence failure");
                Response::internal(err.to_string())
            }
        }
    }

    pub(crate) fn compute_failure(&self, err: anyhow::Error) -> Response {
        if let Some(input) = err.downcast_ref::<InvalidInput>() {
            debug!(table = %self.name(), msg = %input, "computed field rejected input");
            return Response::bad_request(input.to_string());
        }
        error!(table = %self.name(), error = %err, "computed field failed");
        Response::internal(err.to_string())
    }

    /// Serializes and masks a record for the caller.
    pub(crate) fn outbound(&self, record: &R) -> Result<Record, StoreError> {
        match serde_json::to_value(record)? {
            JsonValue::Object(mut map) => {
                mask(&mut map, &self.descriptor.hidden, &self.descriptor.relations);
                Ok(map)
            }
            other => Err(StoreError::Serialization(format!(
                "{} record is not an object: {}",
                self.name(),
                other
            ))),
        }
    }
}

/// Moves structured nested fields out of `fields` as create-with-parent writes.
pub(crate) fn split_nested(
    nested_schema: &[String],
    fields: &mut Fields,
) -> Result<BTreeMap<String, NestedWrite>, String> {
    let mut nested = BTreeMap::new();
    for name in nested_schema {
        let Some(value) = fields.remove(name) else {
            continue;
        };
        let children = match value {
            Value::Null => continue,
            Value::Json(JsonValue::Object(child)) if child.contains_key("connect") => {
                return Err(format!("Connecting existing {name} is not supported"));
            }
            Value::Json(JsonValue::Object(child)) => vec![child],
            Value::Json(JsonValue::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    JsonValue::Object(child) => Ok(child),
                    _ => Err(format!("Every entry of {name} must be an object")),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(format!("{name} must be an object or a list of objects")),
        };
        nested.insert(name.clone(), NestedWrite::Create(children));
    }
    Ok(nested)
}
