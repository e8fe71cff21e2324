use super::access::AccessPragma;
use crate::core::{Fields, Role, Value};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type CheckFn = dyn Fn(&Fields) -> BoxFuture<'static, bool> + Send + Sync;
type ComputeFn = dyn Fn(&Fields) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
type HookFn<R> = dyn Fn(R) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// One create-time validation step. The first failing step wins.
#[derive(Clone)]
pub struct Validator {
    pub message: Option<String>,
    check: Arc<CheckFn>,
}

impl Validator {
    pub fn sync<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Fields) -> bool + Send + Sync + 'static,
    {
        Self {
            message: Some(message.into()),
            check: Arc::new(move |fields| {
                let passed = check(fields);
                async move { passed }.boxed()
            }),
        }
    }

    /// A validator that has to reach other tables or the clock before answering.
    pub fn with_async<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Fields) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self {
            message: Some(message.into()),
            check: Arc::new(check),
        }
    }

    pub async fn check(&self, fields: &Fields) -> bool {
        (self.check)(fields).await
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A field whose stored value is derived from the projected attributes.
#[derive(Clone)]
pub struct ComputedField {
    pub name: String,
    compute: Arc<ComputeFn>,
}

impl ComputedField {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Fields) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Arc::new(compute),
        }
    }

    pub async fn compute(&self, fields: &Fields) -> anyhow::Result<Value> {
        (self.compute)(fields).await
    }
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Replacement for a hidden field on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// Repeats the character as many times as the rendered value is long.
    SameLength(char),
    Fixed(String),
}

impl Placeholder {
    pub fn render(&self, original: &str) -> String {
        match self {
            Self::SameLength(c) => std::iter::repeat_n(*c, original.chars().count()).collect(),
            Self::Fixed(text) => text.clone(),
        }
    }
}

/// Related collection requested on reads, with the child fields allowed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub select: Vec<String>,
}

/// Bulk import policy for one named pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPragma {
    pub pool: String,
    pub unconditional: Vec<Role>,
}

/// Static metadata describing one record type.
///
/// Built once at startup and shared read-only afterwards.
pub struct TableDescriptor<R> {
    pub name: String,
    pub schema: Vec<String>,
    pub nested_schema: Vec<String>,
    pub unique: Vec<String>,
    pub computed: Vec<ComputedField>,
    pub hidden: Vec<(String, Placeholder)>,
    pub immutables: HashMap<Role, Vec<String>>,
    pub relations: Vec<Relation>,
    pub access: AccessPragma<R>,
    pub validators: Vec<Validator>,
    pub on_create: Option<Arc<HookFn<R>>>,
    pub seed: Vec<SeedPragma>,
}

impl<R> TableDescriptor<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Vec::new(),
            nested_schema: Vec::new(),
            unique: Vec::new(),
            computed: Vec::new(),
            hidden: Vec::new(),
            immutables: HashMap::new(),
            relations: Vec::new(),
            access: AccessPragma::default(),
            validators: Vec::new(),
            on_create: None,
            seed: Vec::new(),
        }
    }

    pub fn schema(mut self, fields: &[&str]) -> Self {
        self.schema = to_owned(fields);
        self
    }

    /// Fields whose structured payload becomes a create-with-parent write.
    pub fn nested(mut self, fields: &[&str]) -> Self {
        self.nested_schema = to_owned(fields);
        self
    }

    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.unique = to_owned(fields);
        self
    }

    pub fn computed(mut self, field: ComputedField) -> Self {
        self.computed.push(field);
        self
    }

    pub fn hidden(mut self, field: &str, placeholder: Placeholder) -> Self {
        self.hidden.push((field.to_string(), placeholder));
        self
    }

    pub fn immutable(mut self, role: Role, fields: &[&str]) -> Self {
        self.immutables.insert(role, to_owned(fields));
        self
    }

    pub fn relation(mut self, name: &str, select: &[&str]) -> Self {
        self.relations.push(Relation {
            name: name.to_string(),
            select: to_owned(select),
        });
        self
    }

    pub fn access(mut self, access: AccessPragma<R>) -> Self {
        self.access = access;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn on_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(R) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(hook));
        self
    }

    pub fn seed(mut self, pool: &str, roles: &[Role]) -> Self {
        self.seed.push(SeedPragma {
            pool: pool.to_string(),
            unconditional: roles.to_vec(),
        });
        self
    }

    /// Immutable fields for `role`, in declaration order.
    pub fn immutables_for(&self, role: Role) -> &[String] {
        self.immutables
            .get(&role)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_computed(&self, field: &str) -> bool {
        self.computed.iter().any(|computed| computed.name == field)
    }

    /// Writable fields including the nested collections.
    pub fn writable(&self) -> Vec<&str> {
        self.schema
            .iter()
            .chain(&self.nested_schema)
            .map(String::as_str)
            .collect()
    }
}

impl<R> fmt::Debug for TableDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("nested_schema", &self.nested_schema)
            .field("unique", &self.unique)
            .field("computed", &self.computed)
            .field("hidden", &self.hidden)
            .field("immutables", &self.immutables)
            .field("relations", &self.relations)
            .field("access", &self.access)
            .field("validators", &self.validators)
            .field("on_create", &self.on_create.is_some())
            .field("seed", &self.seed)
            .finish()
    }
}

fn to_owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}
