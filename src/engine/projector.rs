use crate::core::{Fields, Value};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Keeps only the declared fields that are present in `body`, coerced to
/// typed values. Absent fields stay absent so partial updates only touch
/// what was sent.
pub fn project<S: AsRef<str>>(schema: &[S], body: &JsonMap<String, JsonValue>) -> Fields {
    schema
        .iter()
        .filter_map(|field| {
            let field = field.as_ref();
            body.get(field)
                .map(|raw| (field.to_string(), Value::from_json(raw)))
        })
        .collect()
}
