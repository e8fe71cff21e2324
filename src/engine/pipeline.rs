//! Inbound computation and outbound masking.

use super::descriptor::{ComputedField, Placeholder, Relation};
use super::response::Record;
use crate::core::Fields;
use serde_json::Value as JsonValue;

/// Runs the computed fields in declaration order; each one sees the results
/// of the ones before it.
pub async fn compute<'a, I>(computed: I, fields: &mut Fields) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a ComputedField>,
{
    for field in computed {
        let value = field.compute(fields).await?;
        fields.insert(field.name.clone(), value);
    }
    Ok(())
}

/// Masks hidden fields and trims related collections to their selected
/// fields. Works on an outbound copy; the stored record is never touched.
pub fn mask(record: &mut Record, hidden: &[(String, Placeholder)], relations: &[Relation]) {
    for (field, placeholder) in hidden {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        let rendered = match &*value {
            JsonValue::Null => continue,
            JsonValue::String(text) => placeholder.render(text),
            other => placeholder.render(&other.to_string()),
        };
        *value = JsonValue::String(rendered);
    }

    for relation in relations.iter().filter(|relation| !relation.select.is_empty()) {
        match record.get_mut(&relation.name) {
            Some(JsonValue::Array(children)) => {
                for child in children {
                    select(child, &relation.select);
                }
            }
            Some(child @ JsonValue::Object(_)) => select(child, &relation.select),
            _ => {}
        }
    }
}

fn select(child: &mut JsonValue, keep: &[String]) {
    if let JsonValue::Object(map) = child {
        map.retain(|key, _| keep.contains(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use futures::FutureExt;
    use serde_json::json;

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_later_fields_see_earlier_results() {
        let upper = ComputedField::new("slug", |fields| {
            let name = fields.get("name").map(|v| v.to_string()).unwrap_or_default();
            async move { Ok::<_, anyhow::Error>(Value::Text(name.to_uppercase())) }.boxed()
        });
        let tagged = ComputedField::new("tag", |fields| {
            let slug = fields.get("slug").map(|v| v.to_string()).unwrap_or_default();
            async move { Ok::<_, anyhow::Error>(Value::Text(format!("#{slug}"))) }.boxed()
        });

        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from("quiz"));
        compute([&upper, &tagged], &mut fields).await.unwrap();

        assert_eq!(fields["slug"], Value::from("QUIZ"));
        assert_eq!(fields["tag"], Value::from("#QUIZ"));
    }

    #[tokio::test]
    async fn test_failure_stops_the_chain() {
        let failing = ComputedField::new("password", |_| {
            async { Err::<Value, _>(anyhow::anyhow!("hashing unavailable")) }.boxed()
        });
        let mut fields = Fields::new();
        let err = compute([&failing], &mut fields).await.unwrap_err();
        assert_eq!(err.to_string(), "hashing unavailable");
        assert!(fields.is_empty());
    }

    #[test]
    fn test_mask_hides_value_and_keeps_length() {
        let hidden = vec![("password".to_string(), Placeholder::SameLength('*'))];
        let mut out = record(json!({ "id": 1, "password": "$2b$10$abc", "pin": null }));
        mask(&mut out, &hidden, &[]);
        assert_eq!(out["password"], json!("**********"));

        let hidden = vec![("pin".to_string(), Placeholder::Fixed("***".into()))];
        mask(&mut out, &hidden, &[]);
        assert_eq!(out["pin"], JsonValue::Null);
    }

    #[test]
    fn test_mask_renders_non_text_values() {
        let hidden = vec![("pin".to_string(), Placeholder::SameLength('#'))];
        let mut out = record(json!({ "id": 1, "pin": 4821 }));
        mask(&mut out, &hidden, &[]);
        assert_eq!(out["pin"], json!("####"));
    }

    #[test]
    fn test_relation_select_drops_other_child_fields() {
        let relations = vec![Relation {
            name: "answers".into(),
            select: vec!["id".into(), "text".into()],
        }];
        let mut out = record(json!({
            "id": 3,
            "answers": [
                { "id": 1, "text": "Paris", "correct": true, "question_id": 3 }
            ]
        }));
        mask(&mut out, &[], &relations);
        assert_eq!(out["answers"], json!([{ "id": 1, "text": "Paris" }]));
    }
}
