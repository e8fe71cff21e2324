use async_trait::async_trait;
use futures::FutureExt;
use quizgate::core::{Actor, Fields, Role, StoreError, Value};
use quizgate::engine::{
    AccessPragma, Authorization, ComputedField, Permission, Placeholder, Record, Status,
    Table, TableDescriptor, Validator,
};
use quizgate::storage::{FindMany, MemoryTable, Model, Persistable, WriteData};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    id: i64,
    title: String,
    owner_id: i64,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

impl Model for Note {
    fn id(&self) -> i64 {
        self.id
    }
}

const BASIC: Actor = Actor::new(1, Role::BasicUser);
const OTHER: Actor = Actor::new(2, Role::BasicUser);
const ADMIN: Actor = Actor::new(3, Role::AdminUser);
const ROOT: Actor = Actor::new(4, Role::SuperUser);

fn own_note(note: &Note, actor: &Actor) -> Authorization {
    if note.owner_id == actor.id {
        Authorization::allow()
    } else {
        Authorization::deny("Notes are private")
    }
}

fn slug() -> ComputedField {
    ComputedField::new("slug", |fields: &Fields| {
        let title = fields.get("title").map(Value::to_string).unwrap_or_default();
        async move { Ok::<_, anyhow::Error>(Value::Text(title.to_lowercase().replace(' ', "-"))) }
            .boxed()
    })
}

fn descriptor() -> TableDescriptor<Note> {
    TableDescriptor::new("Note")
        .schema(&["title", "owner_id", "secret"])
        .unique(&["title"])
        .computed(slug())
        .hidden("secret", Placeholder::SameLength('*'))
        .immutable(Role::BasicUser, &["owner_id", "title"])
        .validator(Validator::sync("title is required", |f| {
            f.get("title").is_some_and(|v| !v.is_empty())
        }))
        .validator(Validator::sync("title must be at most 20 characters", |f| {
            f.get("title").is_some_and(|v| v.to_string().chars().count() <= 20)
        }))
        .access(AccessPragma {
            create: Some(Role::ALL.to_vec()),
            read: Some(Permission::unconditional(&[Role::AdminUser]).conditional(own_note)),
            read_many: Some(vec![Role::AdminUser, Role::SuperUser]),
            update: Some(Permission::unconditional(&[Role::SuperUser]).conditional(own_note)),
            delete: Some(
                Permission::unconditional(&[Role::SuperUser, Role::BasicUser])
                    .deny_roles(&[Role::BasicUser]),
            ),
        })
}

fn notes() -> Table<Note, MemoryTable<Note>> {
    Table::new(
        descriptor(),
        Arc::new(MemoryTable::new("Note").unique(&["title"])),
    )
}

fn payload(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

async fn seed_note(table: &Table<Note, MemoryTable<Note>>, owner: &Actor, title: &str) -> i64 {
    let response = table
        .create(
            Some(owner),
            &payload(json!({ "title": title, "owner_id": owner.id, "secret": "hunter" })),
        )
        .await;
    assert_eq!(response.status, Status::Created, "{}", response.msg());
    response.record().unwrap()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn create_projects_computes_and_masks() {
    let table = notes();
    let response = table
        .create(
            Some(&BASIC),
            &payload(json!({
                "title": "Shopping List",
                "owner_id": 1,
                "secret": "hunter",
                "admin": true
            })),
        )
        .await;

    assert_eq!(response.status, Status::Created);
    assert_eq!(response.msg(), "Note successfully created");
    let record = response.record().unwrap();
    assert_eq!(record["secret"], json!("******"));
    assert_eq!(record["slug"], json!("shopping-list"));
    assert!(!record.contains_key("admin"));

    let stored = table.store().find_one(1).await.unwrap().unwrap();
    assert_eq!(stored.secret.as_deref(), Some("hunter"));
}

#[tokio::test]
async fn first_failing_validator_wins() {
    let table = notes();
    let response = table
        .create(Some(&BASIC), &payload(json!({ "owner_id": 1 })))
        .await;
    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(response.msg(), "title is required");
    assert!(response.data().is_none());

    let response = table
        .create(
            Some(&BASIC),
            &payload(json!({ "title": "A title that is far too long" })),
        )
        .await;
    assert_eq!(response.msg(), "title must be at most 20 characters");
    assert!(table.store().is_empty().await);
}

#[tokio::test]
async fn unauthenticated_create_is_refused() {
    let table = notes();
    let response = table.create(None, &payload(json!({ "title": "x" }))).await;
    assert_eq!(response.status, Status::Unauthorized);
    assert_eq!(response.msg(), "Failed to validate authentication");
}

#[tokio::test]
async fn duplicate_unique_key_is_a_conflict() {
    let table = notes();
    seed_note(&table, &BASIC, "Groceries").await;
    let response = table
        .create(Some(&OTHER), &payload(json!({ "title": "Groceries", "owner_id": 2 })))
        .await;
    assert_eq!(response.status, Status::Conflict);
    assert_eq!(response.msg(), "Unique constraint failed on the fields: (title)");
}

#[tokio::test]
async fn hook_failure_keeps_the_record_and_degrades() {
    let descriptor = descriptor().on_create(|_note: Note| {
        async { Err::<(), _>(anyhow::anyhow!("mailer offline")) }.boxed()
    });
    let table = Table::new(descriptor, Arc::new(MemoryTable::new("Note")));

    let response = table
        .create(Some(&BASIC), &payload(json!({ "title": "Groceries", "owner_id": 1 })))
        .await;

    assert_eq!(response.status, Status::Created);
    assert!(response.degraded);
    assert_eq!(
        response.msg(),
        "Note successfully created, but a follow-up action failed: mailer offline"
    );
    assert!(response.record().is_some());
    assert_eq!(table.store().len().await, 1);
}

#[tokio::test]
async fn read_one_applies_conditional_access() {
    let table = notes();
    let id = seed_note(&table, &BASIC, "Diary").await;

    let own = table.read_one(Some(&BASIC), id).await;
    assert_eq!(own.status, Status::Success);
    assert_eq!(own.msg(), format!("Fetched record {id} from Note"));
    assert_eq!(own.record().unwrap()["secret"], json!("******"));

    let other = table.read_one(Some(&OTHER), id).await;
    assert_eq!(other.status, Status::Forbidden);
    assert_eq!(other.msg(), "Notes are private");

    let admin = table.read_one(Some(&ADMIN), id).await;
    assert_eq!(admin.status, Status::Success);

    let root = table.read_one(Some(&ROOT), id).await;
    assert_eq!(root.status, Status::Forbidden);
    assert_eq!(root.msg(), "Notes are private");
}

#[tokio::test]
async fn missing_record_is_success_shaped() {
    let table = notes();
    let response = table.read_one(Some(&ADMIN), 99).await;
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.msg(), "No Note with the id: 99 found");
    assert!(response.data().is_none());

    let response = table.delete(Some(&ROOT), 99).await;
    assert_eq!(response.msg(), "No Note with the id: 99 found");
}

#[tokio::test]
async fn read_many_empty_and_masked() {
    let table = notes();
    let empty = table.read_many(Some(&ADMIN)).await;
    assert_eq!(empty.status, Status::Success);
    assert_eq!(empty.msg(), "No Notes found");
    assert!(empty.data().is_none());

    seed_note(&table, &BASIC, "Diary").await;
    seed_note(&table, &OTHER, "Plans").await;

    let listed = table.read_many(Some(&ADMIN)).await;
    assert_eq!(listed.msg(), "Fetched 2 records from Note");
    let records = listed.records().unwrap();
    assert!(records.iter().all(|record| record["secret"] == json!("******")));

    let denied = table.read_many(Some(&BASIC)).await;
    assert_eq!(denied.status, Status::Forbidden);
    assert_eq!(denied.msg(), "read requires an elevated permission level");
}

#[tokio::test]
async fn immutable_fields_reject_the_whole_update() {
    let table = notes();
    let id = seed_note(&table, &BASIC, "Diary").await;

    let response = table
        .update(
            Some(&BASIC),
            id,
            &payload(json!({ "title": "Journal", "owner_id": 9, "secret": "changed" })),
        )
        .await;

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(
        response.msg(),
        "Whoops! The following fields are immutable: owner_id, title"
    );
    let stored = table.store().find_one(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Diary");
    assert_eq!(stored.secret.as_deref(), Some("hunter"));
}

#[tokio::test]
async fn update_runs_only_present_computed_fields() {
    let table = notes();
    let id = seed_note(&table, &BASIC, "Diary").await;

    let response = table
        .update(Some(&BASIC), id, &payload(json!({ "secret": "s3cret!", "title": "" })))
        .await;
    assert_eq!(response.status, Status::Success, "{}", response.msg());
    assert_eq!(
        response.msg(),
        format!("Note with the id: {id} successfully updated")
    );
    let record = response.record().unwrap();
    assert_eq!(record["secret"], json!("*******"));
    assert_eq!(record["slug"], json!("diary"));

    let renamed = table
        .update(Some(&ROOT), id, &payload(json!({ "title": "Journal", "slug": "x" })))
        .await;
    assert_eq!(renamed.record().unwrap()["title"], json!("Journal"));
}

#[tokio::test]
async fn deny_list_beats_unconditional_and_skips_the_read() {
    let table = notes();
    let id = seed_note(&table, &BASIC, "Diary").await;
    let reads_before = table.store().stats().reads;

    let response = table.delete(Some(&BASIC), id).await;
    assert_eq!(response.status, Status::Forbidden);
    assert_eq!(response.msg(), "deletion requires an elevated permission level");
    assert_eq!(table.store().stats().reads, reads_before);

    let response = table.delete(Some(&ROOT), id).await;
    assert_eq!(response.status, Status::Success);
    assert_eq!(
        response.msg(),
        format!("Note with the id: {id} successfully deleted")
    );
    assert!(response.data().is_none());
}

#[tokio::test]
async fn disabled_operation_has_no_handler() {
    let descriptor: TableDescriptor<Note> = TableDescriptor::new("Note").schema(&["title"]);
    let table = Table::new(descriptor, Arc::new(MemoryTable::new("Note")));

    let response = table.create(Some(&ROOT), &payload(json!({ "title": "x" }))).await;
    assert_eq!(response.status, Status::NotFound);
    assert_eq!(response.msg(), "No Handler is available for Note creation");

    let response = table.update(Some(&ROOT), 1, &Record::new()).await;
    assert_eq!(response.msg(), "No Handler is available for Note modification");

    // no read_many pragma admits everyone
    let response = table.read_many(None).await;
    assert_eq!(response.status, Status::Success);
}

struct UnreachableStore;

#[async_trait]
impl Persistable<Note> for UnreachableStore {
    async fn find_one(&self, _id: i64) -> quizgate::core::Result<Option<Note>> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn find_many(&self, _query: FindMany) -> quizgate::core::Result<Vec<Note>> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn create(&self, _data: WriteData) -> quizgate::core::Result<Note> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn create_many(&self, _data: Vec<WriteData>) -> quizgate::core::Result<Vec<Note>> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn update(&self, _id: i64, _data: WriteData) -> quizgate::core::Result<Note> {
        Err(StoreError::Transport("connection refused".into()))
    }

    async fn delete(&self, _id: i64) -> quizgate::core::Result<Note> {
        Err(StoreError::Transport("connection refused".into()))
    }
}

#[tokio::test]
async fn persistence_failures_are_internal() {
    let table = Table::new(descriptor(), Arc::new(UnreachableStore));

    let response = table.read_many(Some(&ADMIN)).await;
    assert_eq!(response.status, Status::Internal);
    assert_eq!(response.msg(), "Transport error: connection refused");

    let response = table
        .create(Some(&BASIC), &payload(json!({ "title": "Diary", "owner_id": 1 })))
        .await;
    assert_eq!(response.status, Status::Internal);

    let response = table.read_one(Some(&ADMIN), 1).await;
    assert_eq!(response.status, Status::Internal);
    assert!(response.data().is_none());
}
