use super::{Store, lenient_text};
use crate::core::{Fields, Role};
use crate::engine::{AccessPragma, Permission, TableDescriptor, Validator};
use crate::storage::{MemoryTable, Model};
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

pub const DIFFICULTIES: [&str; 4] = ["easy", "medium", "hard", "mixed"];
pub const QUESTION_TYPES: [&str; 3] = ["multiple", "boolean", "mixed"];

/// Longest a quiz may stay open.
pub const MAX_LENGTH_DAYS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "mixed")]
    pub difficulty: String,
    #[serde(default = "mixed")]
    pub question_type: String,
}

fn mixed() -> String {
    "mixed".to_string()
}

impl Quiz {
    /// Whether submissions are accepted at `now`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }
}

impl Model for Quiz {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn store() -> Store<Quiz> {
    MemoryTable::new("Quiz").unique(&["name"])
}

pub fn descriptor() -> TableDescriptor<Quiz> {
    let staff = [Role::AdminUser, Role::SuperUser];
    TableDescriptor::new("Quiz")
        .schema(&[
            "name",
            "start_date",
            "end_date",
            "category",
            "difficulty",
            "question_type",
        ])
        .unique(&["name"])
        .validator(Validator::sync(
            "`Name` must be between `5` and `30` characters inclusive",
            |f| super::validation::length_between(f, "name", 5, 30),
        ))
        .validator(Validator::sync(
            "`Start Date` and `End Date` must be valid dates",
            |f| dates(f).is_some(),
        ))
        .validator(Validator::sync("`Start Date` must be in the future", |f| {
            dates(f).is_some_and(|(start, _)| start > Utc::now())
        }))
        .validator(Validator::sync("A quiz cannot end before it starts", |f| {
            dates(f).is_some_and(|(start, end)| end >= start)
        }))
        .validator(Validator::sync("Quiz length must not exceed 5 days", |f| {
            dates(f).is_some_and(|(start, end)| end - start <= Duration::days(MAX_LENGTH_DAYS))
        }))
        .access(AccessPragma {
            create: Some(staff.to_vec()),
            read: Some(Permission::unconditional(&staff)),
            read_many: Some(Role::ALL.to_vec()),
            update: Some(Permission::unconditional(&staff)),
            delete: Some(Permission::unconditional(&[Role::SuperUser])),
        })
        .on_create(|quiz: Quiz| async move { check_vocabulary(&quiz) }.boxed())
        .seed("quizzes", &staff)
}

fn dates(fields: &Fields) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = fields.get("start_date")?.as_timestamp()?;
    let end = fields.get("end_date")?.as_timestamp()?;
    Some((start, end))
}

/// Difficulty and question type have to name something the trivia source offers.
fn check_vocabulary(quiz: &Quiz) -> anyhow::Result<()> {
    if !DIFFICULTIES.contains(&quiz.difficulty.as_str()) {
        anyhow::bail!("Invalid difficulty type: '{}'", quiz.difficulty);
    }
    if !QUESTION_TYPES.contains(&quiz.question_type.as_str()) {
        anyhow::bail!("Invalid question type: '{}'", quiz.question_type);
    }
    Ok(())
}
