use super::{Store, lenient_text};
use crate::core::Role;
use crate::engine::{AccessPragma, Permission, TableDescriptor};
use crate::storage::{MemoryTable, Model};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    #[serde(deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    #[serde(deserialize_with = "lenient_text")]
    pub question: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<Answer>>,
}

impl Question {
    pub fn correct_answer_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.answers
            .iter()
            .flatten()
            .filter(|answer| answer.correct)
            .map(|answer| answer.id)
    }
}

impl Model for Question {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn store() -> Store<Question> {
    MemoryTable::new("Question")
        .unique(&["quiz_id", "question"])
        .nested("answers", "question_id")
}

/// Questions arrive through seeding only; there is no create route.
pub fn descriptor() -> TableDescriptor<Question> {
    let staff = [Role::AdminUser, Role::SuperUser];
    TableDescriptor::new("Question")
        .schema(&[
            "question",
            "difficulty",
            "category",
            "question_type",
            "quiz_id",
        ])
        .nested(&["answers"])
        .unique(&["quiz_id", "question"])
        .relation("answers", &["id", "text"])
        .immutable(Role::AdminUser, &["quiz_id", "question_type"])
        .immutable(Role::SuperUser, &["quiz_id", "question_type"])
        .access(AccessPragma {
            create: None,
            read: Some(Permission::unconditional(&Role::ALL)),
            read_many: Some(Role::ALL.to_vec()),
            update: Some(Permission::unconditional(&staff)),
            delete: Some(Permission::unconditional(&[Role::SuperUser])),
        })
        .seed("questions", &staff)
}
