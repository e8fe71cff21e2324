use super::Store;
use super::submission::Rating;
use crate::core::Role;
use crate::engine::{AccessPragma, Permission, TableDescriptor};
use crate::storage::{MemoryTable, Model};
use serde::{Deserialize, Serialize};

/// Aggregate outcome of one quiz, maintained by the submission hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub quiz_id: i64,
    pub average_score: f64,
    pub average_rating: Rating,
    pub winner_id: i64,
}

impl Model for QuizResult {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn store() -> Store<QuizResult> {
    MemoryTable::new("Result").unique(&["quiz_id"])
}

pub fn descriptor() -> TableDescriptor<QuizResult> {
    TableDescriptor::new("Result")
        .schema(&["quiz_id", "average_score", "average_rating", "winner_id"])
        .unique(&["quiz_id"])
        .access(AccessPragma {
            create: Some(vec![Role::AdminUser, Role::SuperUser]),
            read: Some(Permission::unconditional(&Role::ALL)),
            read_many: Some(Role::ALL.to_vec()),
            update: Some(Permission::unconditional(&[Role::SuperUser])),
            delete: Some(Permission::unconditional(&[Role::SuperUser])),
        })
}
