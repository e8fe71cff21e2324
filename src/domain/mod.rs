//! The quiz platform's record types and their table descriptors.

pub mod question;
pub mod quiz;
pub mod result;
pub mod submission;
pub mod user;
pub mod validation;

use crate::connection::AppConfig;
use crate::engine::Table;
use crate::storage::MemoryTable;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub use question::{Answer, Question};
pub use quiz::Quiz;
pub use result::QuizResult;
pub use submission::{QuestionSubmission, Rating, Submission};
pub use user::User;

/// Store backing every domain table.
pub type Store<R> = MemoryTable<R>;

/// Text field that also accepts the numeric form the projector produces for
/// digit-only input.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(text) => Ok(text),
        JsonValue::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

/// Every table the API serves.
#[derive(Clone)]
pub struct Tables {
    pub users: Table<User, Store<User>>,
    pub quizzes: Table<Quiz, Store<Quiz>>,
    pub questions: Table<Question, Store<Question>>,
    pub submissions: Table<Submission, Store<Submission>>,
    pub results: Table<QuizResult, Store<QuizResult>>,
}

impl Tables {
    pub fn new(config: &AppConfig) -> Self {
        let users = Arc::new(user::store());
        let quizzes = Arc::new(quiz::store());
        let questions = Arc::new(question::store());
        let submissions = Arc::new(submission::store());
        let results = Arc::new(result::store());

        let submission_descriptor = submission::descriptor(
            Arc::clone(&quizzes),
            Arc::clone(&questions),
            Arc::clone(&submissions),
            Arc::clone(&results),
        );

        Self {
            users: Table::new(user::descriptor(config.bcrypt_cost), users),
            quizzes: Table::new(quiz::descriptor(), quizzes),
            questions: Table::new(question::descriptor(), questions),
            submissions: Table::new(submission_descriptor, submissions),
            results: Table::new(result::descriptor(), results),
        }
    }
}
