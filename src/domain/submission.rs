//! Quiz submissions. Each new submission is marked and folds into the
//! quiz's result.

use super::question::Question;
use super::quiz::Quiz;
use super::result::QuizResult;
use super::Store;
use crate::core::{Actor, Fields, Role, StoreError, Value};
use crate::engine::{AccessPragma, Authorization, Permission, TableDescriptor, Validator};
use crate::storage::{Filter, FindMany, MemoryTable, Model, Persistable, WriteData};
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Rating {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Four => "FOUR",
            Self::Five => "FIVE",
        }
    }

    pub const fn points(&self) -> i64 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
        }
    }

    /// Nearest rating to a mean of points, halves rounding up.
    pub fn nearest(mean: f64) -> Self {
        match mean.round() as i64 {
            i64::MIN..=1 => Self::One,
            2 => Self::Two,
            3 => Self::Three,
            4 => Self::Four,
            _ => Self::Five,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSubmission {
    pub id: i64,
    pub submission_id: i64,
    pub answer_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub rating: Rating,
    #[serde(default)]
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_submissions: Option<Vec<QuestionSubmission>>,
}

impl Submission {
    pub fn answer_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.question_submissions
            .iter()
            .flatten()
            .map(|entry| entry.answer_id)
    }
}

impl Model for Submission {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn store() -> Store<Submission> {
    MemoryTable::new("Submission")
        .unique(&["quiz_id", "user_id"])
        .nested("question_submissions", "submission_id")
}

pub fn descriptor(
    quizzes: Arc<Store<Quiz>>,
    questions: Arc<Store<Question>>,
    submissions: Arc<Store<Submission>>,
    results: Arc<Store<QuizResult>>,
) -> TableDescriptor<Submission> {
    let marker = Marker {
        questions: Arc::clone(&questions),
        submissions,
        results,
    };
    let open_quizzes = Arc::clone(&quizzes);
    let question_lookup = Arc::clone(&questions);

    TableDescriptor::new("Submission")
        .schema(&["quiz_id", "user_id", "rating"])
        .nested(&["question_submissions"])
        .unique(&["quiz_id", "user_id"])
        .relation("question_submissions", &["id", "answer_id"])
        .validator(Validator::with_async("No quiz found with that id!", move |f| {
            let quizzes = Arc::clone(&quizzes);
            let quiz_id = quiz_id(f);
            async move { find_quiz(&quizzes, quiz_id).await.is_some() }.boxed()
        }))
        .validator(Validator::with_async(
            "Quiz is not available for participation!",
            move |f| {
                let quizzes = Arc::clone(&open_quizzes);
                let quiz_id = quiz_id(f);
                async move {
                    find_quiz(&quizzes, quiz_id)
                        .await
                        .is_some_and(|quiz| quiz.is_open(Utc::now()))
                }
                .boxed()
            },
        ))
        .validator(answers_belong_to_quiz(Arc::clone(&question_lookup)))
        .validator(all_questions_answered(question_lookup))
        .access(AccessPragma {
            create: Some(Role::ALL.to_vec()),
            read: Some(
                Permission::unconditional(&[Role::AdminUser, Role::SuperUser])
                    .conditional(read_own),
            ),
            read_many: Some(Role::ALL.to_vec()),
            update: Some(Permission::unconditional(&[Role::AdminUser, Role::SuperUser])),
            delete: Some(Permission::unconditional(&[Role::SuperUser])),
        })
        .on_create(move |submission: Submission| marker.clone().mark(submission).boxed())
}

fn read_own(submission: &Submission, actor: &Actor) -> Authorization {
    if submission.user_id == actor.id {
        Authorization::allow()
    } else {
        Authorization::deny("You may not access the quiz submissions of other users")
    }
}

fn quiz_id(fields: &Fields) -> Option<i64> {
    fields.get("quiz_id").and_then(Value::as_i64)
}

async fn find_quiz(quizzes: &Store<Quiz>, quiz_id: Option<i64>) -> Option<Quiz> {
    let quiz_id = quiz_id?;
    match quizzes.find_one(quiz_id).await {
        Ok(quiz) => quiz,
        Err(err) => {
            warn!(quiz = quiz_id, error = %err, "quiz lookup failed");
            None
        }
    }
}

/// `answer_id`s of the submitted entries, `None` when the payload is malformed.
fn submitted_answers(fields: &Fields) -> Option<Vec<i64>> {
    match fields.get("question_submissions") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Json(JsonValue::Array(entries))) => entries
            .iter()
            .map(|entry| entry.get("answer_id").and_then(JsonValue::as_i64))
            .collect(),
        Some(Value::Json(entry @ JsonValue::Object(_))) => {
            entry.get("answer_id").and_then(JsonValue::as_i64).map(|id| vec![id])
        }
        Some(_) => None,
    }
}

async fn quiz_questions(questions: &Store<Question>, quiz_id: i64) -> Vec<Question> {
    let query = FindMany::filtered(Filter::new().any_of("quiz_id", vec![json!(quiz_id)]))
        .include(["answers"]);
    match questions.find_many(query).await {
        Ok(questions) => questions,
        Err(err) => {
            warn!(quiz = quiz_id, error = %err, "question lookup failed");
            Vec::new()
        }
    }
}

/// Answer id to the question it belongs to.
fn answer_index(questions: &[Question]) -> HashMap<i64, i64> {
    questions
        .iter()
        .flat_map(|question| {
            question
                .answers
                .iter()
                .flatten()
                .map(move |answer| (answer.id, question.id))
        })
        .collect()
}

fn answers_belong_to_quiz(questions: Arc<Store<Question>>) -> Validator {
    Validator::with_async(
        "Every submitted answer must belong to a question of the quiz",
        move |f| {
            let questions = Arc::clone(&questions);
            let quiz_id = quiz_id(f);
            let answers = submitted_answers(f);
            async move {
                let (Some(quiz_id), Some(answers)) = (quiz_id, answers) else {
                    return false;
                };
                let index = answer_index(&quiz_questions(&questions, quiz_id).await);
                answers.iter().all(|answer| index.contains_key(answer))
            }
            .boxed()
        },
    )
}

/// Exactly one answer for every question of the quiz.
fn all_questions_answered(questions: Arc<Store<Question>>) -> Validator {
    Validator::with_async("All questions must be answered!", move |f| {
        let questions = Arc::clone(&questions);
        let quiz_id = quiz_id(f);
        let answers = submitted_answers(f);
        async move {
            let (Some(quiz_id), Some(answers)) = (quiz_id, answers) else {
                return false;
            };
            let questions = quiz_questions(&questions, quiz_id).await;
            let index = answer_index(&questions);
            let answered: BTreeSet<i64> = answers
                .iter()
                .filter_map(|answer| index.get(answer).copied())
                .collect();
            answers.len() == questions.len() && answered.len() == questions.len()
        }
        .boxed()
    })
}

/// Post-create marking: score the submission, then recompute the quiz result.
#[derive(Clone)]
struct Marker {
    questions: Arc<Store<Question>>,
    submissions: Arc<Store<Submission>>,
    results: Arc<Store<QuizResult>>,
}

impl Marker {
    async fn mark(self, submission: Submission) -> anyhow::Result<()> {
        let questions = quiz_questions(&self.questions, submission.quiz_id).await;
        let correct: BTreeSet<i64> = questions
            .iter()
            .flat_map(Question::correct_answer_ids)
            .collect();
        let score = submission
            .answer_ids()
            .filter(|answer| correct.contains(answer))
            .count() as i64;

        let mut fields = Fields::new();
        fields.insert("score".to_string(), Value::Integer(score));
        self.submissions
            .update(submission.id, WriteData::new(fields))
            .await?;
        debug!(submission = submission.id, score, "submission marked");

        let by_quiz = || Filter::new().any_of("quiz_id", vec![json!(submission.quiz_id)]);
        let all = self.submissions.find_many(FindMany::filtered(by_quiz())).await?;
        let Some(summary) = summarize(&all) else {
            return Ok(());
        };

        let mut fields = Fields::new();
        fields.insert("quiz_id".to_string(), Value::Integer(submission.quiz_id));
        fields.insert("average_score".to_string(), Value::Float(summary.average_score));
        fields.insert(
            "average_rating".to_string(),
            Value::from(summary.average_rating.as_str()),
        );
        fields.insert("winner_id".to_string(), Value::Integer(summary.winner_id));

        let existing = self.results.find_many(FindMany::filtered(by_quiz())).await?;
        upsert_result(&self.results, existing.first().map(|result| result.id), fields).await
    }
}

/// Writes the quiz result. A create that loses the race to a concurrent
/// first submission falls back to updating the row that won.
async fn upsert_result(
    results: &Store<QuizResult>,
    existing: Option<i64>,
    fields: Fields,
) -> anyhow::Result<()> {
    if let Some(id) = existing {
        results.update(id, WriteData::new(fields)).await?;
        return Ok(());
    }

    let quiz_id = fields.get("quiz_id").cloned().unwrap_or(Value::Null);
    match results.create(WriteData::new(fields.clone())).await {
        Ok(_) => Ok(()),
        Err(StoreError::UniqueViolation { .. }) => {
            let query = FindMany::filtered(Filter::new().any_of("quiz_id", vec![quiz_id.to_json()]));
            let winner = results.find_many(query).await?;
            let Some(result) = winner.first() else {
                anyhow::bail!("result for quiz {quiz_id} vanished during upsert");
            };
            debug!(result = result.id, "result created concurrently, updating instead");
            results.update(result.id, WriteData::new(fields)).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Summary {
    average_score: f64,
    average_rating: Rating,
    winner_id: i64,
}

/// Averages over every submission of one quiz. The top scorer wins; ties go
/// to the earliest submission.
fn summarize(submissions: &[Submission]) -> Option<Summary> {
    let winner = submissions
        .iter()
        .max_by(|a, b| a.score.cmp(&b.score).then(b.id.cmp(&a.id)))?;
    let count = submissions.len() as f64;
    let total_score: i64 = submissions.iter().map(|s| s.score).sum();
    let total_rating: i64 = submissions.iter().map(|s| s.rating.points()).sum();

    Some(Summary {
        average_score: total_score as f64 / count,
        average_rating: Rating::nearest(total_rating as f64 / count),
        winner_id: winner.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: i64, user_id: i64, score: i64, rating: Rating) -> Submission {
        Submission {
            id,
            quiz_id: 1,
            user_id,
            rating,
            score,
            question_submissions: None,
        }
    }

    #[test]
    fn test_nearest_rating() {
        assert_eq!(Rating::nearest(2.5), Rating::Three);
        assert_eq!(Rating::nearest(2.49), Rating::Two);
        assert_eq!(Rating::nearest(0.0), Rating::One);
        assert_eq!(Rating::nearest(7.0), Rating::Five);
    }

    #[test]
    fn test_summary_picks_top_scorer() {
        let all = vec![
            submission(1, 10, 3, Rating::Five),
            submission(2, 11, 8, Rating::Two),
            submission(3, 12, 8, Rating::Four),
        ];
        let summary = summarize(&all).unwrap();
        assert_eq!(summary.winner_id, 11);
        assert!((summary.average_score - 19.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.average_rating, Rating::Four);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_submitted_answers_shapes() {
        let mut fields = Fields::new();
        assert_eq!(submitted_answers(&fields), Some(vec![]));

        fields.insert(
            "question_submissions".into(),
            Value::Json(json!([{ "answer_id": 1 }, { "answer_id": 5 }])),
        );
        assert_eq!(submitted_answers(&fields), Some(vec![1, 5]));

        fields.insert(
            "question_submissions".into(),
            Value::Json(json!([{ "answer": 1 }])),
        );
        assert_eq!(submitted_answers(&fields), None);
    }

    #[tokio::test]
    async fn test_upsert_updates_a_result_it_did_not_see() {
        let results = crate::domain::result::store();
        let mut first = Fields::new();
        first.insert("quiz_id".into(), Value::Integer(1));
        first.insert("average_score".into(), Value::Float(1.0));
        first.insert("average_rating".into(), Value::from("ONE"));
        first.insert("winner_id".into(), Value::Integer(10));
        upsert_result(&results, None, first.clone()).await.unwrap();

        let mut second = first;
        second.insert("average_score".into(), Value::Float(1.5));
        second.insert("winner_id".into(), Value::Integer(11));
        upsert_result(&results, None, second).await.unwrap();

        let all = results.find_many(FindMany::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].winner_id, 11);
        assert!((all[0].average_score - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_only_owner_reads() {
        let own = submission(1, 7, 0, Rating::One);
        assert!(read_own(&own, &Actor::new(7, Role::BasicUser)).success);
        let denied = read_own(&own, &Actor::new(8, Role::BasicUser));
        assert_eq!(
            denied.message,
            "You may not access the quiz submissions of other users"
        );
    }
}
