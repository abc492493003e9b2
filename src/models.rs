use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// The backend serializes LocalDateTime without a zone offset; newer builds
/// emit RFC 3339. Accept both, treating zone-less values as UTC.
pub(crate) mod flexible_utc {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else { return Ok(None) };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}

// Wire types mirroring the backend JSON contract. Field names follow the
// backend's camelCase convention; optional fields default so that older
// server builds that omit them still deserialize.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "HR")]
    Hr,
    #[serde(rename = "EMPLOYEE")]
    Employee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Evaluating,
    Evaluated,
}

impl AttemptStatus {
    /// Position along the lifecycle. Attempts only ever move forward.
    pub fn rank(self) -> u8 {
        match self {
            AttemptStatus::InProgress => 0,
            AttemptStatus::Completed => 1,
            AttemptStatus::Evaluating => 1,
            AttemptStatus::Evaluated => 2,
        }
    }

    pub fn can_advance_to(self, next: AttemptStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Evaluated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    OpenAnswer,
}

/// JSON envelope used by every backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "none_data")]
    pub data: Option<T>,
}

fn none_data<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    /// Synthetic envelope for empty or non-JSON bodies (e.g. 204 No Content).
    pub fn bare_success() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }
}

// ---------- Auth ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

// ---------- Users ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
}

// ---------- Tests ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    #[serde(default)]
    pub max_possible_score: Option<i32>,
    #[serde(default)]
    pub question_count: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    // Present on the employee's available-tests listing only.
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default)]
    pub assigner_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetail {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    #[serde(default)]
    pub max_possible_score: Option<i32>,
    #[serde(default)]
    pub question_count: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub questions: Vec<QuestionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub max_score: i32,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub options: Vec<AnswerOptionDetail>,
    #[serde(default)]
    pub correct_open_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOptionDetail {
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub order_index: Option<i32>,
}

/// Payload for creating or updating a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub questions: Vec<QuestionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub max_score: i32,
    pub order_index: i32,
    #[serde(default)]
    pub options: Vec<OptionPayload>,
    #[serde(default)]
    pub correct_open_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    pub text: String,
    pub is_correct: bool,
    pub order_index: i32,
}

// ---------- Assignment ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTestRequest {
    pub user_ids: Vec<i64>,
    pub deadline: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub assigned_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// ---------- Attempts ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    #[serde(default)]
    pub test_id: Option<i64>,
    #[serde(default)]
    pub test_title: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub passing_score: Option<i32>,
    pub status: AttemptStatus,
    #[serde(default)]
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTestRequest {
    pub test_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProgress {
    pub attempt_id: i64,
    pub test_id: i64,
    pub test_title: String,
    #[serde(default, with = "flexible_utc")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_utc")]
    pub auto_submit_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_left_minutes: Option<i32>,
    #[serde(default)]
    pub current_question_index: Option<usize>,
    pub total_questions: usize,
    #[serde(default)]
    pub passing_score: Option<i32>,
    #[serde(default)]
    pub current_question: Option<QuestionWithAnswer>,
    #[serde(default)]
    pub question_progress: Vec<QuestionProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProgress {
    pub question_id: i64,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub answered: bool,
    #[serde(default)]
    pub visited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithAnswer {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    // Answer previously saved for this question, if any.
    #[serde(default)]
    pub previous_answer: Option<String>,
    #[serde(default)]
    pub previous_selected_options: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub order_index: Option<i32>,
}

/// Answer upsert: exactly one of the two payload shapes is populated
/// depending on the question type. Re-sending for the same question
/// overwrites the stored answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_answer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoToQuestionRequest {
    pub question_id: i64,
}

// ---------- Results ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: i64,
    #[serde(default)]
    pub test_id: Option<i64>,
    pub test_title: String,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub max_possible_score: Option<i32>,
    #[serde(default)]
    pub passing_score: Option<i32>,
    pub status: AttemptStatus,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub correct_answers_count: Option<i32>,
    #[serde(default)]
    pub total_questions: Option<i32>,
    #[serde(default)]
    pub answers: Vec<AnswerResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    #[serde(default)]
    pub answer_id: Option<i64>,
    pub question_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub question_max_score: Option<i32>,
    #[serde(default)]
    pub user_answer: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<OptionWithSelection>,
    #[serde(default)]
    pub assigned_score: Option<i32>,
    #[serde(default)]
    pub auto_score: Option<i32>,
    #[serde(default)]
    pub final_score: Option<i32>,
    #[serde(default)]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionWithSelection {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub selected: Option<bool>,
}

// ---------- Evaluation ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAnswerReview {
    pub id: i64,
    #[serde(default)]
    pub attempt_id: Option<i64>,
    #[serde(default)]
    pub question_id: Option<i64>,
    #[serde(default)]
    pub test_title: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub question_text: String,
    pub max_score: i32,
    #[serde(default)]
    pub open_answer_text: Option<String>,
    #[serde(default)]
    pub assigned_score: Option<i32>,
    #[serde(default)]
    pub auto_score: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAnswerRequest {
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptForEvaluation {
    pub id: i64,
    #[serde(default)]
    pub test_title: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub auto_score: Option<i32>,
    #[serde(default)]
    pub open_questions_count: Option<i32>,
    pub status: AttemptStatus,
}

impl AttemptForEvaluation {
    pub fn display_employee_name(&self) -> String {
        if let Some(name) = &self.employee_name {
            return name.clone();
        }
        match &self.user {
            Some(u) => format!("{} {}", u.first_name, u.last_name),
            None => String::new(),
        }
    }
}

// ---------- Statistics ----------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrStatistics {
    #[serde(default)]
    pub total_tests: i64,
    #[serde(default)]
    pub total_employees: i64,
    #[serde(default)]
    pub completed_attempts: i64,
    #[serde(default)]
    pub pending_reviews: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_status_only_advances() {
        assert!(AttemptStatus::InProgress.can_advance_to(AttemptStatus::Completed));
        assert!(AttemptStatus::InProgress.can_advance_to(AttemptStatus::Evaluating));
        assert!(AttemptStatus::Evaluating.can_advance_to(AttemptStatus::Evaluated));
        assert!(!AttemptStatus::Evaluated.can_advance_to(AttemptStatus::InProgress));
        assert!(!AttemptStatus::Completed.can_advance_to(AttemptStatus::InProgress));
        assert!(!AttemptStatus::Evaluating.can_advance_to(AttemptStatus::Completed));
        assert!(AttemptStatus::Evaluated.is_terminal());
    }

    #[test]
    fn envelope_deserializes_with_missing_fields() {
        let env: ApiEnvelope<Vec<i64>> =
            serde_json::from_str(r#"{"success":true,"message":"Success"}"#).unwrap();
        assert!(env.success);
        assert!(env.data.is_none());
    }

    #[test]
    fn progress_deserializes_from_backend_shape() {
        let json = r#"{
            "attemptId": 7,
            "testId": 3,
            "testTitle": "Rust Basics",
            "startedAt": "2025-06-01T10:00:00Z",
            "autoSubmitAt": "2025-06-01T10:30:00Z",
            "timeLeftMinutes": 30,
            "currentQuestionIndex": 0,
            "totalQuestions": 5,
            "currentQuestion": {
                "id": 11,
                "text": "What does ownership mean?",
                "type": "OPEN_ANSWER",
                "orderIndex": 0
            },
            "questionProgress": [
                {"questionId": 11, "orderIndex": 0, "answered": false, "visited": true}
            ]
        }"#;
        let progress: TestProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.attempt_id, 7);
        assert_eq!(progress.total_questions, 5);
        let question = progress.current_question.unwrap();
        assert_eq!(question.question_type, QuestionType::OpenAnswer);
        assert!(question.options.is_empty());
    }

    #[test]
    fn zone_less_timestamps_are_accepted() {
        let json = r#"{
            "attemptId": 1,
            "testId": 1,
            "testTitle": "t",
            "autoSubmitAt": "2025-06-01T10:30:00",
            "totalQuestions": 1
        }"#;
        let progress: TestProgress = serde_json::from_str(json).unwrap();
        let deadline = progress.auto_submit_at.unwrap();
        assert_eq!(deadline.to_rfc3339(), "2025-06-01T10:30:00+00:00");
    }

    #[test]
    fn submit_answer_skips_absent_fields() {
        let choice = SubmitAnswerRequest {
            question_id: 4,
            selected_option_ids: Some(vec![1, 2]),
            open_answer_text: None,
        };
        let json = serde_json::to_value(&choice).unwrap();
        assert!(json.get("openAnswerText").is_none());
        assert_eq!(json["selectedOptionIds"], serde_json::json!([1, 2]));

        let open = SubmitAnswerRequest {
            question_id: 5,
            selected_option_ids: None,
            open_answer_text: Some("ownership moves values".into()),
        };
        let json = serde_json::to_value(&open).unwrap();
        assert!(json.get("selectedOptionIds").is_none());
    }
}
