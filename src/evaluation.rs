use log::info;
use serde::Serialize;
use tauri::{AppHandle, State};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{AttemptForEvaluation, EvaluateAnswerRequest, OpenAnswerReview, Role};
use crate::render;
use crate::{surface_error, AppState};

use crate::dashboard::WidgetState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Score cannot be negative")]
    NegativeScore,
    #[error("Score cannot exceed the maximum of {max}")]
    ExceedsMax { max: i32 },
    #[error("This answer does not belong to the attempt under review")]
    UnknownAnswer,
    #[error("No attempt is open for review")]
    NoActiveReview,
    #[error("Score every open answer before completing the review")]
    NotAllScored,
}

/// Bounds check performed before any network call.
pub fn validate_score(score: i32, max_score: i32) -> Result<(), EvaluationError> {
    if score < 0 {
        return Err(EvaluationError::NegativeScore);
    }
    if score > max_score {
        return Err(EvaluationError::ExceedsMax { max: max_score });
    }
    Ok(())
}

/// Pending open answers grouped per attempt, in first-seen order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewGroup {
    pub attempt_id: i64,
    pub test_title: String,
    pub employee_name: String,
    pub answers: Vec<OpenAnswerReview>,
}

pub fn group_open_answers(answers: Vec<OpenAnswerReview>) -> Vec<ReviewGroup> {
    let mut groups: Vec<ReviewGroup> = Vec::new();
    for answer in answers {
        let Some(attempt_id) = answer.attempt_id else {
            continue;
        };
        match groups.iter_mut().find(|g| g.attempt_id == attempt_id) {
            Some(group) => group.answers.push(answer),
            None => groups.push(ReviewGroup {
                attempt_id,
                test_title: answer.test_title.clone().unwrap_or_default(),
                employee_name: answer.employee_name.clone().unwrap_or_default(),
                answers: vec![answer],
            }),
        }
    }
    groups
}

pub fn render_review_groups(groups: &[ReviewGroup]) -> String {
    if groups.is_empty() {
        return render::render_empty("No open answers awaiting review");
    }

    groups
        .iter()
        .map(|group| {
            format!(
                r#"<div class="attempt-item" data-attempt-id="{id}">
    <div class="attempt-header">
        <h5>{title}</h5>
        <span class="badge bg-warning">{count} question(s)</span>
    </div>
    <div class="attempt-body">
        <p><strong>Employee:</strong> {employee}</p>
    </div>
    <div class="attempt-footer">
        <button class="btn btn-sm btn-primary" data-action="start-review" data-attempt-id="{id}">Start review</button>
    </div>
</div>"#,
                id = group.attempt_id,
                title = render::escape_html(&group.test_title),
                count = group.answers.len(),
                employee = render::escape_html(&group.employee_name),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One attempt under review. Holds the open answers and their locally
/// recorded scores until the review is finalized.
pub struct EvaluationSession {
    pub attempt_id: i64,
    pub test_title: String,
    pub employee_name: String,
    answers: Vec<OpenAnswerReview>,
}

impl EvaluationSession {
    /// Builds a review session from the global open-answer queue; `None`
    /// when the attempt has nothing left to review.
    pub fn from_open_answers(attempt_id: i64, all: Vec<OpenAnswerReview>) -> Option<Self> {
        let answers: Vec<OpenAnswerReview> = all
            .into_iter()
            .filter(|a| a.attempt_id == Some(attempt_id))
            .collect();
        let first = answers.first()?;

        Some(EvaluationSession {
            attempt_id,
            test_title: first.test_title.clone().unwrap_or_default(),
            employee_name: first.employee_name.clone().unwrap_or_default(),
            answers,
        })
    }

    /// Validates the score against this answer's maximum and produces the
    /// persist payload. Nothing is sent if validation fails.
    pub fn prepare_score(
        &self,
        answer_id: i64,
        score: i32,
        comment: Option<String>,
    ) -> Result<EvaluateAnswerRequest, EvaluationError> {
        let answer = self
            .answers
            .iter()
            .find(|a| a.id == answer_id)
            .ok_or(EvaluationError::UnknownAnswer)?;
        validate_score(score, answer.max_score)?;
        Ok(EvaluateAnswerRequest {
            score,
            comment: comment.filter(|c| !c.trim().is_empty()),
        })
    }

    /// Records an acknowledged score locally.
    pub fn record_score(&mut self, answer_id: i64, score: i32, comment: Option<String>) {
        if let Some(answer) = self.answers.iter_mut().find(|a| a.id == answer_id) {
            answer.assigned_score = Some(score);
            answer.comment = comment;
        }
    }

    /// The review can be completed once every open answer has a recorded
    /// score. A zero score counts like any other.
    pub fn all_scored(&self) -> bool {
        self.answers.iter().all(|a| a.assigned_score.is_some())
    }

    pub fn scored_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|a| a.assigned_score.is_some())
            .count()
    }

    pub fn total(&self) -> usize {
        self.answers.len()
    }

    pub fn markup(&self) -> String {
        self.answers
            .iter()
            .enumerate()
            .map(|(index, answer)| render::render_open_answer_review(answer, index))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationQueue {
    pub open_answer_groups: WidgetState<Vec<ReviewGroup>>,
    pub pending_attempts: WidgetState<Vec<AttemptForEvaluation>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub attempt_id: i64,
    pub test_title: String,
    pub employee_name: String,
    pub scored: usize,
    pub total: usize,
    pub all_scored: bool,
    pub markup: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewProgress {
    pub scored: usize,
    pub total: usize,
    pub all_scored: bool,
}

fn review_view(session: &EvaluationSession) -> ReviewView {
    ReviewView {
        attempt_id: session.attempt_id,
        test_title: session.test_title.clone(),
        employee_name: session.employee_name.clone(),
        scored: session.scored_count(),
        total: session.total(),
        all_scored: session.all_scored(),
        markup: session.markup(),
    }
}

fn require_hr(state: &State<'_, AppState>) -> Result<(), String> {
    if state.session.has_role(Role::Hr) {
        Ok(())
    } else {
        Err("This action requires the HR role".to_string())
    }
}

// ---------- Commands ----------

#[tauri::command]
pub async fn load_evaluation_queue(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<EvaluationQueue, String> {
    require_hr(&state)?;

    let (open_answers, pending) = tokio::join!(
        state.api.open_answers(),
        state.api.attempts_for_evaluation()
    );

    for error in [open_answers.as_ref().err(), pending.as_ref().err()]
        .into_iter()
        .flatten()
    {
        if error.is_auth_failure() {
            return Err(surface_error(&app, ApiError::Unauthorized));
        }
    }

    let groups = open_answers.map(group_open_answers);

    Ok(EvaluationQueue {
        open_answer_groups: WidgetState::from_result(groups, |g| render_review_groups(g)),
        pending_attempts: WidgetState::from_result(pending, |p| {
            render::render_pending_reviews(p)
        }),
    })
}

#[tauri::command]
pub async fn open_attempt_review(
    attempt_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<ReviewView, String> {
    require_hr(&state)?;

    let all = state
        .api
        .open_answers()
        .await
        .map_err(|e| surface_error(&app, e))?;

    let session = EvaluationSession::from_open_answers(attempt_id, all)
        .ok_or_else(|| "No open answers to review in this attempt".to_string())?;

    info!(
        "Reviewing attempt {} ({} open answers)",
        attempt_id,
        session.total()
    );

    let view = review_view(&session);
    *state.evaluation.lock() = Some(session);
    Ok(view)
}

#[tauri::command]
pub async fn save_answer_score(
    answer_id: i64,
    score: i32,
    comment: Option<String>,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<ReviewProgress, String> {
    require_hr(&state)?;

    let request = {
        let guard = state.evaluation.lock();
        let session = guard
            .as_ref()
            .ok_or_else(|| EvaluationError::NoActiveReview.to_string())?;
        session
            .prepare_score(answer_id, score, comment.clone())
            .map_err(|e| e.to_string())?
    };

    state
        .api
        .evaluate_answer(answer_id, &request)
        .await
        .map_err(|e| surface_error(&app, e))?;

    let mut guard = state.evaluation.lock();
    let session = guard
        .as_mut()
        .ok_or_else(|| EvaluationError::NoActiveReview.to_string())?;
    session.record_score(answer_id, score, request.comment.clone());

    Ok(ReviewProgress {
        scored: session.scored_count(),
        total: session.total(),
        all_scored: session.all_scored(),
    })
}

/// Finalizes the review: only valid once every open answer carries a score.
/// On success the attempt leaves the pending queue.
#[tauri::command]
pub async fn complete_attempt_evaluation(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<EvaluationQueue, String> {
    require_hr(&state)?;

    let attempt_id = {
        let guard = state.evaluation.lock();
        let session = guard
            .as_ref()
            .ok_or_else(|| EvaluationError::NoActiveReview.to_string())?;
        if !session.all_scored() {
            return Err(EvaluationError::NotAllScored.to_string());
        }
        session.attempt_id
    };

    info!("Completing evaluation of attempt {}", attempt_id);

    state
        .api
        .complete_evaluation(attempt_id)
        .await
        .map_err(|e| surface_error(&app, e))?;

    *state.evaluation.lock() = None;

    // Refresh both queues so the finished attempt disappears.
    load_evaluation_queue(app, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_answer(id: i64, attempt_id: i64, max_score: i32) -> OpenAnswerReview {
        OpenAnswerReview {
            id,
            attempt_id: Some(attempt_id),
            question_id: Some(id * 10),
            test_title: Some("Compliance Basics".into()),
            employee_name: Some("Maria Koval".into()),
            question_text: "Explain the policy".into(),
            max_score,
            open_answer_text: Some("Because...".into()),
            assigned_score: None,
            auto_score: Some(0),
            comment: None,
        }
    }

    #[test]
    fn score_bounds_are_enforced_before_any_call() {
        assert_eq!(validate_score(-1, 10), Err(EvaluationError::NegativeScore));
        assert_eq!(
            validate_score(11, 10),
            Err(EvaluationError::ExceedsMax { max: 10 })
        );
        assert_eq!(validate_score(0, 10), Ok(()));
        assert_eq!(validate_score(10, 10), Ok(()));
    }

    #[test]
    fn answers_group_by_attempt_in_first_seen_order() {
        let answers = vec![
            open_answer(1, 100, 5),
            open_answer(2, 200, 5),
            open_answer(3, 100, 5),
        ];
        let groups = group_open_answers(answers);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].attempt_id, 100);
        assert_eq!(groups[0].answers.len(), 2);
        assert_eq!(groups[1].attempt_id, 200);
        assert_eq!(groups[1].answers.len(), 1);
    }

    #[test]
    fn session_filters_to_one_attempt() {
        let all = vec![
            open_answer(1, 100, 5),
            open_answer(2, 200, 5),
            open_answer(3, 100, 5),
        ];
        let session = EvaluationSession::from_open_answers(100, all).unwrap();
        assert_eq!(session.total(), 2);
        assert_eq!(session.employee_name, "Maria Koval");

        assert!(EvaluationSession::from_open_answers(999, vec![open_answer(1, 100, 5)]).is_none());
    }

    #[test]
    fn prepare_score_validates_against_the_answers_own_maximum() {
        let session =
            EvaluationSession::from_open_answers(100, vec![open_answer(1, 100, 3)]).unwrap();
        assert_eq!(
            session.prepare_score(1, 4, None).unwrap_err(),
            EvaluationError::ExceedsMax { max: 3 }
        );
        assert_eq!(
            session.prepare_score(99, 1, None).unwrap_err(),
            EvaluationError::UnknownAnswer
        );

        let request = session
            .prepare_score(1, 3, Some("  ".into()))
            .unwrap();
        assert_eq!(request.score, 3);
        // Blank comments are dropped rather than persisted.
        assert!(request.comment.is_none());
    }

    #[test]
    fn zero_scores_count_toward_completion() {
        let mut session = EvaluationSession::from_open_answers(
            100,
            vec![open_answer(1, 100, 5), open_answer(2, 100, 5)],
        )
        .unwrap();
        assert!(!session.all_scored());

        session.record_score(1, 0, None);
        assert!(!session.all_scored());
        assert_eq!(session.scored_count(), 1);

        // A legitimately zero-scored answer must not block completion.
        session.record_score(2, 0, None);
        assert!(session.all_scored());
    }
}
