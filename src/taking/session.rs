use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tauri::{AppHandle, Emitter, State};

use crate::api::ApiClient;
use crate::models::{
    QuestionWithAnswer, Role, SubmitAnswerRequest, TestProgress,
};
use crate::render;
use crate::session::Page;
use crate::{surface_error, AppState};

use super::queue::SaveQueue;
use super::timer::{format_clock, seconds_left, spawn_countdown};
use super::{TakingError, TakingPhase};

/// Locally buffered answer for one question, mirroring what was sent to the
/// backend. Used only to restore the display; the backend copy is
/// authoritative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDraft {
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
    pub open_answer_text: Option<String>,
    pub answered: bool,
}

/// One in-progress attempt. Created on page entry, destroyed on exit; owns
/// the answer buffer and the submission guard. Replaces the module-level
/// globals of the original client.
pub struct TakingSession {
    pub attempt_id: i64,
    pub progress: TestProgress,
    pub phase: TakingPhase,
    pub current_index: usize,
    answers: HashMap<i64, AnswerDraft>,
    completion_fired: bool,
}

impl TakingSession {
    pub fn from_progress(progress: TestProgress) -> Self {
        let phase = if progress.started_at.is_some() {
            TakingPhase::InProgress
        } else {
            TakingPhase::Instructions
        };

        let mut answers = HashMap::new();
        for q in &progress.question_progress {
            answers.insert(
                q.question_id,
                AnswerDraft {
                    question_id: q.question_id,
                    selected_option_ids: Vec::new(),
                    open_answer_text: None,
                    answered: q.answered,
                },
            );
        }

        let mut session = TakingSession {
            attempt_id: progress.attempt_id,
            current_index: progress.current_question_index.unwrap_or(0),
            phase,
            answers,
            completion_fired: false,
            progress,
        };

        if let Some(question) = session.progress.current_question.clone() {
            let index = session.current_index;
            session.restore_question(question, index);
        }

        session
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.progress.auto_submit_at
    }

    pub fn time_left(&self, now: DateTime<Utc>) -> i64 {
        match self.deadline() {
            Some(deadline) => seconds_left(deadline, now),
            None => 0,
        }
    }

    /// Instructions → InProgress. Re-entering an already running test is a
    /// no-op; a submitted test cannot be restarted.
    pub fn begin(&mut self) -> Result<(), TakingError> {
        match self.phase {
            TakingPhase::Instructions => {
                self.phase = TakingPhase::InProgress;
                Ok(())
            }
            TakingPhase::InProgress => Ok(()),
            TakingPhase::Submitting | TakingPhase::Terminated => {
                Err(TakingError::AlreadySubmitted)
            }
        }
    }

    fn ensure_editable(&self) -> Result<(), TakingError> {
        match self.phase {
            TakingPhase::InProgress => Ok(()),
            TakingPhase::Instructions => Err(TakingError::NotStarted),
            TakingPhase::Submitting | TakingPhase::Terminated => {
                Err(TakingError::EditsSuspended)
            }
        }
    }

    /// Buffers a choice answer and produces the upsert payload. Saving the
    /// same question again overwrites the draft rather than duplicating it.
    pub fn record_choice(
        &mut self,
        question_id: i64,
        selected_option_ids: Vec<i64>,
    ) -> Result<SubmitAnswerRequest, TakingError> {
        self.ensure_editable()?;
        let answered = !selected_option_ids.is_empty();
        self.answers.insert(
            question_id,
            AnswerDraft {
                question_id,
                selected_option_ids: selected_option_ids.clone(),
                open_answer_text: None,
                answered,
            },
        );
        self.mark_answered(question_id, answered);
        Ok(SubmitAnswerRequest {
            question_id,
            selected_option_ids: Some(selected_option_ids),
            open_answer_text: None,
        })
    }

    pub fn record_open(
        &mut self,
        question_id: i64,
        text: String,
    ) -> Result<SubmitAnswerRequest, TakingError> {
        self.ensure_editable()?;
        let answered = !text.trim().is_empty();
        self.answers.insert(
            question_id,
            AnswerDraft {
                question_id,
                selected_option_ids: Vec::new(),
                open_answer_text: Some(text.clone()),
                answered,
            },
        );
        self.mark_answered(question_id, answered);
        Ok(SubmitAnswerRequest {
            question_id,
            selected_option_ids: None,
            open_answer_text: Some(text),
        })
    }

    fn mark_answered(&mut self, question_id: i64, answered: bool) {
        if let Some(entry) = self
            .progress
            .question_progress
            .iter_mut()
            .find(|q| q.question_id == question_id)
        {
            entry.answered = answered;
        }
    }

    /// Makes `question` the one on screen, restoring any earlier answer from
    /// the server payload when no local draft exists.
    pub fn restore_question(&mut self, question: QuestionWithAnswer, index: usize) {
        let draft = self.answers.entry(question.id).or_insert(AnswerDraft {
            question_id: question.id,
            selected_option_ids: Vec::new(),
            open_answer_text: None,
            answered: false,
        });

        if draft.selected_option_ids.is_empty() && draft.open_answer_text.is_none() {
            if !question.previous_selected_options.is_empty() {
                draft.selected_option_ids = question.previous_selected_options.clone();
                draft.answered = true;
            } else if let Some(previous) = &question.previous_answer {
                draft.answered = !previous.trim().is_empty();
                draft.open_answer_text = Some(previous.clone());
            }
        }

        if let Some(entry) = self
            .progress
            .question_progress
            .iter_mut()
            .find(|q| q.question_id == question.id)
        {
            entry.visited = true;
        }

        self.current_index = index;
        self.progress.current_question = Some(question);
        self.progress.current_question_index = Some(index);
    }

    /// Merges the server's view of per-question progress after a save was
    /// acknowledged. The question on screen is left alone.
    pub fn apply_progress_update(&mut self, update: TestProgress) {
        if update.attempt_id != self.attempt_id {
            return;
        }
        if !update.question_progress.is_empty() {
            self.progress.question_progress = update.question_progress;
        }
    }

    /// Applies the full progress returned by question navigation.
    pub fn apply_navigation(&mut self, update: TestProgress) {
        if update.attempt_id != self.attempt_id {
            return;
        }
        let index = update.current_question_index.unwrap_or(self.current_index);
        let question = update.current_question.clone();
        self.progress = update;
        if let Some(question) = question {
            self.restore_question(question, index);
        }
    }

    pub fn draft(&self, question_id: i64) -> Option<&AnswerDraft> {
        self.answers.get(&question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.progress
            .question_progress
            .iter()
            .filter(|q| q.answered)
            .count()
    }

    pub fn progress_percent(&self) -> u8 {
        if self.progress.total_questions == 0 {
            return 0;
        }
        let percent =
            self.answered_count() as f64 / self.progress.total_questions as f64 * 100.0;
        percent.round() as u8
    }

    /// The single gate into `Submitting`. Both the manual submit and the
    /// timer race through here; only the first caller wins, so the
    /// completion call fires at most once.
    pub fn try_begin_submit(&mut self) -> bool {
        if self.completion_fired || self.phase != TakingPhase::InProgress {
            return false;
        }
        self.phase = TakingPhase::Submitting;
        self.completion_fired = true;
        true
    }

    /// Re-opens the session after a failed *manual* submit so the user can
    /// try again. The auto-submit path never calls this.
    pub fn abort_submit(&mut self) {
        if self.phase == TakingPhase::Submitting {
            self.phase = TakingPhase::InProgress;
            self.completion_fired = false;
        }
    }

    pub fn terminate(&mut self) {
        self.phase = TakingPhase::Terminated;
    }

    /// Advisory only: whether navigating away should warn the user.
    pub fn needs_leave_warning(&self, now: DateTime<Utc>) -> bool {
        self.phase == TakingPhase::InProgress && self.time_left(now) > 0
    }

    pub fn view(&self, now: DateTime<Utc>) -> TakingView {
        let time_left = self.time_left(now);
        let question_markup = self
            .progress
            .current_question
            .as_ref()
            .map(|q| render::render_question(q, self.draft(q.id)));

        TakingView {
            attempt_id: self.attempt_id,
            phase: self.phase,
            time_left,
            clock: format_clock(time_left),
            answered_count: self.answered_count(),
            progress_percent: self.progress_percent(),
            question_markup,
            progress: self.progress.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakingView {
    pub attempt_id: i64,
    pub phase: TakingPhase,
    pub time_left: i64,
    pub clock: String,
    pub answered_count: usize,
    pub progress_percent: u8,
    pub question_markup: Option<String>,
    pub progress: TestProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub seq: u64,
    pub answered_count: usize,
    pub progress_percent: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFailure {
    pub question_id: i64,
    pub message: String,
}

// ---------- Commands ----------

#[tauri::command]
pub async fn enter_test(
    attempt_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TakingView, String> {
    if !state.session.has_role(Role::Employee) {
        return Err("You do not have permission to take tests".to_string());
    }

    // Tear down whatever the previous page left behind, in particular a
    // countdown still ticking toward an older attempt's deadline.
    state.reset_page_state();

    info!("Entering test attempt {}", attempt_id);

    let progress = state
        .api
        .progress(attempt_id)
        .await
        .map_err(|e| surface_error(&app, e))?;

    let session = TakingSession::from_progress(progress);
    let view = session.view(Utc::now());
    let deadline = session.deadline();
    let running = session.phase == TakingPhase::InProgress;
    let attempt_id = session.attempt_id;

    // Store the session before the countdown spawns so an already-expired
    // deadline can auto-submit right away.
    *state.taking.lock() = Some(session);

    if running {
        start_countdown(&app, &state, attempt_id, deadline);
    }

    Ok(view)
}

#[tauri::command]
pub fn begin_test(app: AppHandle, state: State<'_, AppState>) -> Result<TakingView, String> {
    let (view, deadline, attempt_id) = {
        let mut guard = state.taking.lock();
        let session = guard
            .as_mut()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
        session.begin().map_err(|e| e.to_string())?;
        (session.view(Utc::now()), session.deadline(), session.attempt_id)
    };

    start_countdown(&app, &state, attempt_id, deadline);

    Ok(view)
}

fn start_countdown(
    app: &AppHandle,
    state: &State<'_, AppState>,
    attempt_id: i64,
    deadline: Option<DateTime<Utc>>,
) {
    let Some(deadline) = deadline else {
        warn!(
            "Attempt {} has no auto-submit deadline; countdown not started",
            attempt_id
        );
        return;
    };
    let mut timer = state.timer.lock();
    if timer.is_none() {
        *timer = Some(spawn_countdown(app.clone(), deadline));
    }
}

#[tauri::command]
pub fn save_choice_answer(
    question_id: i64,
    selected_option_ids: Vec<i64>,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<SaveReceipt, String> {
    let (attempt_id, payload, receipt) = {
        let mut guard = state.taking.lock();
        let session = guard
            .as_mut()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
        let payload = session
            .record_choice(question_id, selected_option_ids)
            .map_err(|e| e.to_string())?;
        let seq = state.save_queue.lock().enqueue(question_id);
        let receipt = SaveReceipt {
            seq,
            answered_count: session.answered_count(),
            progress_percent: session.progress_percent(),
        };
        (session.attempt_id, payload, receipt)
    };

    spawn_answer_save(
        app,
        state.api.clone(),
        state.save_queue.clone(),
        state.taking.clone(),
        attempt_id,
        payload,
        receipt.seq,
    );

    Ok(receipt)
}

#[tauri::command]
pub fn save_open_answer(
    question_id: i64,
    text: String,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<SaveReceipt, String> {
    let (attempt_id, payload, receipt) = {
        let mut guard = state.taking.lock();
        let session = guard
            .as_mut()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
        let payload = session
            .record_open(question_id, text)
            .map_err(|e| e.to_string())?;
        let seq = state.save_queue.lock().enqueue(question_id);
        let receipt = SaveReceipt {
            seq,
            answered_count: session.answered_count(),
            progress_percent: session.progress_percent(),
        };
        (session.attempt_id, payload, receipt)
    };

    spawn_answer_save(
        app,
        state.api.clone(),
        state.save_queue.clone(),
        state.taking.clone(),
        attempt_id,
        payload,
        receipt.seq,
    );

    Ok(receipt)
}

/// Sends one answer save in the background. Failures surface a notification
/// but never block navigation or revert the displayed state.
fn spawn_answer_save(
    app: AppHandle,
    api: ApiClient,
    queue: Arc<Mutex<SaveQueue>>,
    taking: Arc<Mutex<Option<TakingSession>>>,
    attempt_id: i64,
    payload: SubmitAnswerRequest,
    seq: u64,
) {
    tauri::async_runtime::spawn(async move {
        match api.submit_answer(attempt_id, &payload).await {
            Ok(progress) => {
                queue.lock().acknowledge(seq);
                if let Some(session) = taking.lock().as_mut() {
                    session.apply_progress_update(progress);
                }
            }
            Err(e) => {
                queue.lock().fail(seq);
                error!(
                    "Failed to save answer for question {}: {}",
                    payload.question_id, e
                );
                if e.is_auth_failure() {
                    let _ = app.emit("auth-expired", ());
                }
                let _ = app.emit(
                    "answer-save-failed",
                    SaveFailure {
                        question_id: payload.question_id,
                        message: e.to_string(),
                    },
                );
            }
        }
    });
}

#[tauri::command]
pub async fn load_question(
    question_id: i64,
    index: usize,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TakingView, String> {
    let attempt_id = {
        let guard = state.taking.lock();
        guard
            .as_ref()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?
            .attempt_id
    };

    let question = state
        .api
        .question(attempt_id, question_id)
        .await
        .map_err(|e| surface_error(&app, e))?;

    let mut guard = state.taking.lock();
    let session = guard
        .as_mut()
        .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
    session.restore_question(question, index);
    Ok(session.view(Utc::now()))
}

#[tauri::command]
pub async fn jump_to_question(
    question_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TakingView, String> {
    let attempt_id = {
        let guard = state.taking.lock();
        guard
            .as_ref()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?
            .attempt_id
    };

    let progress = state
        .api
        .go_to_question(attempt_id, question_id)
        .await
        .map_err(|e| surface_error(&app, e))?;

    let mut guard = state.taking.lock();
    let session = guard
        .as_mut()
        .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
    session.apply_navigation(progress);
    Ok(session.view(Utc::now()))
}

/// Manual submit, after the user confirmed. Uses the same completion
/// operation as the timer; the phase guard keeps the two paths from both
/// firing.
#[tauri::command]
pub async fn submit_test(app: AppHandle, state: State<'_, AppState>) -> Result<Page, String> {
    let attempt_id = {
        let mut guard = state.taking.lock();
        let session = guard
            .as_mut()
            .ok_or_else(|| TakingError::NoActiveSession.to_string())?;
        if !session.try_begin_submit() {
            return Err(TakingError::AlreadySubmitted.to_string());
        }
        session.attempt_id
    };

    info!("Submitting attempt {}", attempt_id);

    match state.api.complete_attempt(attempt_id).await {
        Ok(()) => {
            if let Some(session) = state.taking.lock().as_mut() {
                session.terminate();
            }
            if let Some(timer) = state.timer.lock().take() {
                timer.cancel();
            }
            Ok(Page::EmployeeDashboard)
        }
        Err(e) => {
            // Let the user try again; nothing was completed.
            if let Some(session) = state.taking.lock().as_mut() {
                session.abort_submit();
            }
            Err(surface_error(&app, e))
        }
    }
}

/// Advisory check backing the before-unload warning.
#[tauri::command]
pub fn leave_warning_needed(state: State<'_, AppState>) -> bool {
    state
        .taking
        .lock()
        .as_ref()
        .map(|s| s.needs_leave_warning(Utc::now()))
        .unwrap_or(false)
}

#[tauri::command]
pub fn leave_test(state: State<'_, AppState>) -> Page {
    if let Some(session) = state.taking.lock().as_mut() {
        info!("Leaving test attempt {}", session.attempt_id);
        session.terminate();
    }
    state.reset_page_state();
    Page::EmployeeDashboard
}

#[tauri::command]
pub fn save_queue_status(state: State<'_, AppState>) -> super::SaveQueueStatus {
    state.save_queue.lock().status()
}
