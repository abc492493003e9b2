use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};
use tauri::{AppHandle, State};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{
    AssignTestRequest, Attempt, AttemptForEvaluation, AttemptResult, HrStatistics,
    QuestionType, Role, TestDetail, TestPayload, TestSummary, UserSummary,
};
use crate::render;
use crate::{surface_error, AppState};

use super::WidgetState;

const RECENT_TESTS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrDashboard {
    pub statistics: WidgetState<HrStatistics>,
    pub recent_tests: WidgetState<Vec<TestSummary>>,
    pub pending_reviews: WidgetState<Vec<AttemptForEvaluation>>,
}

pub fn build_dashboard(
    statistics: Result<HrStatistics, ApiError>,
    tests: Result<Vec<TestSummary>, ApiError>,
    pending: Result<Vec<AttemptForEvaluation>, ApiError>,
) -> HrDashboard {
    let recent = tests.map(|mut t| {
        t.truncate(RECENT_TESTS);
        t
    });

    HrDashboard {
        statistics: WidgetState::from_result(statistics, |_| String::new()),
        recent_tests: WidgetState::from_result(recent, |t| render::render_recent_tests(t)),
        pending_reviews: WidgetState::from_result(pending, |p| render::render_pending_reviews(p)),
    }
}

// ---------- Assignment ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentForm {
    pub test_id: Option<i64>,
    #[serde(default)]
    pub user_ids: Vec<i64>,
    pub deadline: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("Choose a test to assign")]
    NoTestSelected,
    #[error("Select at least one employee")]
    NoEmployeesSelected,
    #[error("Set a deadline")]
    NoDeadline,
    #[error("The deadline has an invalid format")]
    BadDeadline,
}

/// `datetime-local` inputs omit seconds; older forms include them.
pub fn parse_deadline(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Rejects incomplete assignments before any request is sent.
pub fn validate_assignment(form: &AssignmentForm) -> Result<(i64, AssignTestRequest), AssignmentError> {
    let test_id = form.test_id.ok_or(AssignmentError::NoTestSelected)?;

    if form.user_ids.is_empty() {
        return Err(AssignmentError::NoEmployeesSelected);
    }

    let raw = form
        .deadline
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or(AssignmentError::NoDeadline)?;
    let deadline = parse_deadline(raw.trim()).ok_or(AssignmentError::BadDeadline)?;

    Ok((
        test_id,
        AssignTestRequest {
            user_ids: form.user_ids.clone(),
            deadline,
        },
    ))
}

// ---------- Test editor validation ----------

/// Client-side checks mirroring the backend rules; the create/update request
/// is only sent once these pass.
pub fn validate_test_payload(payload: &TestPayload) -> Result<(), String> {
    if payload.title.trim().is_empty() {
        return Err("Enter a test title".to_string());
    }
    if payload.time_limit_minutes <= 0 {
        return Err("Time limit must be at least one minute".to_string());
    }
    if !(0..=100).contains(&payload.passing_score) {
        return Err("Passing score must be between 0 and 100".to_string());
    }
    if payload.questions.is_empty() {
        return Err("Add at least one question".to_string());
    }

    for (index, question) in payload.questions.iter().enumerate() {
        let number = index + 1;
        if question.text.trim().is_empty() {
            return Err(format!("Question {} has no text", number));
        }
        if question.max_score <= 0 {
            return Err(format!("Question {} must be worth at least one point", number));
        }
        match question.question_type {
            QuestionType::OpenAnswer => {}
            QuestionType::SingleChoice | QuestionType::MultipleChoice => {
                if question.options.len() < 2 {
                    return Err(format!("Question {} needs at least two options", number));
                }
                if !question.options.iter().any(|o| o.is_correct) {
                    return Err(format!(
                        "Question {} needs at least one correct option",
                        number
                    ));
                }
            }
        }
    }

    Ok(())
}

// ---------- Commands ----------

fn require_hr(state: &State<'_, AppState>) -> Result<(), String> {
    if state.session.has_role(Role::Hr) {
        Ok(())
    } else {
        Err("This action requires the HR role".to_string())
    }
}

#[tauri::command]
pub async fn load_hr_dashboard(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<HrDashboard, String> {
    require_hr(&state)?;

    let (statistics, tests, pending) = tokio::join!(
        state.api.statistics(),
        state.api.tests(),
        state.api.attempts_for_evaluation()
    );

    for error in [
        statistics.as_ref().err(),
        tests.as_ref().err(),
        pending.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    {
        if error.is_auth_failure() {
            return Err(surface_error(&app, ApiError::Unauthorized));
        }
    }

    Ok(build_dashboard(statistics, tests, pending))
}

#[tauri::command]
pub async fn list_tests(app: AppHandle, state: State<'_, AppState>) -> Result<Vec<TestSummary>, String> {
    require_hr(&state)?;
    state.api.tests().await.map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn get_test(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TestDetail, String> {
    require_hr(&state)?;
    state.api.test(test_id).await.map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn create_test(
    payload: TestPayload,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TestDetail, String> {
    require_hr(&state)?;
    validate_test_payload(&payload)?;
    info!("Creating test '{}'", payload.title);
    state
        .api
        .create_test(&payload)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn update_test(
    test_id: i64,
    payload: TestPayload,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<TestDetail, String> {
    require_hr(&state)?;
    validate_test_payload(&payload)?;
    info!("Updating test {}", test_id);
    state
        .api
        .update_test(test_id, &payload)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn activate_test(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    require_hr(&state)?;
    state
        .api
        .activate_test(test_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn deactivate_test(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    require_hr(&state)?;
    state
        .api
        .deactivate_test(test_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignModalData {
    pub test: TestDetail,
    pub employees: Vec<UserSummary>,
    pub employees_markup: String,
}

/// Loads the test and the employee list for the assign modal in parallel.
#[tauri::command]
pub async fn open_assign_modal(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<AssignModalData, String> {
    require_hr(&state)?;

    let (test, employees) = tokio::join!(state.api.test(test_id), state.api.employees());
    let test = test.map_err(|e| surface_error(&app, e))?;
    let employees = employees.map_err(|e| surface_error(&app, e))?;
    let employees_markup = render::render_employee_checkboxes(&employees);

    Ok(AssignModalData {
        test,
        employees,
        employees_markup,
    })
}

#[tauri::command]
pub async fn assign_test(
    form: AssignmentForm,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    require_hr(&state)?;
    let (test_id, request) = validate_assignment(&form).map_err(|e| e.to_string())?;

    info!(
        "Assigning test {} to {} employee(s)",
        test_id,
        request.user_ids.len()
    );
    state
        .api
        .assign_test(test_id, &request)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn list_assignments(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Vec<crate::models::Assignment>, String> {
    require_hr(&state)?;
    state
        .api
        .assignments(test_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn search_employees(
    query: String,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Vec<UserSummary>, String> {
    require_hr(&state)?;
    let query = query.trim();
    let result = if query.is_empty() {
        state.api.employees().await
    } else {
        state.api.search_employees(query).await
    };
    result.map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn list_all_attempts(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Vec<Attempt>, String> {
    require_hr(&state)?;
    state.api.all_attempts().await.map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn hr_attempt_details(
    attempt_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<AttemptResult, String> {
    require_hr(&state)?;
    state
        .api
        .attempt_details_for_hr(attempt_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionPayload, QuestionPayload};

    fn form(test_id: Option<i64>, user_ids: Vec<i64>, deadline: Option<&str>) -> AssignmentForm {
        AssignmentForm {
            test_id,
            user_ids,
            deadline: deadline.map(str::to_string),
        }
    }

    #[test]
    fn empty_employee_selection_is_rejected_before_any_request() {
        let result = validate_assignment(&form(Some(1), vec![], Some("2025-06-10T12:00")));
        assert_eq!(result.unwrap_err(), AssignmentError::NoEmployeesSelected);
    }

    #[test]
    fn missing_deadline_is_rejected() {
        let result = validate_assignment(&form(Some(1), vec![2, 3], None));
        assert_eq!(result.unwrap_err(), AssignmentError::NoDeadline);

        let result = validate_assignment(&form(Some(1), vec![2, 3], Some("  ")));
        assert_eq!(result.unwrap_err(), AssignmentError::NoDeadline);
    }

    #[test]
    fn valid_assignment_builds_the_request() {
        let (test_id, request) =
            validate_assignment(&form(Some(4), vec![2, 3], Some("2025-06-10T12:00"))).unwrap();
        assert_eq!(test_id, 4);
        assert_eq!(request.user_ids, vec![2, 3]);
        assert_eq!(
            request.deadline,
            parse_deadline("2025-06-10T12:00:00").unwrap()
        );
    }

    #[test]
    fn deadline_accepts_datetime_local_format() {
        assert!(parse_deadline("2025-06-10T12:00").is_some());
        assert!(parse_deadline("2025-06-10T12:00:30").is_some());
        assert!(parse_deadline("10.06.2025").is_none());
    }

    fn choice_question(options: Vec<(bool, &str)>) -> QuestionPayload {
        QuestionPayload {
            text: "Pick".into(),
            question_type: QuestionType::SingleChoice,
            max_score: 5,
            order_index: 0,
            options: options
                .into_iter()
                .enumerate()
                .map(|(i, (correct, text))| OptionPayload {
                    text: text.into(),
                    is_correct: correct,
                    order_index: i as i32,
                })
                .collect(),
            correct_open_answer: None,
        }
    }

    fn payload_with(questions: Vec<QuestionPayload>) -> TestPayload {
        TestPayload {
            title: "Quarterly check".into(),
            description: None,
            time_limit_minutes: 30,
            passing_score: 70,
            questions,
        }
    }

    #[test]
    fn test_editor_requires_options_and_a_correct_one() {
        let payload = payload_with(vec![choice_question(vec![(false, "a")])]);
        assert!(validate_test_payload(&payload)
            .unwrap_err()
            .contains("at least two options"));

        let payload = payload_with(vec![choice_question(vec![(false, "a"), (false, "b")])]);
        assert!(validate_test_payload(&payload)
            .unwrap_err()
            .contains("correct option"));

        let payload = payload_with(vec![choice_question(vec![(true, "a"), (false, "b")])]);
        assert!(validate_test_payload(&payload).is_ok());
    }

    #[test]
    fn test_editor_rejects_out_of_range_settings() {
        let mut payload = payload_with(vec![choice_question(vec![(true, "a"), (false, "b")])]);
        payload.passing_score = 120;
        assert!(validate_test_payload(&payload).is_err());

        payload.passing_score = 70;
        payload.time_limit_minutes = 0;
        assert!(validate_test_payload(&payload).is_err());

        payload.time_limit_minutes = 30;
        payload.title = "  ".into();
        assert!(validate_test_payload(&payload).is_err());
    }

    #[test]
    fn recent_tests_are_capped_at_five() {
        let tests: Vec<TestSummary> = (0..8)
            .map(|i| TestSummary {
                id: i,
                title: format!("Test {}", i),
                description: None,
                time_limit_minutes: 10,
                passing_score: 50,
                max_possible_score: None,
                question_count: None,
                is_active: Some(false),
                created_at: None,
                deadline: None,
                assigner_name: None,
            })
            .collect();

        let dashboard = build_dashboard(Ok(HrStatistics::default()), Ok(tests), Ok(vec![]));
        match dashboard.recent_tests {
            WidgetState::Loaded { data, .. } => assert_eq!(data.len(), 5),
            WidgetState::Failed { .. } => panic!("should load"),
        }
    }
}
