use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use serde::Serialize;
use tauri::{AppHandle, State};

use crate::error::ApiError;
use crate::models::{Attempt, AttemptResult, AttemptStatus, Role, TestSummary};
use crate::render;
use crate::session::Page;
use crate::{surface_error, AppState};

use super::WidgetState;

/// Statistics shown at the top of the employee dashboard, computed from the
/// fetched snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub available_tests: usize,
    pub completed_tests: usize,
    pub average_score: i32,
    pub pending_tests: usize,
}

pub fn compute_stats(available: usize, attempts: &[Attempt]) -> EmployeeStats {
    let completed: Vec<&Attempt> = attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Evaluated)
        .collect();
    let pending = attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Evaluating)
        .count();

    let average_score = if completed.is_empty() {
        0
    } else {
        let sum: i64 = completed.iter().map(|a| a.score.unwrap_or(0) as i64).sum();
        (sum as f64 / completed.len() as f64).round() as i32
    };

    EmployeeStats {
        available_tests: available,
        completed_tests: completed.len(),
        average_score,
        pending_tests: pending,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeadlinePriority {
    High,
    Medium,
    Low,
}

fn priority_for(days_left: i64) -> DeadlinePriority {
    if days_left <= 3 {
        DeadlinePriority::High
    } else if days_left <= 7 {
        DeadlinePriority::Medium
    } else {
        DeadlinePriority::Low
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineItem {
    pub test_id: i64,
    pub test_title: String,
    pub deadline: NaiveDateTime,
    pub days_left: i64,
    pub priority: DeadlinePriority,
}

/// The soonest assigned deadlines, nearest first.
pub fn upcoming_deadlines(
    tests: &[TestSummary],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<DeadlineItem> {
    let mut with_deadline: Vec<(&TestSummary, NaiveDateTime)> = tests
        .iter()
        .filter_map(|t| t.deadline.map(|d| (t, d)))
        .collect();
    with_deadline.sort_by_key(|(_, deadline)| *deadline);

    with_deadline
        .into_iter()
        .take(limit)
        .map(|(test, deadline)| {
            let days_left = render::days_until(deadline.and_utc(), now);
            DeadlineItem {
                test_id: test.id,
                test_title: test.title.clone(),
                deadline,
                days_left,
                priority: priority_for(days_left),
            }
        })
        .collect()
}

pub fn render_deadline_list(deadlines: &[DeadlineItem]) -> String {
    if deadlines.is_empty() {
        return render::render_empty("No upcoming deadlines");
    }

    deadlines
        .iter()
        .map(|item| {
            let priority_class = match item.priority {
                DeadlinePriority::High => "high-priority",
                DeadlinePriority::Medium => "medium-priority",
                DeadlinePriority::Low => "low-priority",
            };
            format!(
                r#"<div class="deadline-item {class}">
    <div class="deadline-info">
        <div class="deadline-test">{title}</div>
        <div class="deadline-date">Due {date}</div>
    </div>
    <div class="deadline-days">
        <span class="days-count">{days}</span>
        <span class="days-text">days</span>
    </div>
</div>"#,
                class = priority_class,
                title = render::escape_html(&item.test_title),
                date = render::format_date(Some(item.deadline)),
                days = item.days_left.max(0),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub stats: EmployeeStats,
    pub available_tests: WidgetState<Vec<TestSummary>>,
    pub attempts: WidgetState<Vec<Attempt>>,
    pub deadlines: Vec<DeadlineItem>,
    pub deadlines_markup: String,
}

/// Shapes the dashboard snapshot from the two fetches. Statistics are zeroed
/// for whichever half failed to load.
pub fn build_dashboard(
    tests: Result<Vec<TestSummary>, ApiError>,
    attempts: Result<Vec<Attempt>, ApiError>,
    now: DateTime<Utc>,
) -> EmployeeDashboard {
    let available_count = tests.as_ref().map(|t| t.len()).unwrap_or(0);
    let stats = compute_stats(
        available_count,
        attempts.as_deref().unwrap_or(&[]),
    );

    let deadlines = tests
        .as_deref()
        .map(|t| upcoming_deadlines(t, now, 5))
        .unwrap_or_default();
    let deadlines_markup = render_deadline_list(&deadlines);

    EmployeeDashboard {
        stats,
        available_tests: WidgetState::from_result(tests, |t| {
            render::render_available_tests(t, now)
        }),
        attempts: WidgetState::from_result(attempts, |a| render::render_attempt_history(a)),
        deadlines,
        deadlines_markup,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedTest {
    pub attempt_id: i64,
    pub redirect: Page,
}

// ---------- Commands ----------

#[tauri::command]
pub async fn load_employee_dashboard(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<EmployeeDashboard, String> {
    let (tests, attempts) = tokio::join!(state.api.available_tests(), state.api.my_attempts());

    for result in [tests.as_ref().err(), attempts.as_ref().err()].into_iter().flatten() {
        if result.is_auth_failure() {
            return Err(surface_error(&app, ApiError::Unauthorized));
        }
    }

    Ok(build_dashboard(tests, attempts, Utc::now()))
}

#[tauri::command]
pub async fn start_test(
    test_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<StartedTest, String> {
    if !state.session.has_role(Role::Employee) {
        return Err("Only employees can start tests".to_string());
    }

    info!("Starting test {}", test_id);
    let progress = state
        .api
        .start_test(test_id)
        .await
        .map_err(|e| surface_error(&app, e))?;

    Ok(StartedTest {
        attempt_id: progress.attempt_id,
        redirect: Page::TakeTest,
    })
}

#[tauri::command]
pub async fn get_attempt_results(
    attempt_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<AttemptResult, String> {
    state
        .api
        .attempt_results(attempt_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn get_attempt_details(
    attempt_id: i64,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<AttemptResult, String> {
    state
        .api
        .attempt_details(attempt_id)
        .await
        .map_err(|e| surface_error(&app, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attempt(status: AttemptStatus, score: Option<i32>) -> Attempt {
        Attempt {
            id: 1,
            test_id: Some(1),
            test_title: Some("t".into()),
            user: None,
            started_at: None,
            completed_at: None,
            score,
            passing_score: Some(70),
            status,
            passed: Some(score.unwrap_or(0) >= 70),
        }
    }

    fn test_with_deadline(id: i64, title: &str, deadline: Option<NaiveDateTime>) -> TestSummary {
        TestSummary {
            id,
            title: title.into(),
            description: None,
            time_limit_minutes: 30,
            passing_score: 70,
            max_possible_score: None,
            question_count: Some(5),
            is_active: Some(true),
            created_at: None,
            deadline,
            assigner_name: None,
        }
    }

    #[test]
    fn no_available_tests_yields_zeroed_stats_and_placeholder() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let dashboard = build_dashboard(Ok(vec![]), Ok(vec![]), now);

        assert_eq!(
            dashboard.stats,
            EmployeeStats {
                available_tests: 0,
                completed_tests: 0,
                average_score: 0,
                pending_tests: 0,
            }
        );
        match &dashboard.available_tests {
            WidgetState::Loaded { markup, .. } => assert!(markup.contains("No tests available")),
            WidgetState::Failed { .. } => panic!("widget should have loaded"),
        }
        assert!(dashboard.deadlines.is_empty());
    }

    #[test]
    fn stats_count_only_final_statuses() {
        let attempts = vec![
            attempt(AttemptStatus::Evaluated, Some(90)),
            attempt(AttemptStatus::Evaluated, Some(70)),
            attempt(AttemptStatus::Evaluating, Some(50)),
            attempt(AttemptStatus::InProgress, None),
        ];
        let stats = compute_stats(3, &attempts);
        assert_eq!(stats.available_tests, 3);
        assert_eq!(stats.completed_tests, 2);
        assert_eq!(stats.average_score, 80);
        assert_eq!(stats.pending_tests, 1);
    }

    #[test]
    fn failed_widget_degrades_without_blocking_the_other() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let dashboard = build_dashboard(
            Err(ApiError::Server {
                status: 500,
                message: "boom".into(),
            }),
            Ok(vec![attempt(AttemptStatus::Evaluated, Some(100))]),
            now,
        );

        assert!(!dashboard.available_tests.is_loaded());
        assert!(dashboard.attempts.is_loaded());
        // The failed half zeroes only its own numbers.
        assert_eq!(dashboard.stats.available_tests, 0);
        assert_eq!(dashboard.stats.completed_tests, 1);
        match &dashboard.available_tests {
            WidgetState::Failed { markup, .. } => assert!(markup.contains("text-danger")),
            WidgetState::Loaded { .. } => panic!("widget should have failed"),
        }
    }

    #[test]
    fn deadlines_are_sorted_bucketed_and_capped() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let at = |day: u32| {
            Some(
                Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0)
                    .unwrap()
                    .naive_utc(),
            )
        };

        let tests = vec![
            test_with_deadline(1, "far", at(20)),
            test_with_deadline(2, "soon", at(3)),
            test_with_deadline(3, "none", None),
            test_with_deadline(4, "mid", at(7)),
            test_with_deadline(5, "later", at(12)),
            test_with_deadline(6, "latest", at(25)),
            test_with_deadline(7, "week", at(8)),
        ];

        let deadlines = upcoming_deadlines(&tests, now, 5);
        assert_eq!(deadlines.len(), 5);
        assert_eq!(deadlines[0].test_title, "soon");
        assert_eq!(deadlines[0].priority, DeadlinePriority::High);
        assert_eq!(deadlines[1].test_title, "mid");
        assert_eq!(deadlines[1].priority, DeadlinePriority::Medium);
        assert_eq!(deadlines[2].test_title, "week");
        assert_eq!(deadlines[3].priority, DeadlinePriority::Low);
        // The sixth-soonest deadline fell off the list.
        assert!(deadlines.iter().all(|d| d.test_title != "latest"));
    }
}
