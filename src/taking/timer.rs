use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};

use crate::session::Page;
use crate::AppState;

/// Seconds remaining until the server-provided deadline, clamped at zero.
/// The countdown is purely a display derived from this value; client clock
/// drift is not compensated.
pub fn seconds_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        millis / 1000
    }
}

/// "MM:SS", with an hour component only when needed.
pub fn format_clock(total_seconds: i64) -> String {
    if total_seconds <= 0 {
        return "00:00".to_string();
    }
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerTick {
    pub time_left: i64,
    pub clock: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSubmitNotice {
    pub attempt_id: i64,
    pub redirect: Page,
}

/// Handle to the 1 Hz countdown task. `cancel` is called exactly once, on
/// the terminal transition, so no tick fires after navigation.
pub struct CountdownHandle(tauri::async_runtime::JoinHandle<()>);

impl CountdownHandle {
    pub fn cancel(self) {
        self.0.abort();
    }
}

/// Spawns the countdown for the active attempt. Emits a `timer-tick` event
/// every second; when the deadline passes it fires the completion call once
/// and ends.
pub fn spawn_countdown(app: AppHandle, deadline: DateTime<Utc>) -> CountdownHandle {
    let handle = tauri::async_runtime::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let left = seconds_left(deadline, Utc::now());
            let _ = app.emit(
                "timer-tick",
                TimerTick {
                    time_left: left,
                    clock: format_clock(left),
                },
            );
            if left == 0 {
                auto_submit(app.clone()).await;
                break;
            }
        }
    });
    CountdownHandle(handle)
}

/// Completes the attempt when the timer reaches zero. The phase guard in
/// `TakingSession` makes sure the completion call fires at most once even if
/// the user submits manually at the same moment.
async fn auto_submit(app: AppHandle) {
    let state = app.state::<AppState>();

    let attempt_id = {
        let mut guard = state.taking.lock();
        match guard.as_mut() {
            Some(session) => {
                if session.try_begin_submit() {
                    Some(session.attempt_id)
                } else {
                    None
                }
            }
            _ => None,
        }
    };

    let Some(attempt_id) = attempt_id else {
        return;
    };

    info!("Time is up; auto-submitting attempt {}", attempt_id);

    match state.api.complete_attempt(attempt_id).await {
        Ok(()) => {
            if let Some(session) = state.taking.lock().as_mut() {
                session.terminate();
            }
            let _ = app.emit(
                "test-autosubmitted",
                AutoSubmitNotice {
                    attempt_id,
                    redirect: Page::EmployeeDashboard,
                },
            );
        }
        Err(e) => {
            error!("Auto-submit failed for attempt {}: {}", attempt_id, e);
            let _ = app.emit("submit-failed", e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn seconds_left_decreases_by_one_per_second() {
        let deadline = Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 29, 0).unwrap();

        let mut previous = seconds_left(deadline, start);
        assert_eq!(previous, 60);
        for offset in 1..=60 {
            let now = start + chrono::Duration::seconds(offset);
            let left = seconds_left(deadline, now);
            assert_eq!(left, previous - 1, "at offset {}", offset);
            previous = left;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn seconds_left_clamps_past_deadlines_to_zero() {
        let deadline = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 10, 5, 0).unwrap();
        assert_eq!(seconds_left(deadline, late), 0);
    }

    #[test]
    fn seconds_left_floors_fractional_seconds() {
        let deadline = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let now = deadline - chrono::Duration::milliseconds(1500);
        assert_eq!(seconds_left(deadline, now), 1);
    }

    #[test]
    fn clock_formats_minutes_and_hours() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(-5), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(3600), "1:00:00");
        assert_eq!(format_clock(3725), "1:02:05");
    }
}
