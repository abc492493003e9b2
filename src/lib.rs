use std::sync::Arc;

use anyhow::Result;
use log::info;
use parking_lot::Mutex;
use tauri::{AppHandle, Builder, Emitter, Manager};

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod render;
pub mod session;
pub mod taking;

use api::ApiClient;
use config::AppConfig;
use error::ApiError;
use evaluation::EvaluationSession;
use session::SessionStore;
use taking::{CountdownHandle, SaveQueue, TakingSession};

/// Shared application state, managed by Tauri. Page-scoped pieces (the
/// taking session, the evaluation session, the countdown) live here as
/// explicit objects created on page entry and destroyed on exit.
pub struct AppState {
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    pub taking: Arc<Mutex<Option<TakingSession>>>,
    pub save_queue: Arc<Mutex<SaveQueue>>,
    pub timer: Mutex<Option<CountdownHandle>>,
    pub evaluation: Mutex<Option<EvaluationSession>>,
}

impl AppState {
    fn new(api: ApiClient, session: Arc<SessionStore>) -> Self {
        AppState {
            api,
            session,
            taking: Arc::new(Mutex::new(None)),
            save_queue: Arc::new(Mutex::new(SaveQueue::new())),
            timer: Mutex::new(None),
            evaluation: Mutex::new(None),
        }
    }

    /// Tears down page-scoped state on navigation or logout. The countdown
    /// handle is taken out of its slot first, so it is cancelled exactly
    /// once no matter how many callers race here.
    pub fn reset_page_state(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
        *self.taking.lock() = None;
        self.save_queue.lock().clear();
        *self.evaluation.lock() = None;
    }
}

/// Converts a transport error into the message shown to the user, emitting
/// the `auth-expired` event when the session was invalidated so the webview
/// can redirect to the login surface.
pub(crate) fn surface_error(app: &AppHandle, error: ApiError) -> String {
    if error.is_auth_failure() {
        let _ = app.emit("auth-expired", ());
    }
    error.to_string()
}

pub fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    Builder::default()
        .invoke_handler(tauri::generate_handler![
            // Auth and account
            auth::login,
            auth::register,
            auth::logout,
            auth::current_session,
            auth::get_profile,
            auth::update_profile,
            // Page gating
            session::gate::resolve_page_access,
            // Employee dashboard
            dashboard::employee::load_employee_dashboard,
            dashboard::employee::start_test,
            dashboard::employee::get_attempt_results,
            dashboard::employee::get_attempt_details,
            // HR dashboard and test management
            dashboard::hr::load_hr_dashboard,
            dashboard::hr::list_tests,
            dashboard::hr::get_test,
            dashboard::hr::create_test,
            dashboard::hr::update_test,
            dashboard::hr::activate_test,
            dashboard::hr::deactivate_test,
            dashboard::hr::open_assign_modal,
            dashboard::hr::assign_test,
            dashboard::hr::list_assignments,
            dashboard::hr::search_employees,
            dashboard::hr::list_all_attempts,
            dashboard::hr::hr_attempt_details,
            // Test taking
            taking::session::enter_test,
            taking::session::begin_test,
            taking::session::save_choice_answer,
            taking::session::save_open_answer,
            taking::session::load_question,
            taking::session::jump_to_question,
            taking::session::submit_test,
            taking::session::leave_warning_needed,
            taking::session::leave_test,
            taking::session::save_queue_status,
            // Evaluation
            evaluation::load_evaluation_queue,
            evaluation::open_attempt_review,
            evaluation::save_answer_score,
            evaluation::complete_attempt_evaluation
        ])
        .setup(move |app| {
            info!("TestDesk application starting up...");

            let data_dir = app.path().app_data_dir()?;
            let session_store = Arc::new(SessionStore::open(data_dir.join("session.json")));
            let api = ApiClient::new(config.api_base_url.clone(), session_store.clone());
            app.manage(AppState::new(api, session_store));

            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("Error while running tauri application");

    Ok(())
}
