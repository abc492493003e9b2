use std::sync::Arc;

use log::{error, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::ApiError;
use crate::models::*;
use crate::session::{Session, SessionStore};

/// Transport client for the TestDesk backend. Attaches the bearer credential
/// from the session store to every request and normalizes responses into the
/// `{success, data, message}` envelope.
///
/// A 401 clears the persisted session as a side effect before the error is
/// returned, so no later request can retain the stale credential.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: Url, session: Arc<SessionStore>) -> Self {
        ApiClient {
            http: Client::new(),
            base_url,
            session,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let request = match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        self.interpret(status, &body)
    }

    /// Maps a raw status/body pair onto the response contract:
    /// 401 invalidates the session, 403 is a permission error, any other
    /// failure carries the server message, and an empty or non-JSON success
    /// body counts as a bare success.
    fn interpret<T: DeserializeOwned>(
        &self,
        status: StatusCode,
        body: &str,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend returned 401; clearing persisted session");
            self.session.clear();
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
                .ok()
                .and_then(|env| env.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(ApiEnvelope::bare_success());
        }

        match serde_json::from_str::<ApiEnvelope<T>>(body) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                if serde_json::from_str::<serde_json::Value>(body).is_err() {
                    // Plain-text 2xx bodies are a bare success signal.
                    return Ok(ApiEnvelope::bare_success());
                }
                error!("Failed to parse response envelope: {}", e);
                Err(ApiError::Parse(e))
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiEnvelope<T>, ApiError> {
        self.execute(self.http.get(self.endpoint(path))).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        self.execute(self.http.post(self.endpoint(path)).json(body))
            .await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<ApiEnvelope<T>, ApiError> {
        self.execute(self.http.post(self.endpoint(path))).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        self.execute(self.http.put(self.endpoint(path)).json(body))
            .await
    }

    async fn patch_empty<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        self.execute(self.http.patch(self.endpoint(path))).await
    }
}

fn require_data<T>(envelope: ApiEnvelope<T>) -> Result<T, ApiError> {
    expect_ok(&envelope)?;
    envelope.data.ok_or(ApiError::MissingData)
}

fn list_data<T>(envelope: ApiEnvelope<Vec<T>>) -> Result<Vec<T>, ApiError> {
    expect_ok(&envelope)?;
    Ok(envelope.data.unwrap_or_default())
}

fn expect_ok<T>(envelope: &ApiEnvelope<T>) -> Result<(), ApiError> {
    if envelope.success {
        Ok(())
    } else {
        Err(ApiError::Server {
            status: 200,
            message: envelope
                .message
                .clone()
                .unwrap_or_else(|| "Request was rejected by the server".to_string()),
        })
    }
}

// ---------- Auth ----------

impl ApiClient {
    /// Logs in and persists the resulting session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let payload = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let data: AuthData = require_data(self.post("/auth/login", &payload).await?)?;
        let session = Session::from(data);
        self.session.save(session.clone());
        Ok(session)
    }

    pub async fn register_employee(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        expect_ok(&self.post::<_, serde_json::Value>("/auth/register", request).await?)
    }

    pub async fn register_hr(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        expect_ok(&self.post::<_, serde_json::Value>("/auth/register-hr", request).await?)
    }
}

// ---------- HR: tests and assignment ----------

impl ApiClient {
    pub async fn tests(&self) -> Result<Vec<TestSummary>, ApiError> {
        list_data(self.get("/hr/tests").await?)
    }

    pub async fn test(&self, test_id: i64) -> Result<TestDetail, ApiError> {
        require_data(self.get(&format!("/hr/tests/{}", test_id)).await?)
    }

    pub async fn create_test(&self, payload: &TestPayload) -> Result<TestDetail, ApiError> {
        require_data(self.post("/hr/tests", payload).await?)
    }

    pub async fn update_test(&self, test_id: i64, payload: &TestPayload) -> Result<TestDetail, ApiError> {
        require_data(self.put(&format!("/hr/tests/{}", test_id), payload).await?)
    }

    pub async fn activate_test(&self, test_id: i64) -> Result<(), ApiError> {
        expect_ok(
            &self
                .patch_empty::<serde_json::Value>(&format!("/hr/tests/{}/activate", test_id))
                .await?,
        )
    }

    pub async fn deactivate_test(&self, test_id: i64) -> Result<(), ApiError> {
        expect_ok(
            &self
                .patch_empty::<serde_json::Value>(&format!("/hr/tests/{}/deactivate", test_id))
                .await?,
        )
    }

    pub async fn assign_test(
        &self,
        test_id: i64,
        request: &AssignTestRequest,
    ) -> Result<(), ApiError> {
        expect_ok(
            &self
                .post::<_, serde_json::Value>(&format!("/hr/tests/{}/assign", test_id), request)
                .await?,
        )
    }

    pub async fn assignments(&self, test_id: i64) -> Result<Vec<Assignment>, ApiError> {
        list_data(self.get(&format!("/hr/tests/{}/assignments", test_id)).await?)
    }

    pub async fn employees(&self) -> Result<Vec<UserSummary>, ApiError> {
        list_data(self.get("/hr/employees").await?)
    }

    pub async fn search_employees(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        let path = format!("/hr/employees/search?query={}", urlencoding::encode(query));
        list_data(self.get(&path).await?)
    }

    pub async fn statistics(&self) -> Result<HrStatistics, ApiError> {
        require_data(self.get("/hr/statistics").await?)
    }

    pub async fn all_attempts(&self) -> Result<Vec<Attempt>, ApiError> {
        list_data(self.get("/hr/attempts/all").await?)
    }

    pub async fn attempt_details_for_hr(&self, attempt_id: i64) -> Result<AttemptResult, ApiError> {
        require_data(
            self.get(&format!("/hr/attempts/{}/details", attempt_id))
                .await?,
        )
    }
}

// ---------- HR: evaluation ----------

impl ApiClient {
    pub async fn open_answers(&self) -> Result<Vec<OpenAnswerReview>, ApiError> {
        list_data(self.get("/hr/evaluation/open-answers").await?)
    }

    pub async fn evaluate_answer(
        &self,
        answer_id: i64,
        request: &EvaluateAnswerRequest,
    ) -> Result<(), ApiError> {
        expect_ok(
            &self
                .post::<_, serde_json::Value>(
                    &format!("/hr/evaluation/answers/{}", answer_id),
                    request,
                )
                .await?,
        )
    }

    pub async fn attempts_for_evaluation(&self) -> Result<Vec<AttemptForEvaluation>, ApiError> {
        list_data(self.get("/hr/evaluation/attempts").await?)
    }

    pub async fn complete_evaluation(&self, attempt_id: i64) -> Result<(), ApiError> {
        expect_ok(
            &self
                .post_empty::<serde_json::Value>(&format!(
                    "/hr/evaluation/attempts/{}/complete",
                    attempt_id
                ))
                .await?,
        )
    }
}

// ---------- Employee ----------

impl ApiClient {
    pub async fn available_tests(&self) -> Result<Vec<TestSummary>, ApiError> {
        list_data(self.get("/employee/tests/available").await?)
    }

    /// Starts a test; the returned progress carries the new attempt id.
    pub async fn start_test(&self, test_id: i64) -> Result<TestProgress, ApiError> {
        let payload = StartTestRequest { test_id };
        require_data(self.post("/employee/tests/start", &payload).await?)
    }

    pub async fn progress(&self, attempt_id: i64) -> Result<TestProgress, ApiError> {
        require_data(
            self.get(&format!("/employee/attempts/{}/progress", attempt_id))
                .await?,
        )
    }

    /// Upserts the answer for one question and returns the updated progress.
    pub async fn submit_answer(
        &self,
        attempt_id: i64,
        request: &SubmitAnswerRequest,
    ) -> Result<TestProgress, ApiError> {
        require_data(
            self.post(&format!("/employee/attempts/{}/answers", attempt_id), request)
                .await?,
        )
    }

    pub async fn complete_attempt(&self, attempt_id: i64) -> Result<(), ApiError> {
        expect_ok(
            &self
                .post_empty::<serde_json::Value>(&format!(
                    "/employee/attempts/{}/complete",
                    attempt_id
                ))
                .await?,
        )
    }

    pub async fn my_attempts(&self) -> Result<Vec<Attempt>, ApiError> {
        list_data(self.get("/employee/attempts").await?)
    }

    pub async fn attempt_results(&self, attempt_id: i64) -> Result<AttemptResult, ApiError> {
        require_data(
            self.get(&format!("/employee/attempts/{}/results", attempt_id))
                .await?,
        )
    }

    pub async fn attempt_details(&self, attempt_id: i64) -> Result<AttemptResult, ApiError> {
        require_data(self.get(&format!("/employee/attempts/{}", attempt_id)).await?)
    }

    pub async fn question(
        &self,
        attempt_id: i64,
        question_id: i64,
    ) -> Result<QuestionWithAnswer, ApiError> {
        require_data(
            self.get(&format!(
                "/employee/attempts/{}/questions/{}",
                attempt_id, question_id
            ))
            .await?,
        )
    }

    pub async fn go_to_question(
        &self,
        attempt_id: i64,
        question_id: i64,
    ) -> Result<TestProgress, ApiError> {
        let payload = GoToQuestionRequest { question_id };
        require_data(
            self.post(
                &format!("/employee/attempts/{}/go-to-question", attempt_id),
                &payload,
            )
            .await?,
        )
    }
}

// ---------- Profile ----------

impl ApiClient {
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        require_data(self.get("/profile").await?)
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        require_data(self.put("/profile", request).await?)
    }
}
