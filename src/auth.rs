use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};
use tauri::{AppHandle, State};
use validator::{Validate, ValidationErrors};

use crate::models::{Profile, RegisterRequest, UpdateProfileRequest};
use crate::session::{dashboard_for, Page, Session};
use crate::{surface_error, AppState};

// Client-side validation mirrors the backend rules so invalid forms never
// produce a request; failures map to per-field inline errors.

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationRole {
    Hr,
    Employee,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    pub role: RegistrationRole,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
}

/// Outcome of a form submission: either inline field errors (no request was
/// sent) or a success with the page to navigate to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Page>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FormOutcome {
    fn invalid(field_errors: HashMap<String, String>) -> Self {
        FormOutcome {
            ok: false,
            field_errors,
            redirect: None,
            message: None,
        }
    }

    fn success(redirect: Page) -> Self {
        FormOutcome {
            ok: true,
            field_errors: HashMap::new(),
            redirect: Some(redirect),
            message: None,
        }
    }

    fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// One message per field, taking the first reported error. Field names are
/// camelCased to match the input ids the webview uses.
pub fn field_errors(errors: &ValidationErrors) -> HashMap<String, String> {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Invalid value".to_string());
            (camelize(field), message)
        })
        .collect()
}

fn camelize(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[tauri::command]
pub async fn login(
    form: LoginForm,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<FormOutcome, String> {
    if let Err(errors) = form.validate() {
        return Ok(FormOutcome::invalid(field_errors(&errors)));
    }

    match state.api.login(&form.email, &form.password).await {
        Ok(session) => {
            info!("Signed in as {} ({:?})", session.email, session.role);
            Ok(FormOutcome::success(dashboard_for(session.role)))
        }
        Err(e) => Err(surface_error(&app, e)),
    }
}

#[tauri::command]
pub async fn register(
    form: RegisterForm,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<FormOutcome, String> {
    if let Err(errors) = form.validate() {
        return Ok(FormOutcome::invalid(field_errors(&errors)));
    }

    let request = RegisterRequest {
        email: form.email,
        first_name: form.first_name,
        last_name: form.last_name,
        password: form.password,
        confirm_password: form.confirm_password,
    };

    let result = match form.role {
        RegistrationRole::Hr => state.api.register_hr(&request).await,
        RegistrationRole::Employee => state.api.register_employee(&request).await,
    };

    match result {
        Ok(()) => {
            info!("Registered new {:?} account: {}", form.role, request.email);
            Ok(FormOutcome::success(Page::Login)
                .with_message("Registration successful! You can now sign in."))
        }
        Err(e) => Err(surface_error(&app, e)),
    }
}

#[tauri::command]
pub fn logout(state: State<'_, AppState>) -> Page {
    info!("Signing out");
    state.session.clear();
    state.reset_page_state();
    Page::Login
}

#[tauri::command]
pub fn current_session(state: State<'_, AppState>) -> Option<Session> {
    state.session.current()
}

#[tauri::command]
pub async fn get_profile(app: AppHandle, state: State<'_, AppState>) -> Result<Profile, String> {
    state.api.profile().await.map_err(|e| surface_error(&app, e))
}

#[tauri::command]
pub async fn update_profile(
    form: ProfileForm,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<FormOutcome, String> {
    if let Err(errors) = form.validate() {
        return Ok(FormOutcome::invalid(field_errors(&errors)));
    }

    let request = UpdateProfileRequest {
        first_name: form.first_name,
        last_name: form.last_name,
    };

    match state.api.update_profile(&request).await {
        Ok(_) => Ok(FormOutcome {
            ok: true,
            field_errors: HashMap::new(),
            redirect: None,
            message: Some("Profile updated".to_string()),
        }),
        Err(e) => Err(surface_error(&app, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_email_is_rejected_inline() {
        let form = LoginForm {
            email: "not-an-email".into(),
            password: "secret1".into(),
        };
        let errors = form.validate().unwrap_err();
        let fields = field_errors(&errors);
        assert_eq!(fields.get("email").unwrap(), "Enter a valid email address");
        assert!(!fields.contains_key("password"));
    }

    #[test]
    fn short_password_is_rejected_inline() {
        let form = LoginForm {
            email: "user@example.com".into(),
            password: "12345".into(),
        };
        let fields = field_errors(&form.validate().unwrap_err());
        assert!(fields.get("password").unwrap().contains("at least 6"));
    }

    #[test]
    fn valid_login_form_passes_validation() {
        let form = LoginForm {
            email: "user@example.com".into(),
            password: "123456".into(),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn registration_requires_matching_passwords_and_names() {
        let form = RegisterForm {
            email: "new@example.com".into(),
            first_name: "".into(),
            last_name: "Sidorov".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            role: RegistrationRole::Employee,
        };
        let fields = field_errors(&form.validate().unwrap_err());
        assert_eq!(fields.get("firstName").unwrap(), "First name is required");
        assert_eq!(
            fields.get("confirmPassword").unwrap(),
            "Passwords do not match"
        );
    }
}
