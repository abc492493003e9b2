use serde::{Deserialize, Serialize};
use tauri::State;

use crate::models::Role;
use crate::AppState;

use super::Session;

/// Pages the webview can navigate to. Mirrors the HTML surfaces of the web
/// client, one variant per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Login,
    Register,
    HrDashboard,
    CreateTest,
    CheckResults,
    Results,
    EmployeeDashboard,
    TakeTest,
    Profile,
}

impl Page {
    /// Pages reachable without a session.
    fn is_public(self) -> bool {
        matches!(self, Page::Login | Page::Register)
    }

    /// Role a page is restricted to; `None` means any authenticated user.
    fn required_role(self) -> Option<Role> {
        match self {
            Page::HrDashboard | Page::CreateTest | Page::CheckResults | Page::Results => {
                Some(Role::Hr)
            }
            Page::EmployeeDashboard | Page::TakeTest => Some(Role::Employee),
            Page::Login | Page::Register | Page::Profile => None,
        }
    }
}

pub fn dashboard_for(role: Role) -> Page {
    match role {
        Role::Hr => Page::HrDashboard,
        Role::Employee => Page::EmployeeDashboard,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "camelCase")]
pub enum PageAccess {
    Granted,
    RedirectToLogin,
    Redirect(Page),
}

/// Gating rule: public pages are always reachable; everything else needs a
/// session; a role mismatch redirects to the visitor's own dashboard rather
/// than erroring.
pub fn check_access(page: Page, session: Option<&Session>) -> PageAccess {
    if page.is_public() {
        return PageAccess::Granted;
    }

    let Some(session) = session else {
        return PageAccess::RedirectToLogin;
    };

    match page.required_role() {
        Some(role) if role != session.role => PageAccess::Redirect(dashboard_for(session.role)),
        _ => PageAccess::Granted,
    }
}

#[tauri::command]
pub fn resolve_page_access(page: Page, state: State<'_, AppState>) -> PageAccess {
    let session = state.session.current();
    check_access(page, session.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(role: Role) -> Session {
        Session {
            user_id: 1,
            email: "user@example.com".into(),
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            role,
            auth_token: "t".into(),
        }
    }

    #[test]
    fn public_pages_need_no_session() {
        assert_eq!(check_access(Page::Login, None), PageAccess::Granted);
        assert_eq!(check_access(Page::Register, None), PageAccess::Granted);
    }

    #[test]
    fn protected_pages_redirect_to_login_without_session() {
        for page in [
            Page::HrDashboard,
            Page::EmployeeDashboard,
            Page::CreateTest,
            Page::CheckResults,
            Page::Results,
            Page::TakeTest,
            Page::Profile,
        ] {
            assert_eq!(check_access(page, None), PageAccess::RedirectToLogin);
        }
    }

    #[test]
    fn role_mismatch_redirects_to_own_dashboard() {
        let employee = session_with(Role::Employee);
        let hr = session_with(Role::Hr);

        // An employee visiting any HR page lands on the employee dashboard.
        for page in [Page::HrDashboard, Page::CreateTest, Page::CheckResults, Page::Results] {
            assert_eq!(
                check_access(page, Some(&employee)),
                PageAccess::Redirect(Page::EmployeeDashboard)
            );
        }

        // And vice versa.
        for page in [Page::EmployeeDashboard, Page::TakeTest] {
            assert_eq!(
                check_access(page, Some(&hr)),
                PageAccess::Redirect(Page::HrDashboard)
            );
        }
    }

    #[test]
    fn matching_role_is_granted() {
        let hr = session_with(Role::Hr);
        assert_eq!(check_access(Page::HrDashboard, Some(&hr)), PageAccess::Granted);
        assert_eq!(check_access(Page::Profile, Some(&hr)), PageAccess::Granted);

        let employee = session_with(Role::Employee);
        assert_eq!(
            check_access(Page::TakeTest, Some(&employee)),
            PageAccess::Granted
        );
    }
}
