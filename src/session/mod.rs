pub mod gate;
pub mod store;

pub use gate::*;
pub use store::*;

use serde::{Deserialize, Serialize};

use crate::models::{AuthData, Role};

/// The authenticated identity, persisted across app restarts. This is a
/// client-side cache only: every privileged action is re-validated by the
/// backend, and a 401 wipes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub auth_token: String,
}

impl From<AuthData> for Session {
    fn from(data: AuthData) -> Self {
        Session {
            user_id: data.user_id,
            email: data.email,
            first_name: data.first_name,
            last_name: data.last_name,
            role: data.role,
            auth_token: data.token,
        }
    }
}

impl Session {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
