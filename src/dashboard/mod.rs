pub mod employee;
pub mod hr;

use serde::Serialize;

use crate::error::ApiError;
use crate::render;

/// Outcome of one dashboard widget's fetch. A failed widget degrades to an
/// inline error fragment without blocking the widgets around it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum WidgetState<T> {
    Loaded { data: T, markup: String },
    Failed { message: String, markup: String },
}

impl<T> WidgetState<T> {
    pub fn from_result(result: Result<T, ApiError>, render_fn: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => {
                let markup = render_fn(&data);
                WidgetState::Loaded { data, markup }
            }
            Err(e) => {
                let message = e.to_string();
                let markup = render::render_error(&message);
                WidgetState::Failed { message, markup }
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            WidgetState::Loaded { data, .. } => Some(data),
            WidgetState::Failed { .. } => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, WidgetState::Loaded { .. })
    }
}
