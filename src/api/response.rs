use serde::{Deserialize, Serialize};

/// Success envelope shared by every endpoint: `{ success, result?, meta?, message? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>, M: Deserialize<'de>"))]
pub struct ApiResponse<T, M = ()> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            meta: None,
            message: None,
        }
    }
}

impl<T, M> ApiResponse<T, M> {
    pub fn with_meta<N>(self, meta: N) -> ApiResponse<T, N> {
        ApiResponse {
            success: self.success,
            result: self.result,
            meta: Some(meta),
            message: self.message,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            result: None,
            meta: None,
            message: Some(message.into()),
        }
    }
}

/// Meta block of the pinned list, which is not paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMeta {
    pub total: u64,
}
