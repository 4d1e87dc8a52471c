//! Uniform result envelope returned by every public catalog operation.

use serde::{Deserialize, Serialize};

use crate::Error;

/// `{ success, data?, error? }`; absent fields are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }

    /// Failed envelope carrying the error's user-facing message.
    pub fn from_error(err: &Error) -> Self {
        Self::err(err.user_message())
    }

}

impl<T> From<Result<T, Error>> for ApiResponse<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::from_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_omits_error() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn test_failure_omits_data() {
        let json = serde_json::to_value(ApiResponse::<u32>::err("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "nope" }));
    }

    #[test]
    fn test_from_result_uses_user_message() {
        let response: ApiResponse<u32> = Err(Error::Timeout("10s".into())).into();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("The catalog service timed out. Please retry."));
    }
}
