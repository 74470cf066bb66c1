//! Classification of `async-openai` errors into [`LlmError`].

use async_openai::error::{ApiError, OpenAIError};

use parley_types::llm::LlmError;

pub(crate) fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api) => classify_api_error(api),
        OpenAIError::Reqwest(e) => {
            let message = e.to_string();
            match e.status().map(|status| status.as_u16()) {
                None => LlmError::Network(message),
                Some(status) => classify_status(status, message),
            }
        }
        OpenAIError::JSONDeserialize(_, body) => {
            LlmError::Deserialization(format!("unexpected response body: {body}"))
        }
        OpenAIError::StreamError(e) => LlmError::Stream(e.to_string()),
        OpenAIError::InvalidArgument(message) => LlmError::InvalidRequest(message),
        other => LlmError::Provider {
            message: other.to_string(),
        },
    }
}

/// Vendors disagree on whether `code` or `type` carries the category, so both are checked.
fn classify_api_error(api: ApiError) -> LlmError {
    let tags = [api.code.as_deref(), api.r#type.as_deref()];
    let tagged = |names: &[&str]| tags.iter().flatten().any(|tag| names.contains(tag));

    if tagged(&["invalid_api_key", "authentication_error"])
        || api.message.to_lowercase().contains("api key")
    {
        LlmError::AuthenticationFailed
    } else if tagged(&["rate_limit_exceeded", "rate_limit_error"]) {
        LlmError::RateLimited {
            retry_after_ms: None,
        }
    } else if tagged(&["server_error", "overloaded_error"]) {
        LlmError::Overloaded(api.message)
    } else {
        LlmError::Provider {
            message: api.message,
        }
    }
}

fn classify_status(status: u16, message: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        502 | 503 | 529 => LlmError::Overloaded(message),
        _ => LlmError::Provider { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(message: &str, kind: Option<&str>, code: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_auth_by_type_code_or_message() {
        for err in [
            api_error("denied", Some("authentication_error"), None),
            api_error("denied", None, Some("invalid_api_key")),
            api_error("Incorrect API key provided: sk-***", None, None),
        ] {
            assert!(matches!(map_openai_error(err), LlmError::AuthenticationFailed));
        }
    }

    #[test]
    fn test_rate_limit_and_overload() {
        let err = map_openai_error(api_error("slow down", None, Some("rate_limit_exceeded")));
        assert!(matches!(err, LlmError::RateLimited { .. }));

        let err = map_openai_error(api_error("busy", Some("overloaded_error"), None));
        assert!(matches!(err, LlmError::Overloaded(ref m) if m == "busy"));
    }

    #[test]
    fn test_other_api_error_keeps_message() {
        let err = map_openai_error(api_error("model not found", Some("invalid_request_error"), None));
        assert_eq!(err.to_string(), "provider error: model not found");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(401, String::new()), LlmError::AuthenticationFailed));
        assert!(matches!(classify_status(429, String::new()), LlmError::RateLimited { .. }));
        assert!(matches!(classify_status(503, String::new()), LlmError::Overloaded(_)));
        assert!(matches!(classify_status(404, "gone".into()), LlmError::Provider { .. }));
    }

    #[test]
    fn test_invalid_argument() {
        let err = map_openai_error(OpenAIError::InvalidArgument("bad arg".to_string()));
        assert!(matches!(err, LlmError::InvalidRequest(ref m) if m == "bad arg"));
    }
}
