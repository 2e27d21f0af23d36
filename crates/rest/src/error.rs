use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Numeric detail code from the backend error body, when present.
        error_details_code: Option<i64>,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("no user id configured for end-user endpoints")]
    MissingUserId,
}

impl RestError {
    pub fn error_details_code(&self) -> Option<i64> {
        match self {
            Self::Status {
                error_details_code, ..
            } => *error_details_code,
            _ => None,
        }
    }
}

/// Failure kinds surfaced by domain services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required argument was missing or invalid; nothing was sent.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("service not started")]
    NotStarted,

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error("contacts collaborator failed: {0}")]
    Contacts(String),

    #[error("XMPP transport failed: {0}")]
    Transport(String),

    #[error("event bus error: {0}")]
    EventBus(#[from] huddle_core::EventBusError),
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn error_details_code(&self) -> Option<i64> {
        match self {
            Self::Rest(error) => error.error_details_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_code_comes_from_status_errors_only() {
        let status = RestError::Status {
            status: 409,
            body: "{}".into(),
            error_details_code: Some(409605),
        };
        assert_eq!(status.error_details_code(), Some(409605));
        assert_eq!(RestError::MissingUserId.error_details_code(), None);

        let service = ServiceError::from(status);
        assert_eq!(service.error_details_code(), Some(409605));
        assert_eq!(ServiceError::bad_request("x").error_details_code(), None);
    }

    #[test]
    fn rest_errors_display_unchanged_through_service_error() {
        let rest = RestError::Decode("expected object".into());
        let message = rest.to_string();
        assert_eq!(ServiceError::Rest(rest).to_string(), message);
    }
}
