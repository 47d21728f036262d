use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use course_payment_engine::traits::{RecordSearchError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Auth token signature invalid or not provided")]
    CouldNotDeserializeAuthToken,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    /// A settlement rule was violated. These carry the engine's message verbatim and map to 400.
    #[error("{0}")]
    SettlementRuleViolation(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializeAuthToken => StatusCode::BAD_REQUEST,
            Self::SettlementRuleViolation(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found.")]
    AccountNotFound,
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            SettlementError::RecordError(e) => e.into(),
            // Everything else, including a post-commit notification failure, is reported to the caller
            // as a 400 with the engine's message.
            e => Self::SettlementRuleViolation(e.to_string()),
        }
    }
}

impl From<RecordSearchError> for ServerError {
    fn from(e: RecordSearchError) -> Self {
        match e {
            RecordSearchError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            RecordSearchError::ItemNotFound => Self::SettlementRuleViolation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use course_payment_engine::notify::NotifyError;

    use super::*;

    #[test]
    fn business_rule_violations_are_bad_requests() {
        let err = ServerError::from(SettlementError::CartTargetNew);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = ServerError::from(SettlementError::RejectCommentRequired);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn mail_failure_after_settlement_is_a_bad_request() {
        // Money has already moved at this point; the caller still gets a 400 carrying the mail error, not a 500.
        let mail_err = NotifyError { recipient: "instructor@example.com".into(), reason: "relay down".into() };
        let err = ServerError::from(SettlementError::NotificationFailed(mail_err));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Cannot send mail for instructor@example.com"));
    }

    #[test]
    fn store_failures_are_internal_errors() {
        let err = ServerError::from(SettlementError::DatabaseError("disk I/O error".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
