use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::allocation::desk::DeskError;
use crate::allocation::policy::Denial;
use crate::config::ConfigError;
use crate::storage::StoreError;
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Store(StoreError),
    Desk(DeskError),
    Server(axum::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Store(err) => write!(f, "storage error: {}", err),
            AppError::Desk(DeskError::Denied(denial)) => write!(f, "{}", denial),
            AppError::Desk(DeskError::Store(err)) => write!(f, "storage error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Desk(err) => Some(err),
            AppError::Server(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Desk(DeskError::Denied(denial)) => denial_status(denial),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Store(_)
            | AppError::Desk(DeskError::Store(_))
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn denial_status(denial: &Denial) -> StatusCode {
    match denial {
        Denial::UnknownUser(_)
        | Denial::UnknownProject(_)
        | Denial::ApplicationNotFound { .. }
        | Denial::RegistrationNotFound { .. }
        | Denial::EnquiryNotFound(_) => StatusCode::NOT_FOUND,
        Denial::InvalidCredentials => StatusCode::UNAUTHORIZED,
        Denial::RoleNotPermitted { .. }
        | Denial::ProjectNotVisible(_)
        | Denial::NotHandlingOfficer(_)
        | Denial::NotProjectManager(_)
        | Denial::NotEnquiryAuthor(_)
        | Denial::OwnApplication => StatusCode::FORBIDDEN,
        Denial::Invalid(_)
        | Denial::EmptyEnquiry
        | Denial::NotEligible(_)
        | Denial::FlatTypeNotOffered { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::CONFLICT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DeskError> for AppError {
    fn from(value: DeskError) -> Self {
        Self::Desk(value)
    }
}

impl From<Denial> for AppError {
    fn from(value: Denial) -> Self {
        Self::Desk(DeskError::Denied(value))
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::identity::Identity;
    use crate::allocation::project::ProjectName;

    #[test]
    fn denials_map_to_client_statuses() {
        let project = ProjectName::new("Acacia Breeze").unwrap();
        let cases = [
            (Denial::UnknownProject("Nowhere".into()), StatusCode::NOT_FOUND),
            (Denial::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                Denial::NotProjectManager(project.clone()),
                StatusCode::FORBIDDEN,
            ),
            (Denial::EmptyEnquiry, StatusCode::UNPROCESSABLE_ENTITY),
            (
                Denial::DuplicateApplication(project),
                StatusCode::CONFLICT,
            ),
        ];

        for (denial, expected) in cases {
            assert_eq!(AppError::from(denial).status(), expected);
        }
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = AppError::from(StoreError::MissingDataset("data/projects.csv".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("projects.csv"));

        let denied = AppError::from(Denial::UnknownUser(Identity::parse("S1234567A").unwrap()));
        assert_eq!(denied.to_string(), "unknown user S1234567A");
    }
}
