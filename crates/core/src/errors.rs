use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid {entity} transition from {from} to {to}")]
    InvalidStateTransition { entity: &'static str, from: String, to: String },
    #[error("request {request_id} has already been awarded")]
    AlreadyAwarded { request_id: String },
    #[error("policy violation for supplier {supplier_id}: {reason}")]
    PolicyViolation { supplier_id: String, reason: String },
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn invalid_transition(
        entity: &'static str,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition { entity, from: from.into(), to: to.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::Domain(DomainError::InvalidStateTransition { .. }))
    }

    pub fn is_already_awarded(&self) -> bool {
        matches!(self, Self::Domain(DomainError::AlreadyAwarded { .. }))
    }

    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::Domain(DomainError::PolicyViolation { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Domain(DomainError::Validation(_)))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => {
                "The request conflicts with the current state of the procurement request."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(
                error @ (DomainError::AlreadyAwarded { .. } | DomainError::PolicyViolation { .. }),
            ) => Self::Conflict { message: error.to_string(), correlation_id },
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::NotFound { .. } => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::from(DomainError::Validation("delivery_days must be > 0".to_owned()))
                .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn already_awarded_and_policy_violation_map_to_conflict() {
        let awarded =
            ApplicationError::from(DomainError::AlreadyAwarded { request_id: "REQ-1".to_owned() })
                .into_interface("req-2");
        assert!(matches!(awarded, InterfaceError::Conflict { .. }));

        let penalized = ApplicationError::from(DomainError::PolicyViolation {
            supplier_id: "SUP-1".to_owned(),
            reason: "cannot re-award the penalized supplier".to_owned(),
        })
        .into_interface("req-3");
        assert!(matches!(
            penalized,
            InterfaceError::Conflict { ref message, .. } if message.contains("SUP-1")
        ));
    }

    #[test]
    fn not_found_keeps_entity_in_message() {
        let interface = ApplicationError::not_found("quotation", "QTN-9").into_interface("req-4");
        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref message, .. } if message == "quotation not found: QTN-9"
        ));
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn error_predicates_identify_categories() {
        let error = ApplicationError::from(DomainError::PolicyViolation {
            supplier_id: "SUP-1".to_owned(),
            reason: "penalized".to_owned(),
        });
        assert!(error.is_policy_violation());
        assert!(!error.is_already_awarded());
        assert!(ApplicationError::not_found("invitation", "INV-1").is_not_found());
    }
}
