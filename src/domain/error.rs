use thiserror::Error;

/// Errors raised while building or linking actions, plus the request-time
/// step failure channel.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Cannot understand chain specification for route '{route}'")]
    ChainSpecInvalid { route: String },

    #[error("Cannot find step '{step}' for route '{route}'")]
    StepNotFound { step: String, route: String },

    #[error("Router cannot handle method '{method}'")]
    RouterMethodUnsupported { method: String },

    #[error(transparent)]
    StepExecution(#[from] StepError),
}

impl ActionError {
    pub fn chain_spec_invalid(route: impl Into<String>) -> Self {
        Self::ChainSpecInvalid {
            route: route.into(),
        }
    }

    pub fn step_not_found(step: impl Into<String>, route: impl Into<String>) -> Self {
        Self::StepNotFound {
            step: step.into(),
            route: route.into(),
        }
    }

    pub fn router_method_unsupported(method: impl Into<String>) -> Self {
        Self::RouterMethodUnsupported {
            method: method.into(),
        }
    }
}

/// Error value supplied by a failing step.
///
/// Carried to the host error channel verbatim, without wrapping, so the
/// host decides user-visible behavior.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_spec_invalid_display() {
        let error = ActionError::chain_spec_invalid("/articles");
        assert_eq!(
            error.to_string(),
            "Cannot understand chain specification for route '/articles'"
        );
    }

    #[test]
    fn test_step_not_found_display() {
        let error = ActionError::step_not_found("load_articles", "/articles");
        assert_eq!(
            error.to_string(),
            "Cannot find step 'load_articles' for route '/articles'"
        );
    }

    #[test]
    fn test_router_method_unsupported_display() {
        let error = ActionError::router_method_unsupported("patch");
        assert_eq!(error.to_string(), "Router cannot handle method 'patch'");
    }

    #[test]
    fn test_step_error_carried_verbatim() {
        let error = StepError::new("article 42 missing");
        let wrapped: ActionError = error.clone().into();

        assert_eq!(wrapped.to_string(), "article 42 missing");
        assert_eq!(error.message(), "article 42 missing");
    }
}
