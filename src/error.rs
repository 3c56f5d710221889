use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Recurring instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Timezone not found: {0}")]
    TimezoneNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl AppError {
    pub fn event_not_found<S: Into<String>>(id: S) -> Self {
        Self::EventNotFound(id.into())
    }

    pub fn instance_not_found<S: Into<String>>(id: S) -> Self {
        Self::InstanceNotFound(id.into())
    }

    pub fn timezone_not_found<S: Into<String>>(id: S) -> Self {
        Self::TimezoneNotFound(id.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn publish<S: Into<String>>(msg: S) -> Self {
        Self::Publish(msg.into())
    }

    pub fn operation_failed<S: Into<String>>(msg: S) -> Self {
        Self::OperationFailed(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound(_) | Self::InstanceNotFound(_) | Self::TimezoneNotFound(_)
        )
    }

    /// Callers outside the engine only ever see "not found" or a generic failure.
    pub fn to_safe_string(&self) -> String {
        if self.is_not_found() {
            self.to_string()
        } else {
            match self {
                Self::InvalidInput(_) => self.to_string(),
                Self::Database(_) => "Database operation failed".to_string(),
                Self::Network(_) => "Network request failed".to_string(),
                _ => "Operation failed".to_string(),
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
