use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChargeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Hospital '{short_name}' not found in config")]
    HospitalNotFound {
        short_name: String,
        available: Vec<String>,
    },

    #[error("No hospitals configured")]
    NoHospitals,
}

impl ChargeError {
    pub fn config(message: impl Into<String>) -> Self {
        ChargeError::ConfigError {
            message: message.into(),
        }
    }

    /// 給終端使用者看的訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            ChargeError::HttpError(e) if e.is_timeout() => {
                "The hospital server did not respond in time".to_string()
            }
            ChargeError::HttpError(e) => match e.status() {
                Some(status) => format!("The hospital server answered with HTTP {}", status),
                None => "Could not reach the hospital server".to_string(),
            },
            ChargeError::HospitalNotFound {
                short_name,
                available,
            } => format!(
                "Hospital '{}' not found in config. Available hospitals: [{}]",
                short_name,
                available.join(", ")
            ),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ChargeError::HttpError(_) => {
                "Check the file_url in the config; hospitals move their files often"
            }
            ChargeError::IoError(_) => "Check that the data directory is writable",
            ChargeError::ConfigError { .. } | ChargeError::InvalidConfigValueError { .. } => {
                "Make sure the config file exists and is valid JSON or TOML"
            }
            ChargeError::HospitalNotFound { .. } => {
                "Use --list to see the configured short names"
            }
            ChargeError::NoHospitals => {
                "Add at least one entry under \"hospitals\" in the config file"
            }
        }
    }

    /// 依錯誤類型決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ChargeError::HttpError(_) => 2,
            ChargeError::IoError(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChargeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hospital_not_found_lists_available() {
        let err = ChargeError::HospitalNotFound {
            short_name: "nope".to_string(),
            available: vec!["yale-new-haven".to_string(), "bridgeport".to_string()],
        };

        let message = err.user_friendly_message();
        assert!(message.contains("'nope'"));
        assert!(message.contains("yale-new-haven, bridgeport"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        let io = ChargeError::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(io.exit_code(), 3);
        assert_eq!(ChargeError::NoHospitals.exit_code(), 1);
        assert_eq!(ChargeError::config("bad").exit_code(), 1);
    }
}
