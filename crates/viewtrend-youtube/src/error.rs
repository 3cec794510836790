use thiserror::Error;
use viewtrend_core::SourceError;

/// Errors returned by the YouTube Data API client.
#[derive(Debug, Error)]
pub enum YoutubeError {
    /// Network or TLS failure, or a 5xx status, from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The project's daily quota is used up (`quotaExceeded` / `dailyLimitExceeded`).
    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other 4xx error body returned by the API.
    #[error("YouTube API error {status} ({reason}): {message}")]
    ApiError {
        status: u16,
        reason: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Client setup problem: missing API key or unusable base URL.
    #[error("YouTube client configuration error: {0}")]
    Configuration(String),
}

impl YoutubeError {
    /// API error reasons that mean the credential or project is misconfigured.
    fn is_credential_problem(&self) -> bool {
        matches!(
            self,
            YoutubeError::ApiError { reason, .. }
                if matches!(
                    reason.as_str(),
                    "keyInvalid" | "keyExpired" | "accessNotConfigured" | "forbidden"
                )
        )
    }
}

impl From<YoutubeError> for SourceError {
    fn from(err: YoutubeError) -> Self {
        if matches!(err, YoutubeError::Configuration(_)) || err.is_credential_problem() {
            SourceError::Configuration(err.to_string())
        } else {
            SourceError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_maps_to_configuration() {
        let err = YoutubeError::ApiError {
            status: 400,
            reason: "keyInvalid".to_owned(),
            message: "API key not valid. Please pass a valid API key.".to_owned(),
        };
        assert!(matches!(
            SourceError::from(err),
            SourceError::Configuration(_)
        ));
    }

    #[test]
    fn quota_maps_to_transient() {
        let err = YoutubeError::QuotaExceeded("daily quota".to_owned());
        let mapped = SourceError::from(err);
        assert!(mapped.is_transient());
        assert!(mapped.to_string().contains("quota"));
    }

    #[test]
    fn missing_key_maps_to_configuration() {
        let err = YoutubeError::Configuration("YOUTUBE_API_KEY is empty".to_owned());
        assert!(!SourceError::from(err).is_transient());
    }
}
