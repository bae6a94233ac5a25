//! Conversions from external infrastructure errors into domain errors.

use reqwest::{Error as HttpError, StatusCode};
use vectorsync_domain::VectorSyncError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VectorSyncError);

impl From<InfraError> for VectorSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VectorSyncError> for InfraError {
    fn from(value: VectorSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoVectorSyncError {
    fn into_vectorsync(self) -> VectorSyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → VectorSyncError */
/* -------------------------------------------------------------------------- */

impl IntoVectorSyncError for HttpError {
    fn into_vectorsync(self) -> VectorSyncError {
        if self.is_timeout() {
            return VectorSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return VectorSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status, "");
        }

        if self.is_decode() {
            return VectorSyncError::Remote(format!("malformed response body: {self}"));
        }

        VectorSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_vectorsync())
    }
}

/* -------------------------------------------------------------------------- */
/* HTTP status → VectorSyncError */
/* -------------------------------------------------------------------------- */

/// Map a non-success response status (and its body, if read) to an error.
pub fn status_error(status: StatusCode, body: &str) -> VectorSyncError {
    let code = status.as_u16();
    let mut message = format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
    if !body.is_empty() {
        message.push_str(": ");
        message.push_str(body.trim());
    }

    match code {
        401 | 403 => VectorSyncError::Authentication(message),
        404 => VectorSyncError::NotFound(message),
        429 | 500..=599 => VectorSyncError::Network(message),
        400..=499 => VectorSyncError::InvalidInput(message),
        _ => VectorSyncError::Remote(message),
    }
}

/* -------------------------------------------------------------------------- */
/* toml / io → VectorSyncError */
/* -------------------------------------------------------------------------- */

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(VectorSyncError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(VectorSyncError::Config(format!("Failed to read config file: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn status_codes_map_to_domain_variants() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            VectorSyncError::Authentication(_)
        ));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, ""), VectorSyncError::NotFound(_)));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            VectorSyncError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad vector size"),
            VectorSyncError::InvalidInput(msg) if msg.contains("bad vector size")
        ));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().expect("client");
        let error = client
            .get(server.uri())
            .send()
            .await
            .expect("response")
            .error_for_status()
            .expect_err("401 is an error");

        let mapped: VectorSyncError = InfraError::from(error).into();
        match mapped {
            VectorSyncError::Authentication(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_toml_maps_to_config_error() {
        let err = toml::from_str::<toml::Value>("not = [valid").expect_err("invalid");
        let mapped: VectorSyncError = InfraError::from(err).into();
        assert!(matches!(mapped, VectorSyncError::Config(msg) if msg.contains("TOML")));
    }
}
