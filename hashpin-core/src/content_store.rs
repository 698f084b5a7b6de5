use crate::config::{ContentStoreConfig, PinataCredentials};
use crate::error::{HashpinError, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Opaque hash-based address returned by the pinning service. Produced once
/// per successful upload and later recorded on-ledger verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uploads a binary payload to a remote content store and returns its
/// identifier. The seam the orchestrator depends on.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upload(&self, payload: Bytes, display_name: &str) -> Result<ContentIdentifier>;
}

/// Content store client for the Pinata pinning API. One outbound request per
/// upload, no retries; every failure mode surfaces immediately as an upload
/// error.
pub struct PinataClient {
    http: reqwest::Client,
    config: ContentStoreConfig,
    credentials: Option<PinataCredentials>,
}

impl PinataClient {
    /// Client that resolves credentials from the environment at upload time.
    pub fn new(config: ContentStoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credentials: None,
        }
    }

    /// Client with fixed credentials, bypassing the environment.
    pub fn with_credentials(config: ContentStoreConfig, credentials: PinataCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credentials: Some(credentials),
        }
    }

    fn resolve_credentials(&self) -> Result<PinataCredentials> {
        match &self.credentials {
            Some(credentials) => Ok(credentials.clone()),
            None => PinataCredentials::from_env(),
        }
    }
}

#[derive(serde::Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

#[async_trait]
impl ContentStore for PinataClient {
    async fn upload(&self, payload: Bytes, display_name: &str) -> Result<ContentIdentifier> {
        let credentials = self.resolve_credentials()?;

        let metadata = serde_json::json!({
            "name": display_name,
            "keyvalues": { "uploadedBy": self.config.app_tag },
        })
        .to_string();
        let options = serde_json::json!({ "cidVersion": self.config.cid_version }).to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(payload.to_vec())
                    .file_name(display_name.to_string()),
            )
            .text("pinataMetadata", metadata)
            .text("pinataOptions", options);

        tracing::debug!(
            "Uploading '{}' ({} bytes) to {}",
            display_name,
            payload.len(),
            self.config.endpoint
        );

        let response = self
            .http
            .post(&self.config.endpoint)
            .header("pinata_api_key", &credentials.api_key)
            .header("pinata_secret_api_key", &credentials.api_secret)
            .multipart(form)
            .send()
            .await
            .map_err(|error| HashpinError::Upload(error.to_string()))?;

        if !response.status().is_success() {
            return Err(HashpinError::Upload(format!(
                "pinning service returned status {}",
                response.status()
            )));
        }

        let payload: PinResponse = response
            .json()
            .await
            .map_err(|error| HashpinError::Upload(error.to_string()))?;

        match payload.ipfs_hash {
            Some(hash) if !hash.is_empty() => {
                tracing::info!("Pinned '{}' as {}", display_name, hash);
                Ok(ContentIdentifier::new(hash))
            }
            _ => Err(HashpinError::Upload(
                "pinning service response is missing the IpfsHash field".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PinataClient {
        let config = ContentStoreConfig {
            endpoint: format!("{}/pinning/pinFileToIPFS", server.uri()),
            ..ContentStoreConfig::default()
        };
        let credentials = PinataCredentials {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
        };
        PinataClient::with_credentials(config, credentials)
    }

    #[tokio::test]
    async fn upload_returns_identifier_with_exactly_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .and(header("pinata_api_key", "test-key"))
            .and(header("pinata_secret_api_key", "test-secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "IpfsHash": "Qm123abc" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let identifier = client_for(&server)
            .upload(Bytes::from_static(b"image bytes"), "photo.png")
            .await
            .unwrap();

        assert_eq!(identifier.as_str(), "Qm123abc");
        assert!(!identifier.as_str().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_an_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .upload(Bytes::from_static(b"image bytes"), "photo.png")
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::Upload(_)));
    }

    #[tokio::test]
    async fn missing_identifier_field_is_an_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .upload(Bytes::from_static(b"image bytes"), "photo.png")
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::Upload(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_upload_error() {
        let config = ContentStoreConfig {
            // Reserved port on localhost with nothing listening.
            endpoint: "http://127.0.0.1:9/pinning/pinFileToIPFS".to_string(),
            ..ContentStoreConfig::default()
        };
        let credentials = PinataCredentials {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
        };
        let client = PinataClient::with_credentials(config, credentials);

        let err = client
            .upload(Bytes::from_static(b"image bytes"), "photo.png")
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::Upload(_)));
    }
}
