//! HTTP implementation of [`AuthApi`] using `reqwest`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, header};
use tunesmith_protocol::{
    Codec, Credentials, ErrorBody, Identity, JsonCodec, LoginResponse,
    ProfileResponse, ProtocolError, Realm, Token,
};

use crate::{AuthApi, TransportError};

/// Settings for [`HttpAuthApi`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme, host and port of the backend, e.g. `https://api.example.com`.
    /// Realm prefixes are appended to it.
    pub base_url: String,

    /// Upper bound for a whole request, connect through body.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Talks to the backend's auth endpoints over HTTP.
///
/// One instance is shared by both realms; it holds no per-realm state.
pub struct HttpAuthApi<C: Codec = JsonCodec> {
    client: Client,
    base_url: String,
    codec: C,
}

impl HttpAuthApi<JsonCodec> {
    /// Builds a client that speaks JSON.
    ///
    /// # Errors
    /// Returns [`TransportError::Config`] if the underlying client can't be
    /// constructed (e.g. no TLS backend available).
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        Self::with_codec(config, JsonCodec)
    }
}

impl<C: Codec> HttpAuthApi<C> {
    /// Builds a client with a custom body codec.
    pub fn with_codec(
        config: HttpConfig,
        codec: C,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            codec,
        })
    }

    /// The backend base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, realm: Realm, action: &str) -> String {
        format!("{}{}/{}", self.base_url, realm.api_prefix(), action)
    }

    /// Sends the request and returns the body of a 2xx response.
    ///
    /// Non-2xx responses are mapped to [`TransportError::Unauthorized`]
    /// (401/403) or [`TransportError::Status`], carrying the server's
    /// `message`/`error` field when the body has one.
    async fn execute(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let response = request.send().await.map_err(|e| {
            TransportError::Unreachable(format!("{endpoint}: {e}"))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            TransportError::Unreachable(format!("{endpoint}: {e}"))
        })?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = self
            .codec
            .decode::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message);

        tracing::debug!(
            %endpoint,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or(""),
            "backend rejected request"
        );

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(TransportError::Unauthorized(message))
            }
            _ => Err(TransportError::Status {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

impl<C: Codec> AuthApi for HttpAuthApi<C> {
    async fn login(
        &self,
        realm: Realm,
        credentials: &Credentials,
    ) -> Result<LoginResponse, TransportError> {
        let endpoint = self.endpoint(realm, "login");
        let body = self.codec.encode(credentials)?;

        let request = self
            .client
            .post(&endpoint)
            .header(header::CONTENT_TYPE, self.codec.content_type())
            .body(body);

        let bytes = self.execute(request, &endpoint).await?;
        let response: LoginResponse = self.codec.decode(&bytes)?;

        if response.token.is_blank() {
            return Err(ProtocolError::InvalidBody(
                "login response carried an empty token".into(),
            )
            .into());
        }
        Ok(response)
    }

    async fn profile(
        &self,
        realm: Realm,
        token: &Token,
    ) -> Result<Identity, TransportError> {
        let endpoint = self.endpoint(realm, "profile");
        let request = self.client.get(&endpoint).bearer_auth(token.as_str());

        let bytes = self.execute(request, &endpoint).await?;
        let response: ProfileResponse = self.codec.decode(&bytes)?;
        Ok(response.identity)
    }

    async fn logout(
        &self,
        realm: Realm,
        token: &Token,
    ) -> Result<(), TransportError> {
        let endpoint = self.endpoint(realm, "logout");
        let request = self.client.post(&endpoint).bearer_auth(token.as_str());

        // The body is irrelevant; only the status matters.
        self.execute(request, &endpoint).await.map(|_| ())
    }
}
