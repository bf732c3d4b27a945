//! Typed access to the auth service's device verification endpoints

use crate::{error::ApiError, logging::LogRequestMiddleware, settings::Settings};
use reqwest::{Client, Method, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stride_core::common::{
    ChallengeRequest, ChallengeResponse, IdentityResponse, VerifyCodeRequest, VerifyCodeResponse,
    VerifyTwoFactorRequest, VerifyTwoFactorResponse,
};
use url::Url;

/// HTTP client for the device verification endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: ClientWithMiddleware,
    api_endpoint: Url,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Self {
        let client = ClientBuilder::new(Client::new())
            .with(LogRequestMiddleware)
            .build();

        Self {
            client,
            api_endpoint: settings.api_endpoint.clone(),
        }
    }

    /// Ask the service to email a verification code for this sign-in.
    pub async fn request_challenge(
        &self,
        request: &ChallengeRequest,
    ) -> Result<ChallengeResponse, ApiError> {
        self.send_json(
            self.server_request(Method::POST, "/auth/device-verification/request")
                .json(request),
        )
        .await
    }

    /// Submit the emailed code.
    pub async fn verify_code(
        &self,
        request: &VerifyCodeRequest,
    ) -> Result<VerifyCodeResponse, ApiError> {
        self.send_json(
            self.server_request(Method::POST, "/auth/device-verification/verify-code")
                .json(request),
        )
        .await
    }

    /// Submit the account's second factor.
    pub async fn verify_second_factor(
        &self,
        request: &VerifyTwoFactorRequest,
    ) -> Result<VerifyTwoFactorResponse, ApiError> {
        self.send_json(
            self.server_request(Method::POST, "/auth/device-verification/verify-2fa")
                .json(request),
        )
        .await
    }

    /// Fetch the canonical identity for the now-verified session.
    pub async fn fetch_identity(&self) -> Result<IdentityResponse, ApiError> {
        self.send_json(self.server_request(Method::GET, "/auth/me"))
            .await
    }

    fn server_request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut url = self.api_endpoint.clone();
        url.set_path(path);
        self.client.request(method, url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

/// Error envelope the service answers failed requests with.
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
    title: Option<String>,
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|parsed| parsed.errors.into_iter().next())
        .and_then(|error| error.detail.or(error.title))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string()
        });

    ApiError::Status { status, detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_detail_over_title() {
        let parsed: ErrorResponse = serde_json::from_str(
            r#"{"errors":[{"status":400,"title":"Bad Request","detail":"invalid or expired code"}]}"#,
        )
        .unwrap();

        let first = parsed.errors.into_iter().next().unwrap();
        assert_eq!(
            first.detail.or(first.title).as_deref(),
            Some("invalid or expired code")
        );
    }

    #[test]
    fn test_error_detail_falls_back_to_title() {
        let parsed: ErrorResponse =
            serde_json::from_str(r#"{"errors":[{"status":500,"title":"Internal Server Error"}]}"#)
                .unwrap();

        let first = parsed.errors.into_iter().next().unwrap();
        assert_eq!(
            first.detail.or(first.title).as_deref(),
            Some("Internal Server Error")
        );
    }
}
