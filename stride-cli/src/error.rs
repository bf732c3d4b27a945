//! Error types for the API client and the verification coordinator

use reqwest::StatusCode;
use stride_core::flow::TransitionError;

/// Failures from talking to the auth service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// The service rejected the request
    #[error("{status}: {detail}")]
    Status {
        /// HTTP status of the response
        status: StatusCode,
        /// Human-readable detail from the error body, or the status
        /// reason when the body carried none
        detail: String,
    },

    /// The response body didn't match the expected shape
    #[error("couldn't decode the response: {0}")]
    Decode(#[from] reqwest::Error),
}

/// Failures of a verification step, as surfaced to callers of
/// [`DeviceVerifier`](crate::verifier::DeviceVerifier).
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// No verification is in progress
    #[error("no device verification is in progress")]
    Inactive,

    /// The operation isn't valid in the flow's current state
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The service never assigned a session identifier, so the second
    /// factor can't be submitted
    #[error("the verification session is missing its identifier")]
    SessionUnknown,

    /// The verification email could not be sent
    #[error("we couldn't send the verification email: {0}")]
    ChallengeDelivery(#[source] ApiError),

    /// The emailed code was not accepted
    #[error("the verification code was not accepted: {0}")]
    CodeRejected(#[source] ApiError),

    /// The second factor was not accepted
    #[error("the second factor was not accepted: {0}")]
    SecondFactorRejected(#[source] ApiError),
}
