//! Coordinates one device verification at a time against the auth service.
//!
//! [`DeviceVerifier`] owns the pure [`VerificationFlow`] state machine and
//! performs the network calls it isn't allowed to. Every operation follows
//! the same shape: lock, ask the flow to begin the step (which enforces the
//! ordering and input guards), drop the lock across the request, then
//! re-lock and hand the response back to the flow. Responses that come back
//! after the flow was cancelled or replaced are discarded by comparing a
//! generation counter captured before the request.

use crate::{api::ApiClient, error::FlowError, session::SessionStore};
use parking_lot::Mutex;
use std::fmt;
use stride_core::{
    common::{ChallengeRequest, DeviceInfo, Identity, VerifyCodeRequest, VerifyTwoFactorRequest},
    email::EmailAddress,
    flow::{ChallengeState, CodeOutcome, Step, VerificationFlow},
};

/// Everything the caller supplies when verification starts.
pub struct Activation {
    /// Address of the account being signed in to
    pub email: EmailAddress,
    /// Password that already passed the primary login check
    pub password: String,
    /// Ask the service to skip verification on this device next time
    pub remember_device: bool,
    /// Set when the caller already knows the account has 2FA enabled,
    /// so the UI can show both steps up front
    pub second_factor_hint: bool,
    /// Description of the device being verified, for display only
    pub device: Option<DeviceInfo>,
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_device", &self.remember_device)
            .field("second_factor_hint", &self.second_factor_hint)
            .field("device", &self.device)
            .finish()
    }
}

struct ActiveFlow {
    generation: u64,
    email: EmailAddress,
    password: String,
    device: Option<DeviceInfo>,
    flow: VerificationFlow,
}

impl fmt::Debug for ActiveFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveFlow")
            .field("generation", &self.generation)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("device", &self.device)
            .field("flow", &self.flow)
            .finish()
    }
}

#[derive(Debug, Default)]
struct VerifierState {
    generation: u64,
    active: Option<ActiveFlow>,
}

/// What a coordinator operation achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// A challenge email is out, or already was
    ChallengeSent,
    /// The emailed code was accepted; the account still needs its second factor
    SecondFactorRequired,
    /// Verification finished and the session is established
    Completed(Identity),
    /// The response arrived after the flow was cancelled or replaced
    /// and was thrown away
    Discarded,
}

/// Snapshot of the active flow, for display.
#[derive(Debug, Clone)]
pub struct FlowStatus {
    /// Which screen the user is on
    pub step: Step,
    /// Where challenge issuance stands
    pub challenge: ChallengeState,
    /// Whether any response has assigned a session identifier yet
    pub session_known: bool,
    /// Whether the service has told us a second factor is needed
    pub requires_second_factor: bool,
    /// Whether 2FA input is in backup-code mode
    pub uses_backup_code: bool,
    /// Whether a submission is in flight
    pub submitting: bool,
    /// Description of the device being verified
    pub device: Option<DeviceInfo>,
}

/// Drives the device verification flow.
///
/// All methods take `&self`; the state sits behind a mutex that is never
/// held across an await.
#[derive(Debug)]
pub struct DeviceVerifier {
    api: ApiClient,
    sessions: SessionStore,
    state: Mutex<VerifierState>,
}

impl DeviceVerifier {
    pub fn new(api: ApiClient, sessions: SessionStore) -> Self {
        Self {
            api,
            sessions,
            state: Mutex::new(VerifierState::default()),
        }
    }

    /// Start a verification for `activation`.
    ///
    /// Returns `false` and changes nothing when a verification is already
    /// in progress: redundant activation events must not reset a live flow
    /// or trigger another email.
    pub fn activate(&self, activation: Activation) -> bool {
        let mut state = self.state.lock();
        if state.active.is_some() {
            tracing::debug!("Ignoring activation, a verification is already in progress");
            return false;
        }

        state.generation += 1;
        let mut flow = VerificationFlow::new(activation.second_factor_hint);
        flow.set_remember_device(activation.remember_device);
        state.active = Some(ActiveFlow {
            generation: state.generation,
            email: activation.email,
            password: activation.password,
            device: activation.device,
            flow,
        });

        true
    }

    /// Cancel the active verification, if any.
    ///
    /// In-flight responses for it will be discarded when they land.
    pub fn deactivate(&self) {
        self.state.lock().active = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active.is_some()
    }

    pub fn status(&self) -> Option<FlowStatus> {
        let state = self.state.lock();
        state.active.as_ref().map(|active| FlowStatus {
            step: active.flow.step(),
            challenge: active.flow.challenge(),
            session_known: active.flow.session().is_known(),
            requires_second_factor: active.flow.requires_second_factor(),
            uses_backup_code: active.flow.uses_backup_code(),
            submitting: active.flow.is_submitting(),
            device: active.device.clone(),
        })
    }

    /// Replace the email-code buffer with the digits found in `text`.
    pub fn enter_email_code(&self, text: &str) -> Result<(), FlowError> {
        self.with_active(|active| {
            let buffer = active.flow.email_code_mut();
            buffer.clear();
            buffer.fill_from_str(text);
        })
    }

    /// Replace the authenticator-code buffer with the digits found in `text`.
    pub fn enter_totp(&self, text: &str) -> Result<(), FlowError> {
        self.with_active(|active| {
            let buffer = active.flow.totp_mut();
            buffer.clear();
            buffer.fill_from_str(text);
        })
    }

    /// Replace the backup-code input.
    pub fn enter_backup_code(&self, text: &str) -> Result<(), FlowError> {
        self.with_active(|active| active.flow.set_backup_code(text))
    }

    /// Switch the second-factor input between authenticator and backup-code
    /// mode. Both inputs keep their contents across switches.
    pub fn use_backup_code(&self, enabled: bool) -> Result<(), FlowError> {
        self.with_active(|active| active.flow.use_backup_code(enabled))
    }

    pub fn set_remember_device(&self, remember: bool) -> Result<(), FlowError> {
        self.with_active(|active| active.flow.set_remember_device(remember))
    }

    /// Make sure a verification code is on its way to the user's inbox.
    ///
    /// The first call for an activation sends the email; later calls are
    /// no-ops reporting [`Progress::ChallengeSent`], so re-entering the
    /// screen never re-issues the challenge.
    pub async fn ensure_challenge(&self) -> Result<Progress, FlowError> {
        let (generation, request) = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(FlowError::Inactive)?;
            match active.flow.challenge() {
                ChallengeState::Pending | ChallengeState::Issued => {
                    return Ok(Progress::ChallengeSent)
                }
                ChallengeState::Unissued => {}
            }
            active.flow.begin_challenge()?;
            (active.generation, challenge_request(active))
        };

        let result = self.api.request_challenge(&request).await;

        self.with_current(generation, |active| match result {
            Ok(response) => {
                active.flow.challenge_issued(response.session_id);
                Ok(Progress::ChallengeSent)
            }
            Err(err) => {
                active.flow.challenge_failed();
                Err(FlowError::ChallengeDelivery(err))
            }
        })
        .unwrap_or(Ok(Progress::Discarded))
    }

    /// Ask the service to email a fresh code for the current activation.
    pub async fn resend_challenge(&self) -> Result<Progress, FlowError> {
        let (generation, request) = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(FlowError::Inactive)?;
            active.flow.begin_resend()?;
            (active.generation, challenge_request(active))
        };

        let result = self.api.request_challenge(&request).await;

        self.with_current(generation, |active| match result {
            Ok(response) => {
                active.flow.challenge_issued(response.session_id);
                Ok(Progress::ChallengeSent)
            }
            Err(err) => {
                active.flow.resend_failed();
                Err(FlowError::ChallengeDelivery(err))
            }
        })
        .unwrap_or(Ok(Progress::Discarded))
    }

    /// Submit the emailed code.
    ///
    /// Refuses to hit the network until all six digits are present.
    pub async fn submit_email_code(&self) -> Result<Progress, FlowError> {
        let (generation, request) = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(FlowError::Inactive)?;
            let code = active.flow.begin_code_submission()?;
            let request = VerifyCodeRequest {
                email: active.email.as_str().to_string(),
                password: active.password.clone(),
                code: code.into_string(),
                session_id: active.flow.session().known().map(str::to_string),
                remember_device: active.flow.remember_device().then_some(true),
            };
            (active.generation, request)
        };

        let result = self.api.verify_code(&request).await;

        let Some(resolved) = self.with_current(generation, |active| match result {
            Ok(response) => active
                .flow
                .resolve_code_response(response)
                .map_err(FlowError::from),
            Err(err) => {
                active.flow.submission_failed();
                Err(FlowError::CodeRejected(err))
            }
        }) else {
            return Ok(Progress::Discarded);
        };

        match resolved? {
            CodeOutcome::SecondFactorRequired => Ok(Progress::SecondFactorRequired),
            CodeOutcome::Verified(embedded) => self.finalize(generation, embedded).await,
        }
    }

    /// Submit the account's second factor, whichever input mode is active.
    pub async fn submit_second_factor(&self) -> Result<Progress, FlowError> {
        let (generation, request) = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(FlowError::Inactive)?;
            // The service assigns a session identifier no later than the
            // response that demanded a second factor.
            let session_id = active
                .flow
                .session()
                .known()
                .map(str::to_string)
                .ok_or(FlowError::SessionUnknown)?;
            let second_factor = active.flow.begin_second_factor_submission()?;
            let request = VerifyTwoFactorRequest {
                email: active.email.as_str().to_string(),
                session_id,
                second_factor,
            };
            (active.generation, request)
        };

        let result = self.api.verify_second_factor(&request).await;

        let Some(resolved) = self.with_current(generation, |active| match result {
            Ok(response) => active
                .flow
                .resolve_second_factor_response(response)
                .map_err(FlowError::from),
            Err(err) => {
                active.flow.submission_failed();
                Err(FlowError::SecondFactorRejected(err))
            }
        }) else {
            return Ok(Progress::Discarded);
        };

        let embedded = resolved?;
        self.finalize(generation, embedded).await
    }

    /// Fetch the canonical identity, falling back to the one embedded in
    /// the verification response, then establish the session and wind the
    /// flow down.
    async fn finalize(&self, generation: u64, embedded: Identity) -> Result<Progress, FlowError> {
        let identity = match self.api.fetch_identity().await {
            Ok(response) => response.data,
            Err(err) => {
                tracing::warn!(
                    %err,
                    "Identity refresh failed, keeping the identity from the verification response"
                );
                embedded
            }
        };

        {
            let mut state = self.state.lock();
            let still_current = state
                .active
                .as_ref()
                .is_some_and(|active| active.generation == generation);
            if !still_current {
                return Ok(Progress::Discarded);
            }
            state.active = None;
        }

        let session = self.sessions.establish(identity);
        Ok(Progress::Completed(session.identity))
    }

    fn with_active<T>(&self, edit: impl FnOnce(&mut ActiveFlow) -> T) -> Result<T, FlowError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(FlowError::Inactive)?;
        Ok(edit(active))
    }

    /// Run `apply` only if the flow that started the request is still the
    /// one in place. `None` means the response is stale.
    fn with_current<T>(
        &self,
        generation: u64,
        apply: impl FnOnce(&mut ActiveFlow) -> T,
    ) -> Option<T> {
        let mut state = self.state.lock();
        let active = state
            .active
            .as_mut()
            .filter(|active| active.generation == generation)?;
        Some(apply(active))
    }
}

fn challenge_request(active: &ActiveFlow) -> ChallengeRequest {
    ChallengeRequest {
        email: active.email.as_str().to_string(),
        password: active.password.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use assert_matches::assert_matches;
    use url::Url;

    fn verifier() -> DeviceVerifier {
        let settings = Settings {
            api_endpoint: Url::parse("http://localhost:9").unwrap(),
        };
        DeviceVerifier::new(ApiClient::new(&settings), SessionStore::new())
    }

    fn activation() -> Activation {
        Activation {
            email: "a@b.com".parse().unwrap(),
            password: "x".to_string(),
            remember_device: false,
            second_factor_hint: false,
            device: None,
        }
    }

    #[test]
    fn test_only_one_verification_at_a_time() {
        let verifier = verifier();

        assert!(verifier.activate(activation()));
        assert!(!verifier.activate(activation()));
        assert!(verifier.is_active());

        verifier.deactivate();
        assert!(!verifier.is_active());
        assert!(verifier.activate(activation()));
    }

    #[test]
    fn test_editing_requires_an_active_flow() {
        let verifier = verifier();

        assert_matches!(verifier.enter_email_code("123456"), Err(FlowError::Inactive));
        assert_matches!(verifier.use_backup_code(true), Err(FlowError::Inactive));
        assert!(verifier.status().is_none());
    }

    #[test]
    fn test_reactivation_starts_from_scratch() {
        let verifier = verifier();
        verifier.activate(activation());
        verifier.enter_email_code("123456").unwrap();
        verifier.deactivate();

        verifier.activate(Activation {
            second_factor_hint: true,
            ..activation()
        });

        let status = verifier.status().unwrap();
        assert_eq!(status.step, Step::EmailCode);
        assert_eq!(status.challenge, ChallengeState::Unissued);
        assert!(status.requires_second_factor);
        assert!(!status.session_known);
        assert!(!status.submitting);
    }

    fn remembers(verifier: &DeviceVerifier) -> bool {
        let state = verifier.state.lock();
        state.active.as_ref().unwrap().flow.remember_device()
    }

    #[test]
    fn test_activation_seeds_remember_device() {
        let verifier = verifier();
        verifier.activate(Activation {
            remember_device: true,
            ..activation()
        });
        assert!(remembers(&verifier));

        verifier.set_remember_device(false).unwrap();
        assert!(!remembers(&verifier));
    }

    #[test]
    fn test_activation_debug_masks_the_password() {
        let debugged = format!("{:?}", activation());

        assert!(debugged.contains("<redacted>"));
        assert!(!debugged.contains("\"x\""));
    }
}
