//! The device verification flow.
//!
//! [`VerificationFlow`] is the pure state machine behind step-up
//! authentication: it owns the current step, the verification session
//! identifier, the challenge issuance guard and the per-step input
//! buffers, and it decides every transition. It performs no I/O; a
//! coordinator drives it by calling a `begin_*` method (which validates
//! guards and hands back the payload to submit), performing the network
//! request, and reporting the result back through the matching
//! `resolve_*`/`*_failed` method.

use crate::{
    code::{BackupCode, CodeBuffer, DigitCode},
    common::{Identity, SecondFactor, VerifyCodeResponse, VerifyTwoFactorResponse},
};

/// Position in the verification sequence.
///
/// Steps only ever advance; the sole way back is destroying the flow
/// and starting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Waiting for the emailed 6-digit code
    EmailCode,
    /// Waiting for the authenticator code or a backup code
    TwoFactor,
    /// Verification finished; ownership passes to session establishment
    Complete,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::EmailCode => "email-code".fmt(f),
            Step::TwoFactor => "2fa".fmt(f),
            Step::Complete => "complete".fmt(f),
        }
    }
}

/// The verification session identifier as far as this client knows it.
///
/// The service tolerates the identifier being absent on early calls (it
/// can resolve the session from the submitted credentials), so this
/// starts out [`SessionHandle::Unknown`] and narrows to
/// [`SessionHandle::Known`] once any response supplies one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionHandle {
    /// No response has named a session yet
    #[default]
    Unknown,
    /// The identifier the most recent response carried
    Known(String),
}

impl SessionHandle {
    /// The identifier, if one is known
    pub fn known(&self) -> Option<&str> {
        match self {
            SessionHandle::Unknown => None,
            SessionHandle::Known(id) => Some(id),
        }
    }

    /// Whether any response has named a session yet
    pub fn is_known(&self) -> bool {
        matches!(self, SessionHandle::Known(_))
    }

    /// Overwrite with the identifier from the latest response, if it
    /// carried one. The service may rotate identifiers (e.g. on a
    /// re-sent challenge); the newest observation always wins.
    pub fn adopt(&mut self, latest: Option<String>) {
        if let Some(id) = latest {
            *self = SessionHandle::Known(id);
        }
    }
}

/// Progress of the one email challenge this activation may issue implicitly.
///
/// `Pending` makes the "no issuance currently in flight" precondition
/// explicit, so redundant activation events cannot race a second email
/// out the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengeState {
    /// Nothing sent; issuance may start
    #[default]
    Unissued,
    /// An issuance request is in flight
    Pending,
    /// The service accepted an issuance
    Issued,
}

/// Which step currently has a verification request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStep {
    EmailCode,
    SecondFactor,
}

/// Interpretation of a successful email-code verification response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    /// The account still needs its second factor
    SecondFactorRequired,
    /// The login is fully verified
    Verified(Identity),
}

/// A transition the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The operation belongs to a different step
    #[error("expected the {expected} step, but the flow is in the {actual} step")]
    WrongStep {
        /// Step the operation is valid in
        expected: Step,
        /// Step the flow is actually in
        actual: Step,
    },
    /// The one implicit issuance for this activation already happened
    #[error("a challenge was already issued for this activation")]
    ChallengeAlreadyIssued,
    /// An issuance request is already in flight
    #[error("a challenge request is already in flight")]
    ChallengePending,
    /// Re-sending requires a previously issued challenge
    #[error("no challenge has been issued yet")]
    ChallengeNotIssued,
    /// A verification request for this step is already in flight
    #[error("a verification request for this step is already pending")]
    SubmissionPending,
    /// A response was reported without a matching submission
    #[error("no verification request is pending for this step")]
    NoPendingSubmission,
    /// The code buffer is not fully populated
    #[error("the verification code must be 6 digits")]
    IncompleteCode,
    /// Backup-code mode is selected but the field is blank
    #[error("enter a backup code first")]
    EmptyBackupCode,
    /// The service reported neither success nor a second-factor requirement
    #[error("the service reported neither success nor a second-factor requirement")]
    MissingOutcome,
    /// The service confirmed the second factor but embedded no identity
    #[error("the service confirmed the second factor but sent no identity")]
    MissingIdentity,
}

/// One in-progress device verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFlow {
    step: Step,
    session: SessionHandle,
    challenge: ChallengeState,
    requires_second_factor: bool,
    remember_device: bool,
    email_code: CodeBuffer,
    totp: CodeBuffer,
    backup_code: String,
    uses_backup_code: bool,
    pending: Option<PendingStep>,
}

impl VerificationFlow {
    /// A fresh flow in the email-code step with nothing issued and all
    /// buffers empty.
    ///
    /// `second_factor_hint` pre-populates the second-factor expectation
    /// for display when the caller already knows the account has 2FA
    /// enabled. It is a hint only: the transition into the 2fa step is
    /// decided solely by the email-code verification response.
    pub fn new(second_factor_hint: bool) -> Self {
        Self {
            step: Step::EmailCode,
            session: SessionHandle::Unknown,
            challenge: ChallengeState::Unissued,
            requires_second_factor: second_factor_hint,
            remember_device: false,
            email_code: CodeBuffer::new(),
            totp: CodeBuffer::new(),
            backup_code: String::new(),
            uses_backup_code: false,
            pending: None,
        }
    }

    /// Current position in the verification sequence
    pub fn step(&self) -> Step {
        self.step
    }

    /// The session identifier as far as this client knows it
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Progress of the implicit email challenge
    pub fn challenge(&self) -> ChallengeState {
        self.challenge
    }

    /// Whether a second factor is (expected to be) required
    pub fn requires_second_factor(&self) -> bool {
        self.requires_second_factor
    }

    /// Whether the service will be asked to remember this device
    pub fn remember_device(&self) -> bool {
        self.remember_device
    }

    /// Opt in or out of the service remembering this device
    pub fn set_remember_device(&mut self, remember: bool) {
        self.remember_device = remember;
    }

    /// The emailed-code entry buffer
    pub fn email_code(&self) -> &CodeBuffer {
        &self.email_code
    }

    /// Edit the emailed-code entry buffer
    pub fn email_code_mut(&mut self) -> &mut CodeBuffer {
        &mut self.email_code
    }

    /// The authenticator-code entry buffer
    pub fn totp(&self) -> &CodeBuffer {
        &self.totp
    }

    /// Edit the authenticator-code entry buffer
    pub fn totp_mut(&mut self) -> &mut CodeBuffer {
        &mut self.totp
    }

    /// The backup-code field as entered
    pub fn backup_code(&self) -> &str {
        &self.backup_code
    }

    /// Replace the backup-code field
    pub fn set_backup_code(&mut self, code: impl Into<String>) {
        self.backup_code = code.into();
    }

    /// Whether the backup-code field is the active submission source
    pub fn uses_backup_code(&self) -> bool {
        self.uses_backup_code
    }

    /// Select which second-factor input is the submission source.
    /// Both inputs keep their contents across toggles; exactly one is
    /// consulted at submission time.
    pub fn use_backup_code(&mut self, enabled: bool) {
        self.uses_backup_code = enabled;
    }

    /// Whether a verification request for the current step is in flight
    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    /// Start the one implicit challenge issuance for this activation.
    ///
    /// Allowed exactly once: only in the email-code step, and only while
    /// nothing has been issued. On acceptance report back through
    /// [`VerificationFlow::challenge_issued`]; on failure through
    /// [`VerificationFlow::challenge_failed`], which re-arms the guard
    /// so the issuance can be retried.
    pub fn begin_challenge(&mut self) -> Result<(), TransitionError> {
        self.expect_step(Step::EmailCode)?;
        match self.challenge {
            ChallengeState::Pending => Err(TransitionError::ChallengePending),
            ChallengeState::Issued => Err(TransitionError::ChallengeAlreadyIssued),
            ChallengeState::Unissued => {
                self.challenge = ChallengeState::Pending;
                Ok(())
            }
        }
    }

    /// Start a user-requested re-send of the challenge email.
    ///
    /// Unlike [`VerificationFlow::begin_challenge`] this requires that a
    /// challenge was already issued, and a failure rolls back to
    /// [`ChallengeState::Issued`] (the first email did go out). Entered
    /// digits are untouched.
    pub fn begin_resend(&mut self) -> Result<(), TransitionError> {
        self.expect_step(Step::EmailCode)?;
        match self.challenge {
            ChallengeState::Pending => Err(TransitionError::ChallengePending),
            ChallengeState::Unissued => Err(TransitionError::ChallengeNotIssued),
            ChallengeState::Issued => {
                self.challenge = ChallengeState::Pending;
                Ok(())
            }
        }
    }

    /// The service accepted an issuance (initial or re-sent). Adopts the
    /// session identifier when the response carried one. No-op unless an
    /// issuance is actually in flight, so a stale report cannot corrupt
    /// a later activation.
    pub fn challenge_issued(&mut self, session_id: Option<String>) {
        if self.challenge == ChallengeState::Pending {
            self.challenge = ChallengeState::Issued;
            self.session.adopt(session_id);
        }
    }

    /// The initial issuance failed: return to unissued so it can be
    /// retried. No-op unless an issuance is in flight.
    pub fn challenge_failed(&mut self) {
        if self.challenge == ChallengeState::Pending {
            self.challenge = ChallengeState::Unissued;
        }
    }

    /// A re-send failed: the original challenge stays issued. No-op
    /// unless an issuance is in flight.
    pub fn resend_failed(&mut self) {
        if self.challenge == ChallengeState::Pending {
            self.challenge = ChallengeState::Issued;
        }
    }

    /// Start an email-code verification.
    ///
    /// Refused while the buffer is not fully populated or while another
    /// verification for this step is in flight. On success the complete
    /// code to submit is returned and further submissions are blocked
    /// until one of [`VerificationFlow::resolve_code_response`] or
    /// [`VerificationFlow::submission_failed`] concludes the attempt.
    pub fn begin_code_submission(&mut self) -> Result<DigitCode, TransitionError> {
        self.expect_step(Step::EmailCode)?;
        if self.pending.is_some() {
            return Err(TransitionError::SubmissionPending);
        }
        let code = self
            .email_code
            .complete()
            .ok_or(TransitionError::IncompleteCode)?;
        self.pending = Some(PendingStep::EmailCode);
        Ok(code)
    }

    /// Apply a successful email-code verification response.
    ///
    /// A second-factor requirement advances the flow to the 2fa step;
    /// otherwise the embedded identity concludes it. A response carrying
    /// neither signal concludes the attempt but advances nothing, so the
    /// user can try again.
    pub fn resolve_code_response(
        &mut self,
        response: VerifyCodeResponse,
    ) -> Result<CodeOutcome, TransitionError> {
        if self.pending != Some(PendingStep::EmailCode) {
            return Err(TransitionError::NoPendingSubmission);
        }
        self.pending = None;
        self.session.adopt(response.session_id);

        if response.requires_2fa.unwrap_or(false) {
            self.requires_second_factor = true;
            self.step = Step::TwoFactor;
            Ok(CodeOutcome::SecondFactorRequired)
        } else if let Some(identity) = response.data {
            self.step = Step::Complete;
            Ok(CodeOutcome::Verified(identity))
        } else {
            Err(TransitionError::MissingOutcome)
        }
    }

    /// Start a second-factor verification.
    ///
    /// Builds the credential from whichever input mode is active: the
    /// authenticator buffer must be fully populated, or the backup-code
    /// field must be non-empty after trimming. Refused while another
    /// verification for this step is in flight.
    pub fn begin_second_factor_submission(&mut self) -> Result<SecondFactor, TransitionError> {
        self.expect_step(Step::TwoFactor)?;
        if self.pending.is_some() {
            return Err(TransitionError::SubmissionPending);
        }
        let factor = if self.uses_backup_code {
            let code: BackupCode = self
                .backup_code
                .parse()
                .map_err(|_| TransitionError::EmptyBackupCode)?;
            SecondFactor::BackupCode(code.into_string())
        } else {
            let code = self.totp.complete().ok_or(TransitionError::IncompleteCode)?;
            SecondFactor::TwoFactorToken(code.into_string())
        };
        self.pending = Some(PendingStep::SecondFactor);
        Ok(factor)
    }

    /// Apply a successful second-factor verification response. This is
    /// the final step, so the embedded identity must be present.
    pub fn resolve_second_factor_response(
        &mut self,
        response: VerifyTwoFactorResponse,
    ) -> Result<Identity, TransitionError> {
        if self.pending != Some(PendingStep::SecondFactor) {
            return Err(TransitionError::NoPendingSubmission);
        }
        self.pending = None;

        match response.data {
            Some(identity) => {
                self.step = Step::Complete;
                Ok(identity)
            }
            None => Err(TransitionError::MissingIdentity),
        }
    }

    /// A step verification was rejected or failed in transit. Concludes
    /// the pending attempt; the step and the entered credential are left
    /// untouched so the user can correct a typo and resubmit.
    pub fn submission_failed(&mut self) {
        self.pending = None;
    }

    fn expect_step(&self, expected: Step) -> Result<(), TransitionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(TransitionError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            phone_verified: None,
            recovery_email_verified: None,
        }
    }

    fn code_response(requires_2fa: Option<bool>, session_id: Option<&str>) -> VerifyCodeResponse {
        VerifyCodeResponse {
            requires_2fa,
            session_id: session_id.map(str::to_string),
            data: None,
        }
    }

    /// Drives a fresh flow to the 2fa step.
    fn flow_in_two_factor() -> VerificationFlow {
        let mut flow = VerificationFlow::new(false);
        flow.begin_challenge().unwrap();
        flow.challenge_issued(Some("s1".to_string()));
        flow.email_code_mut().fill_from_str("123456");
        flow.begin_code_submission().unwrap();
        let outcome = flow
            .resolve_code_response(code_response(Some(true), Some("s1")))
            .unwrap();
        assert_eq!(outcome, CodeOutcome::SecondFactorRequired);
        flow
    }

    #[test_log::test]
    fn test_fresh_flow_shape() {
        let flow = VerificationFlow::new(false);
        assert_eq!(flow.step(), Step::EmailCode);
        assert_eq!(flow.challenge(), ChallengeState::Unissued);
        assert_eq!(flow.session(), &SessionHandle::Unknown);
        assert!(!flow.requires_second_factor());
        assert!(flow.email_code().is_empty());
        assert!(flow.totp().is_empty());
        assert_eq!(flow.backup_code(), "");
        assert!(!flow.uses_backup_code());
        assert!(!flow.is_submitting());
    }

    #[test_log::test]
    fn test_second_factor_hint_is_display_only() {
        let flow = VerificationFlow::new(true);
        assert!(flow.requires_second_factor());
        // The hint never moves the machine past the email-code step.
        assert_eq!(flow.step(), Step::EmailCode);
    }

    #[test_log::test]
    fn test_challenge_is_single_shot() {
        let mut flow = VerificationFlow::new(false);

        flow.begin_challenge().unwrap();
        assert_eq!(flow.challenge(), ChallengeState::Pending);
        assert_matches!(
            flow.begin_challenge(),
            Err(TransitionError::ChallengePending)
        );

        flow.challenge_issued(Some("s1".to_string()));
        assert_eq!(flow.challenge(), ChallengeState::Issued);
        assert_eq!(flow.session().known(), Some("s1"));
        assert_matches!(
            flow.begin_challenge(),
            Err(TransitionError::ChallengeAlreadyIssued)
        );
    }

    #[test_log::test]
    fn test_failed_challenge_can_be_retried() {
        let mut flow = VerificationFlow::new(false);

        flow.begin_challenge().unwrap();
        flow.challenge_failed();
        assert_eq!(flow.challenge(), ChallengeState::Unissued);
        assert_eq!(flow.session(), &SessionHandle::Unknown);

        flow.begin_challenge().unwrap();
        flow.challenge_issued(None);
        assert_eq!(flow.challenge(), ChallengeState::Issued);
        assert_eq!(flow.session(), &SessionHandle::Unknown);
    }

    #[test_log::test]
    fn test_resend_requires_an_issued_challenge() {
        let mut flow = VerificationFlow::new(false);
        assert_matches!(flow.begin_resend(), Err(TransitionError::ChallengeNotIssued));

        flow.begin_challenge().unwrap();
        flow.challenge_issued(Some("s1".to_string()));
        flow.email_code_mut().fill_from_str("12");

        flow.begin_resend().unwrap();
        assert_eq!(flow.challenge(), ChallengeState::Pending);
        // Entered digits survive a re-send.
        assert_eq!(flow.email_code().digits(), "12");

        flow.challenge_issued(Some("s2".to_string()));
        // The newest session identifier wins.
        assert_eq!(flow.session().known(), Some("s2"));
    }

    #[test_log::test]
    fn test_failed_resend_keeps_challenge_issued() {
        let mut flow = VerificationFlow::new(false);
        flow.begin_challenge().unwrap();
        flow.challenge_issued(Some("s1".to_string()));

        flow.begin_resend().unwrap();
        flow.resend_failed();
        assert_eq!(flow.challenge(), ChallengeState::Issued);
        assert_eq!(flow.session().known(), Some("s1"));
        assert_matches!(
            flow.begin_challenge(),
            Err(TransitionError::ChallengeAlreadyIssued)
        );
    }

    #[test_log::test]
    fn test_code_submission_requires_full_buffer() {
        let mut flow = VerificationFlow::new(false);
        flow.email_code_mut().fill_from_str("1234");

        assert_matches!(
            flow.begin_code_submission(),
            Err(TransitionError::IncompleteCode)
        );
        assert!(!flow.is_submitting());

        flow.email_code_mut().fill_from_str("56");
        let code = flow.begin_code_submission().unwrap();
        assert_eq!(code.as_str(), "123456");
        assert!(flow.is_submitting());
    }

    #[test_log::test]
    fn test_no_double_submit_while_pending() {
        let mut flow = VerificationFlow::new(false);
        flow.email_code_mut().fill_from_str("123456");
        flow.begin_code_submission().unwrap();

        assert_matches!(
            flow.begin_code_submission(),
            Err(TransitionError::SubmissionPending)
        );
    }

    #[test_log::test]
    fn test_code_success_without_second_factor_completes() {
        let mut flow = VerificationFlow::new(false);
        flow.email_code_mut().fill_from_str("123456");
        flow.begin_code_submission().unwrap();

        let response = VerifyCodeResponse {
            requires_2fa: None,
            session_id: None,
            data: Some(identity()),
        };
        let outcome = flow.resolve_code_response(response).unwrap();

        assert_eq!(outcome, CodeOutcome::Verified(identity()));
        assert_eq!(flow.step(), Step::Complete);
    }

    #[test_log::test]
    fn test_code_success_with_second_factor_advances() {
        let flow = flow_in_two_factor();
        assert_eq!(flow.step(), Step::TwoFactor);
        assert!(flow.requires_second_factor());
        assert_eq!(flow.session().known(), Some("s1"));
    }

    #[test_log::test]
    fn test_no_path_back_from_two_factor() {
        let mut flow = flow_in_two_factor();

        assert_matches!(
            flow.begin_code_submission(),
            Err(TransitionError::WrongStep {
                expected: Step::EmailCode,
                actual: Step::TwoFactor,
            })
        );
        assert_matches!(flow.begin_challenge(), Err(TransitionError::WrongStep { .. }));
    }

    #[test_log::test]
    fn test_complete_is_terminal() {
        let mut flow = flow_in_two_factor();
        flow.totp_mut().fill_from_str("000000");
        flow.begin_second_factor_submission().unwrap();
        flow.resolve_second_factor_response(VerifyTwoFactorResponse {
            data: Some(identity()),
        })
        .unwrap();
        assert_eq!(flow.step(), Step::Complete);

        assert_matches!(
            flow.begin_second_factor_submission(),
            Err(TransitionError::WrongStep { .. })
        );
        assert_matches!(flow.begin_challenge(), Err(TransitionError::WrongStep { .. }));
        assert_matches!(flow.begin_resend(), Err(TransitionError::WrongStep { .. }));
    }

    #[test_log::test]
    fn test_outcomeless_response_concludes_attempt_without_advancing() {
        let mut flow = VerificationFlow::new(false);
        flow.email_code_mut().fill_from_str("123456");
        flow.begin_code_submission().unwrap();

        let result = flow.resolve_code_response(code_response(Some(false), Some("s1")));
        assert_matches!(result, Err(TransitionError::MissingOutcome));

        assert_eq!(flow.step(), Step::EmailCode);
        assert!(!flow.is_submitting());
        // The identifier from the response is still adopted.
        assert_eq!(flow.session().known(), Some("s1"));
        // And the user can immediately try again.
        assert_matches!(flow.begin_code_submission(), Ok(_));
    }

    #[test_log::test]
    fn test_rejected_code_keeps_buffer_for_correction() {
        let mut flow = VerificationFlow::new(false);
        flow.email_code_mut().fill_from_str("123456");
        flow.begin_code_submission().unwrap();

        flow.submission_failed();

        assert_eq!(flow.step(), Step::EmailCode);
        assert_eq!(flow.email_code().digits(), "123456");
        assert!(!flow.is_submitting());
    }

    #[test_log::test]
    fn test_second_factor_uses_active_input_mode() {
        let mut flow = flow_in_two_factor();

        // Authenticator mode by default; the buffer must be complete.
        assert_matches!(
            flow.begin_second_factor_submission(),
            Err(TransitionError::IncompleteCode)
        );
        flow.totp_mut().fill_from_str("000000");
        let factor = flow.begin_second_factor_submission().unwrap();
        assert_eq!(factor, SecondFactor::TwoFactorToken("000000".to_string()));
        flow.submission_failed();

        // Switching modes leaves both inputs intact and consults only
        // the backup-code field.
        flow.use_backup_code(true);
        assert_matches!(
            flow.begin_second_factor_submission(),
            Err(TransitionError::EmptyBackupCode)
        );
        flow.set_backup_code("  RESCUE-1234 ");
        let factor = flow.begin_second_factor_submission().unwrap();
        assert_eq!(factor, SecondFactor::BackupCode("RESCUE-1234".to_string()));
        flow.submission_failed();

        flow.use_backup_code(false);
        assert_eq!(flow.totp().digits(), "000000");
        let factor = flow.begin_second_factor_submission().unwrap();
        assert_eq!(factor, SecondFactor::TwoFactorToken("000000".to_string()));
    }

    #[test_log::test]
    fn test_blank_backup_code_never_starts_a_submission() {
        let mut flow = flow_in_two_factor();
        flow.use_backup_code(true);
        flow.set_backup_code("   ");

        assert_matches!(
            flow.begin_second_factor_submission(),
            Err(TransitionError::EmptyBackupCode)
        );
        assert!(!flow.is_submitting());
    }

    #[test_log::test]
    fn test_rejected_second_factor_stays_in_two_factor() {
        let mut flow = flow_in_two_factor();
        flow.totp_mut().fill_from_str("000000");
        flow.begin_second_factor_submission().unwrap();

        flow.submission_failed();

        assert_eq!(flow.step(), Step::TwoFactor);
        assert_eq!(flow.totp().digits(), "000000");
        assert_matches!(flow.begin_second_factor_submission(), Ok(_));
    }

    #[test_log::test]
    fn test_second_factor_response_must_carry_identity() {
        let mut flow = flow_in_two_factor();
        flow.totp_mut().fill_from_str("000000");
        flow.begin_second_factor_submission().unwrap();

        let result = flow.resolve_second_factor_response(VerifyTwoFactorResponse { data: None });
        assert_matches!(result, Err(TransitionError::MissingIdentity));
        assert_eq!(flow.step(), Step::TwoFactor);
    }

    #[test_log::test]
    fn test_stale_reports_are_ignored() {
        let mut flow = VerificationFlow::new(false);

        // Completion reports without a matching begin_* are dropped.
        flow.challenge_issued(Some("s9".to_string()));
        assert_eq!(flow.challenge(), ChallengeState::Unissued);
        assert_eq!(flow.session(), &SessionHandle::Unknown);

        assert_matches!(
            flow.resolve_code_response(code_response(Some(true), None)),
            Err(TransitionError::NoPendingSubmission)
        );
        assert_eq!(flow.step(), Step::EmailCode);
    }

    #[test_log::test]
    fn test_reset_means_building_a_new_flow() {
        let mut used = flow_in_two_factor();
        used.totp_mut().fill_from_str("99");
        used.set_remember_device(true);

        // Deactivation destroys the flow; reactivation constructs a new
        // one, indistinguishable from any other fresh flow.
        let fresh = VerificationFlow::new(false);
        assert_eq!(fresh, VerificationFlow::new(false));
        assert_ne!(used, fresh);
        assert_eq!(fresh.step(), Step::EmailCode);
        assert_eq!(fresh.challenge(), ChallengeState::Unissued);
    }
}
