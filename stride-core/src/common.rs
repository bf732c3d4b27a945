//! Request and response data types shared between stride clients and the auth service

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Challenge request struct (for issuing the device verification email)
#[derive(Deserialize, Serialize, Validate, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// The email address of the account being signed in to
    #[validate(email)]
    pub email: String,
    /// The password that already passed the primary login check
    pub password: String,
}

/// Response to a challenge request
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    /// Verification session identifier, if the service assigns one this early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Request struct for verifying the emailed device code
#[derive(Deserialize, Serialize, Validate, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    /// The email address of the account being signed in to
    #[validate(email)]
    pub email: String,
    /// The password that already passed the primary login check
    pub password: String,
    /// The 6-digit code the user received by email
    pub code: String,
    /// Verification session identifier, once any response has supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Asks the service to skip device verification for this device in the future
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_device: Option<bool>,
}

/// Response to an email-code verification attempt
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    /// Set when the account still needs a second factor before a session is issued
    #[serde(
        rename = "requires2FA",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_2fa: Option<bool>,
    /// Verification session identifier, if (re)assigned by this response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The authenticated identity, when this step completed the login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Identity>,
}

/// The second-factor credential attached to a 2FA verification attempt.
///
/// Serializes as a single `twoFactorToken` or `backupCode` field, so a
/// request can never carry both.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SecondFactor {
    /// A 6-digit code from the authenticator app
    TwoFactorToken(String),
    /// A single-use backup code
    BackupCode(String),
}

/// Request struct for verifying the second factor
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorRequest {
    /// The email address of the account being signed in to
    pub email: String,
    /// Verification session identifier
    pub session_id: String,
    /// The credential for this attempt
    #[serde(flatten)]
    pub second_factor: SecondFactor,
}

/// Response to a second-factor verification attempt
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorResponse {
    /// The authenticated identity; present whenever the attempt succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Identity>,
}

/// Envelope around the canonical identity record (`GET /auth/me`)
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct IdentityResponse {
    /// The authenticated identity
    pub data: Identity,
}

/// An authenticated user identity as the service reports it
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Primary email address
    pub email: String,
    /// Whether a phone number is verified for the account.
    /// Passed through unchanged; the verification flow does not interpret it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_verified: Option<bool>,
    /// Whether a recovery email is verified for the account.
    /// Passed through unchanged; the verification flow does not interpret it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_email_verified: Option<bool>,
}

/// Facts about the device a sign-in originates from.
///
/// Supplied by whoever activates the verification flow and used purely
/// for display; none of these fields affect protocol transitions.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device category, e.g. "desktop"
    pub device_type: String,
    /// Device or host name
    pub device_name: String,
    /// Browser or client software
    pub browser_name: String,
    /// Operating system name
    pub operating_system: String,
    /// Coarse location, when resolvable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} on {})",
            self.device_name, self.browser_name, self.operating_system
        )?;
        if let Some(location) = &self.location {
            write!(f, " near {}, {}", location.city, location.country)?;
        }
        Ok(())
    }
}

/// Coarse location attached to [`DeviceInfo`]
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Country name
    pub country: String,
    /// City name
    pub city: String,
    /// Region or state name
    pub region: String,
}
