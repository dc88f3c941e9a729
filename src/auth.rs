//! Grower registration and OTP verification.
//!
//! Forms are validated locally first; nothing is sent until every field
//! passes. Server rejections surface the server's own `message` verbatim.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::config::SERVICE_TIMEOUT;
use crate::http::{build_client, extract_server_message, map_send_error, ServiceError};
use crate::models::{UserAddress, UserProfile};
use crate::session_store::{SessionStore, StoreError};

pub const INCOMPLETE_FORM: &str = "Please complete all required fields correctly.";
pub const REGISTERED: &str = "You have registered successfully.";
pub const REGISTER_FAILED: &str = "Failed to register user.";
pub const SUBMIT_FAILED: &str = "An error occurred while saving your data.";
pub const INVALID_OTP: &str = "Enter a valid 6-digit OTP.";
pub const OTP_FAILED: &str = "Failed to verify OTP.";

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("valid regex"));
static OTP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("valid regex"));

/// Field name (as the form knows it) → error text.
pub type FieldErrors = BTreeMap<&'static str, &'static str>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please complete all required fields correctly.")]
    Invalid(FieldErrors),

    /// Server said no; carries its message or the screen's fallback.
    #[error("{0}")]
    Rejected(String),

    /// Request never got a verdict.
    #[error("{message}")]
    Unreachable {
        message: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Registration or OTP failure as the form renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailure {
    pub message: String,
    /// Per-field messages when local validation rejected the form.
    pub field_errors: FieldErrors,
}

impl From<AuthError> for AuthFailure {
    fn from(err: AuthError) -> Self {
        Self {
            message: err.to_string(),
            field_errors: err.field_errors().cloned().unwrap_or_default(),
        }
    }
}

/// Check the registration form. Empty map means valid.
pub fn validate_registration(profile: &UserProfile) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let loc = &profile.location;

    if profile.name.trim().is_empty() {
        errors.insert("name", "Name is required.");
    }
    if !PHONE_RE.is_match(&profile.phone_number) {
        errors.insert("phoneNumber", "Enter a valid 10-digit phone number.");
    }
    if loc.street.trim().is_empty() {
        errors.insert("street", "Street is required.");
    }
    if loc.city.trim().is_empty() {
        errors.insert("city", "City is required.");
    }
    if loc.country.trim().is_empty() {
        errors.insert("country", "Country is required.");
    }
    if loc.postal_code.trim().is_empty() {
        errors.insert("postalCode", "Postal Code is required.");
    }
    if loc.coordinates.latitude == 0.0 || loc.coordinates.longitude == 0.0 {
        errors.insert(
            "coordinates",
            "Invalid coordinates. Please ensure location is correct.",
        );
    }
    errors
}

pub fn validate_otp(otp: &str) -> Result<(), AuthError> {
    if OTP_RE.is_match(otp) {
        Ok(())
    } else {
        Err(AuthError::Invalid(FieldErrors::from([("otp", INVALID_OTP)])))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    name: &'a str,
    phone_number: &'a str,
    location: &'a UserAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    phone_number: &'a str,
    otp: &'a str,
}

pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(SERVICE_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: SERVICE_TIMEOUT,
        })
    }

    /// Validate, register, then persist the profile under `user`.
    pub async fn register(
        &self,
        store: &SessionStore,
        mut profile: UserProfile,
    ) -> Result<UserProfile, AuthError> {
        let errors = validate_registration(&profile);
        if !errors.is_empty() {
            tracing::info!(fields = ?errors.keys().collect::<Vec<_>>(), "Registration form rejected");
            return Err(AuthError::Invalid(errors));
        }

        let body = RegisterBody {
            name: &profile.name,
            phone_number: &profile.phone_number,
            location: &profile.location,
        };
        self.post("/api/auth/register", &body)
            .await
            .map_err(|e| classify(e, REGISTER_FAILED, SUBMIT_FAILED))?;

        profile.is_verified = false;
        store.save_user(&profile)?;
        tracing::info!("User registered");
        Ok(profile)
    }

    /// Verify the OTP and flag the stored user as verified.
    pub async fn verify_otp(
        &self,
        store: &SessionStore,
        phone_number: &str,
        otp: &str,
    ) -> Result<(), AuthError> {
        validate_otp(otp)?;

        self.post("/api/auth/verify-otp", &VerifyBody { phone_number, otp })
            .await
            .map_err(|e| classify(e, OTP_FAILED, OTP_FAILED))?;

        if !store.mark_verified()? {
            tracing::warn!("OTP verified but no stored user to flag");
        }
        Ok(())
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ServiceError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(ServiceError::Server {
            status: status.as_u16(),
            message: extract_server_message(&text),
        })
    }
}

fn classify(err: ServiceError, rejected: &str, unreachable: &'static str) -> AuthError {
    tracing::warn!(error = %err, "Auth request failed");
    match err {
        ServiceError::Server { message, .. } => {
            AuthError::Rejected(message.unwrap_or_else(|| rejected.to_string()))
        }
        source => AuthError::Unreachable {
            message: unreachable,
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::test_support::{dead_url, spawn_server};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn form() -> UserProfile {
        UserProfile {
            name: "Anika Borah".into(),
            phone_number: "9876543210".into(),
            location: UserAddress {
                street: "Cinnamara Tea Estate".into(),
                city: "Jorhat".into(),
                state: "Assam".into(),
                country: "India".into(),
                postal_code: "785008".into(),
                coordinates: Coordinates {
                    latitude: 26.75,
                    longitude: 94.21,
                },
            },
            is_verified: false,
        }
    }

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("storage.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn valid_form_has_no_errors() {
        assert!(validate_registration(&form()).is_empty());
    }

    #[test]
    fn bad_fields_are_reported() {
        let mut profile = form();
        profile.name = "  ".into();
        profile.phone_number = "98765-4321".into();
        profile.location.postal_code.clear();
        profile.location.coordinates.longitude = 0.0;

        let errors = validate_registration(&profile);
        assert_eq!(
            errors.keys().copied().collect::<Vec<_>>(),
            ["coordinates", "name", "phoneNumber", "postalCode"]
        );
        assert_eq!(errors["phoneNumber"], "Enter a valid 10-digit phone number.");
    }

    #[test]
    fn state_is_optional() {
        let mut profile = form();
        profile.location.state.clear();
        assert!(validate_registration(&profile).is_empty());
    }

    #[test]
    fn phone_must_be_ascii_digits() {
        let mut profile = form();
        profile.phone_number = "९८७६५४३२१०".into();
        assert!(validate_registration(&profile).contains_key("phoneNumber"));
    }

    #[test]
    fn otp_format() {
        assert!(validate_otp("123456").is_ok());
        for bad in ["12345", "1234567", "12a456", ""] {
            let err = validate_otp(bad).unwrap_err();
            assert_eq!(err.field_errors().unwrap()["otp"], INVALID_OTP);
        }
    }

    #[test]
    fn failure_payload_carries_field_errors() {
        let mut profile = form();
        profile.phone_number = "123".into();
        let failure = AuthFailure::from(AuthError::Invalid(validate_registration(&profile)));
        assert_eq!(failure.message, INCOMPLETE_FORM);
        assert!(failure.field_errors.contains_key("phoneNumber"));

        let json = serde_json::to_value(&failure).unwrap();
        assert!(json["fieldErrors"]["phoneNumber"].is_string());

        let rejected = AuthFailure::from(AuthError::Rejected("Phone already registered".into()));
        assert_eq!(rejected.message, "Phone already registered");
        assert!(rejected.field_errors.is_empty());
    }

    #[tokio::test]
    async fn invalid_form_sends_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/api/auth/register",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({}))
                }
            }),
        );
        let client = AuthClient::new(&spawn_server(app).await).unwrap();
        let (_dir, store) = store();

        let mut profile = form();
        profile.phone_number = "12345".into();
        let err = client.register(&store, profile).await.unwrap_err();

        assert_eq!(err.to_string(), INCOMPLETE_FORM);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn register_posts_camel_case_and_persists() {
        let app = Router::new().route(
            "/api/auth/register",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["phoneNumber"], "9876543210");
                assert_eq!(body["location"]["postalCode"], "785008");
                assert_eq!(body["location"]["coordinates"]["latitude"], 26.75);
                assert!(body.get("isVerified").is_none());
                (StatusCode::CREATED, Json(json!({"message": "OTP sent"})))
            }),
        );
        let client = AuthClient::new(&spawn_server(app).await).unwrap();
        let (_dir, store) = store();

        client.register(&store, form()).await.unwrap();
        assert_eq!(store.user().unwrap().phone_number, "9876543210");
    }

    #[tokio::test]
    async fn conflict_shows_server_message_verbatim() {
        let app = Router::new().route(
            "/api/auth/register",
            post(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({"message": "Phone already registered"})),
                )
            }),
        );
        let client = AuthClient::new(&spawn_server(app).await).unwrap();
        let (_dir, store) = store();

        let err = client.register(&store, form()).await.unwrap_err();
        assert_eq!(err.to_string(), "Phone already registered");
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn rejection_without_message_uses_fallback() {
        let app = Router::new().route(
            "/api/auth/register",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let client = AuthClient::new(&spawn_server(app).await).unwrap();
        let (_dir, store) = store();

        let err = client.register(&store, form()).await.unwrap_err();
        assert_eq!(err.to_string(), REGISTER_FAILED);
    }

    #[tokio::test]
    async fn unreachable_backend_uses_submit_fallback() {
        let client = AuthClient::new(&dead_url().await).unwrap();
        let (_dir, store) = store();
        let err = client.register(&store, form()).await.unwrap_err();
        assert_eq!(err.to_string(), SUBMIT_FAILED);
    }

    #[tokio::test]
    async fn verified_otp_flags_stored_user() {
        let app = Router::new().route(
            "/api/auth/verify-otp",
            post(|Json(body): Json<Value>| async move {
                if body["otp"] == "482913" && body["phoneNumber"] == "9876543210" {
                    (StatusCode::OK, Json(json!({"verified": true})))
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({"message": "Invalid OTP"})))
                }
            }),
        );
        let client = AuthClient::new(&spawn_server(app).await).unwrap();
        let (_dir, store) = store();
        store.save_user(&form()).unwrap();

        let err = client
            .verify_otp(&store, "9876543210", "000000")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid OTP");
        assert!(!store.user().unwrap().is_verified);

        client
            .verify_otp(&store, "9876543210", "482913")
            .await
            .unwrap();
        assert!(store.user().unwrap().is_verified);
    }
}
