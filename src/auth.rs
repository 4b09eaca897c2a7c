use crate::errors::ApiError;
use crate::models::{AuthPayload, LoginResponse, Person};
use crate::store::EntityStore;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Verification codes live for five minutes.
const CODE_TTL_MINUTES: i64 = 5;
/// A pending code tolerates at most five confirmation attempts.
const MAX_CODE_ATTEMPTS: u32 = 5;
/// Session tokens expire after one hour.
const TOKEN_TTL_HOURS: i64 = 1;

/// Why a request could not be tied to an identity. Each cause is kept
/// distinct because downstream authorization messages depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No Authorization header was sent.
    MissingHeader,
    /// Header present but not a Bearer scheme.
    MalformedScheme,
    /// Signature verification or decoding failed.
    InvalidToken,
    /// Token was valid once but is past its expiry.
    TokenExpired,
    /// Token decoded but its payload carries no subject.
    SubjectMissing,
    /// Subject id no longer matches any person in the store.
    PersonNotFound,
}

impl AuthFailure {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "missing_header",
            AuthFailure::MalformedScheme => "malformed_authorization",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::TokenExpired => "token_expired",
            AuthFailure::SubjectMissing => "payload_missing_subject",
            AuthFailure::PersonNotFound => "person_not_found",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthFailure::MissingHeader => "Not authenticated",
            AuthFailure::MalformedScheme => "Authorization header must use 'Bearer'",
            AuthFailure::InvalidToken => "Invalid token",
            AuthFailure::TokenExpired => "Token expired",
            AuthFailure::SubjectMissing => "Token payload missing subject",
            AuthFailure::PersonNotFound => "User not found",
        };
        write!(f, "{}", msg)
    }
}

/// JWT claims carried by session tokens. `sub` is optional so that a token
/// whose payload lacks a subject can be told apart from one that fails to
/// decode at all.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

/// Phone-code authentication: code issuance, bounded confirmation, session
/// token minting, and per-request identity resolution.
///
/// Pending codes are global mutable state with a bounded lifetime; the map
/// lock is held across the whole confirm step so concurrent attempts for the
/// same phone serialize and the attempt cap stays exact.
pub struct AuthService {
    store: Arc<EntityStore>,
    secret: String,
    admin_phones: Vec<String>,
    log_auth: bool,
    codes: Mutex<HashMap<String, PendingCode>>,
}

impl AuthService {
    pub fn new(
        store: Arc<EntityStore>,
        secret: String,
        admin_phones: Vec<String>,
        log_auth: bool,
    ) -> Self {
        Self {
            store,
            secret,
            admin_phones,
            log_auth,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a login by issuing a 6-digit code for `phone`. A new request
    /// overwrites any prior pending code for the same phone. In production
    /// the code would go out via SMS; here it is echoed in the response.
    pub fn request_login(&self, phone: &str) -> Result<LoginResponse, ApiError> {
        self.request_login_at(phone, Utc::now())
    }

    fn request_login_at(&self, phone: &str, now: DateTime<Utc>) -> Result<LoginResponse, ApiError> {
        if self.store.person_by_phone(phone).is_none() {
            return Err(ApiError::UnknownPhone);
        }
        let code = generate_code();
        let mut codes = self.codes.lock().expect("code store lock poisoned");
        codes.insert(
            phone.to_string(),
            PendingCode {
                code: code.clone(),
                expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                attempts: 0,
            },
        );
        tracing::info!(phone, "Login code issued");
        Ok(LoginResponse {
            phone: phone.to_string(),
            message: "Verification code sent (simulated)".to_string(),
            debug_code: code,
        })
    }

    /// Confirms a pending code. On success the code is consumed (single use)
    /// and a signed session token is returned alongside the person.
    pub fn confirm_code(&self, phone: &str, code: &str) -> Result<AuthPayload, ApiError> {
        self.confirm_code_at(phone, code, Utc::now())
    }

    fn confirm_code_at(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthPayload, ApiError> {
        enum Verdict {
            Expired,
            Exhausted,
            Mismatch,
            Matched,
        }

        let mut codes = self.codes.lock().expect("code store lock poisoned");
        let verdict = {
            let entry = codes.get_mut(phone).ok_or(ApiError::NoPendingCode)?;
            if now > entry.expires_at {
                Verdict::Expired
            } else {
                entry.attempts += 1;
                if entry.attempts > MAX_CODE_ATTEMPTS {
                    Verdict::Exhausted
                } else if entry.code != code {
                    Verdict::Mismatch
                } else {
                    Verdict::Matched
                }
            }
        };
        match verdict {
            Verdict::Expired => {
                codes.remove(phone);
                return Err(ApiError::CodeExpired);
            }
            Verdict::Exhausted => {
                codes.remove(phone);
                return Err(ApiError::TooManyAttempts);
            }
            // Record stays; the attempt is already counted.
            Verdict::Mismatch => return Err(ApiError::CodeMismatch),
            Verdict::Matched => {
                codes.remove(phone);
            }
        }
        drop(codes);

        let person = self
            .store
            .person_by_phone(phone)
            .ok_or(ApiError::UnknownPhone)?;
        let token = self.sign_token(person.id, now)?;
        tracing::info!(person_id = person.id, "Login confirmed, session token issued");
        Ok(AuthPayload { token, person })
    }

    fn sign_token(&self, person_id: i64, now: DateTime<Utc>) -> Result<String, ApiError> {
        let claims = Claims {
            sub: Some(person_id),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Resolves the acting identity from an Authorization header value.
    ///
    /// The claim is checked against the live person set, so a token whose
    /// subject has since disappeared resolves to `PersonNotFound`.
    pub fn resolve_identity(&self, header: Option<&str>) -> Result<Person, AuthFailure> {
        let header = header.ok_or(AuthFailure::MissingHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthFailure::MalformedScheme)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            if self.log_auth {
                tracing::warn!("Token verification failed: {}", e);
            }
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
                _ => AuthFailure::InvalidToken,
            }
        })?;

        let person_id = decoded.claims.sub.ok_or(AuthFailure::SubjectMissing)?;
        self.store
            .person_by_id(person_id)
            .ok_or(AuthFailure::PersonNotFound)
    }

    /// Administrative tier: identity's phone is on the configured allow-list.
    pub fn is_admin(&self, person: &Person) -> bool {
        self.admin_phones.iter().any(|p| p == &person.phone)
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANA: &str = "+55 11 90000-0000";

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(EntityStore::seeded()),
            "test-secret".to_string(),
            vec![ANA.to_string()],
            false,
        )
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn unknown_phone_cannot_request_login() {
        let auth = service();
        assert_eq!(
            auth.request_login("+55 99 98888-7777").unwrap_err(),
            ApiError::UnknownPhone
        );
    }

    #[test]
    fn confirm_without_pending_code_fails() {
        let auth = service();
        assert_eq!(
            auth.confirm_code(ANA, "123456").unwrap_err(),
            ApiError::NoPendingCode
        );
    }

    #[test]
    fn code_is_single_use() {
        let auth = service();
        let login = auth.request_login(ANA).unwrap();
        let payload = auth.confirm_code(ANA, &login.debug_code).unwrap();
        assert_eq!(payload.person.id, 1);
        assert!(!payload.token.is_empty());
        // Second confirmation with the same code: record is gone.
        assert_eq!(
            auth.confirm_code(ANA, &login.debug_code).unwrap_err(),
            ApiError::NoPendingCode
        );
    }

    #[test]
    fn wrong_attempts_keep_record_until_cap() {
        let auth = service();
        let login = auth.request_login(ANA).unwrap();
        for _ in 0..2 {
            assert_eq!(
                auth.confirm_code(ANA, "000000").unwrap_err(),
                ApiError::CodeMismatch
            );
        }
        // Still pending after two wrong attempts.
        let payload = auth.confirm_code(ANA, &login.debug_code).unwrap();
        assert_eq!(payload.person.phone, ANA);
    }

    #[test]
    fn sixth_attempt_exhausts_and_deletes_code() {
        let auth = service();
        let login = auth.request_login(ANA).unwrap();
        for _ in 0..5 {
            assert_eq!(
                auth.confirm_code(ANA, "000000").unwrap_err(),
                ApiError::CodeMismatch
            );
        }
        assert_eq!(
            auth.confirm_code(ANA, "000000").unwrap_err(),
            ApiError::TooManyAttempts
        );
        // Record deleted: even the correct code is now useless.
        assert_eq!(
            auth.confirm_code(ANA, &login.debug_code).unwrap_err(),
            ApiError::NoPendingCode
        );
    }

    #[test]
    fn expired_code_is_rejected_and_deleted() {
        let auth = service();
        let now = Utc::now();
        let login = auth.request_login_at(ANA, now).unwrap();
        let late = now + Duration::minutes(CODE_TTL_MINUTES) + Duration::seconds(1);
        assert_eq!(
            auth.confirm_code_at(ANA, &login.debug_code, late).unwrap_err(),
            ApiError::CodeExpired
        );
        assert_eq!(
            auth.confirm_code_at(ANA, &login.debug_code, late).unwrap_err(),
            ApiError::NoPendingCode
        );
    }

    #[test]
    fn new_request_overwrites_pending_code() {
        let auth = service();
        let first = auth.request_login(ANA).unwrap();
        let second = auth.request_login(ANA).unwrap();
        if first.debug_code != second.debug_code {
            assert_eq!(
                auth.confirm_code(ANA, &first.debug_code).unwrap_err(),
                ApiError::CodeMismatch
            );
        }
        assert!(auth.confirm_code(ANA, &second.debug_code).is_ok());
    }

    #[test]
    fn resolve_identity_classifies_each_failure() {
        let auth = service();
        assert_eq!(
            auth.resolve_identity(None).unwrap_err(),
            AuthFailure::MissingHeader
        );
        assert_eq!(
            auth.resolve_identity(Some("Token abc")).unwrap_err(),
            AuthFailure::MalformedScheme
        );
        assert_eq!(
            auth.resolve_identity(Some("Bearer not-a-jwt")).unwrap_err(),
            AuthFailure::InvalidToken
        );
    }

    #[test]
    fn resolve_identity_accepts_fresh_token() {
        let auth = service();
        let token = auth.sign_token(2, Utc::now()).unwrap();
        let person = auth.resolve_identity(Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(person.id, 2);
    }

    #[test]
    fn expired_token_is_distinguished() {
        let auth = service();
        let issued = Utc::now() - Duration::hours(2);
        let token = auth.sign_token(1, issued).unwrap();
        assert_eq!(
            auth.resolve_identity(Some(&format!("Bearer {}", token)))
                .unwrap_err(),
            AuthFailure::TokenExpired
        );
    }

    #[test]
    fn token_missing_subject_is_distinguished() {
        let auth = service();
        let claims = Claims {
            sub: None,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(
            auth.resolve_identity(Some(&format!("Bearer {}", token)))
                .unwrap_err(),
            AuthFailure::SubjectMissing
        );
    }

    #[test]
    fn token_for_missing_person_is_distinguished() {
        let auth = service();
        let token = auth.sign_token(999, Utc::now()).unwrap();
        assert_eq!(
            auth.resolve_identity(Some(&format!("Bearer {}", token)))
                .unwrap_err(),
            AuthFailure::PersonNotFound
        );
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let auth = service();
        let other = AuthService::new(
            Arc::new(EntityStore::seeded()),
            "other-secret".to_string(),
            vec![],
            false,
        );
        let token = other.sign_token(1, Utc::now()).unwrap();
        assert_eq!(
            auth.resolve_identity(Some(&format!("Bearer {}", token)))
                .unwrap_err(),
            AuthFailure::InvalidToken
        );
    }

    #[test]
    fn admin_tier_follows_allow_list() {
        let auth = service();
        let store = EntityStore::seeded();
        let ana = store.person_by_id(1).unwrap();
        let bruno = store.person_by_id(2).unwrap();
        assert!(auth.is_admin(&ana));
        assert!(!auth.is_admin(&bruno));
    }
}
