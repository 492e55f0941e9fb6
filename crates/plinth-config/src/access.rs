//! Role/capability storage and request-forgery tokens.
//!
//! # Design
//! - Roles and user assignments live in one option document so they share the
//!   backend used for settings.
//! - Tokens are HMAC-SHA256 over `tick|action|user`, truncated to 12 bytes and
//!   base64url encoded. A tick is a 12-hour window; the current and previous
//!   windows are accepted.
//! - Capability lookups fail closed: a backend error denies access.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use crate::backend::OptionBackend;
use crate::defaults::{NONCE_SALT_OPTION_NAME, ROLES_OPTION_NAME};
use crate::error::AccessError;

type HmacSha256 = Hmac<Sha256>;

/// Action bound into tokens used by the REST endpoints.
pub const REST_TOKEN_ACTION: &str = "plinth_rest";
/// Length of one token validity window in seconds.
pub const TICK_SECONDS: u64 = 12 * 60 * 60;

const TOKEN_BYTES: usize = 12;
const GENERATED_SECRET_LEN: usize = 64;

/// Capability checks and token verification used by the HTTP layer.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `user` holds `capability` through any of their roles.
    async fn user_has_capability(&self, user: &str, capability: &str) -> bool;

    /// Whether `token` was issued to `user` for `action` and has not expired.
    fn verify_token(&self, user: &str, token: &str, action: &str) -> bool;

    /// Fresh token for `user` and `action`.
    fn issue_token(&self, user: &str, action: &str) -> String;
}

/// Persisted role → capabilities and user → roles mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesDocument {
    /// Capabilities granted to each role.
    #[serde(default)]
    pub roles: BTreeMap<String, BTreeSet<String>>,
    /// Roles assigned to each user.
    #[serde(default)]
    pub users: BTreeMap<String, BTreeSet<String>>,
}

impl RolesDocument {
    /// Whether any role assigned to `user` grants `capability`.
    #[must_use]
    pub fn user_has_capability(&self, user: &str, capability: &str) -> bool {
        self.users.get(user).is_some_and(|roles| {
            roles.iter().any(|role| {
                self.roles
                    .get(role)
                    .is_some_and(|caps| caps.contains(capability))
            })
        })
    }
}

/// Role storage backed by an [`OptionBackend`].
#[derive(Clone)]
pub struct RoleStore {
    backend: Arc<dyn OptionBackend>,
}

impl fmt::Debug for RoleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleStore").finish_non_exhaustive()
    }
}

impl RoleStore {
    /// Role store persisting through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn OptionBackend>) -> Self {
        Self { backend }
    }

    /// Current document. Missing or unreadable documents resolve to empty.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend read fails.
    pub async fn load(&self) -> Result<RolesDocument, AccessError> {
        let stored = self
            .backend
            .get_option(ROLES_OPTION_NAME)
            .await
            .map_err(|source| AccessError::Backend {
                operation: "load_roles",
                source,
            })?;
        Ok(stored.map_or_else(RolesDocument::default, |value| {
            serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(error = %err, "role document unreadable; treating as empty");
                RolesDocument::default()
            })
        }))
    }

    async fn store(&self, document: &RolesDocument) -> Result<(), AccessError> {
        let value = serde_json::to_value(document).map_err(|source| AccessError::Backend {
            operation: "encode_roles",
            source: crate::error::BackendError::Serialize {
                operation: "encode_roles",
                source,
            },
        })?;
        self.backend
            .set_option(ROLES_OPTION_NAME, value)
            .await
            .map_err(|source| AccessError::Backend {
                operation: "store_roles",
                source,
            })?;
        Ok(())
    }

    /// Grant `capability` to `role`, creating the role if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    pub async fn grant_capability(&self, role: &str, capability: &str) -> Result<(), AccessError> {
        let mut document = self.load().await?;
        document
            .roles
            .entry(role.to_string())
            .or_default()
            .insert(capability.to_string());
        self.store(&document).await?;
        info!(role, capability, "capability granted");
        Ok(())
    }

    /// Remove `capability` from every role. Returns how many roles lost it.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    pub async fn revoke_capability_everywhere(
        &self,
        capability: &str,
    ) -> Result<usize, AccessError> {
        let mut document = self.load().await?;
        let revoked = document
            .roles
            .values_mut()
            .map(|caps| caps.remove(capability))
            .filter(|removed| *removed)
            .count();
        if revoked > 0 {
            self.store(&document).await?;
        }
        info!(capability, revoked, "capability revoked");
        Ok(revoked)
    }

    /// Assign `role` to `user`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    pub async fn assign_role(&self, user: &str, role: &str) -> Result<(), AccessError> {
        let mut document = self.load().await?;
        document
            .users
            .entry(user.to_string())
            .or_default()
            .insert(role.to_string());
        self.store(&document).await?;
        info!(user, role, "role assigned");
        Ok(())
    }

    /// Whether `user` holds `capability`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend read fails.
    pub async fn user_has_capability(
        &self,
        user: &str,
        capability: &str,
    ) -> Result<bool, AccessError> {
        Ok(self.load().await?.user_has_capability(user, capability))
    }
}

/// Issues and verifies short-lived per-user tokens.
#[derive(Clone)]
pub struct NonceIssuer {
    mac: HmacSha256,
}

impl fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceIssuer").finish_non_exhaustive()
    }
}

impl NonceIssuer {
    /// Issuer keyed with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::EmptySecret`] for an empty secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AccessError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AccessError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| AccessError::EmptySecret)?;
        Ok(Self { mac })
    }

    /// Issuer keyed with `configured`, or with a secret stored in the backend.
    /// A secret is generated and stored on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or the secret is empty.
    pub async fn from_backend(
        backend: &dyn OptionBackend,
        configured: Option<&str>,
    ) -> Result<Self, AccessError> {
        if let Some(secret) = configured {
            return Self::new(secret);
        }
        let stored = backend
            .get_option(NONCE_SALT_OPTION_NAME)
            .await
            .map_err(|source| AccessError::Backend {
                operation: "load_nonce_salt",
                source,
            })?;
        if let Some(secret) = stored.as_ref().and_then(serde_json::Value::as_str) {
            return Self::new(secret);
        }

        let secret = generate_secret(GENERATED_SECRET_LEN);
        backend
            .set_option(NONCE_SALT_OPTION_NAME, secret.clone().into())
            .await
            .map_err(|source| AccessError::Backend {
                operation: "store_nonce_salt",
                source,
            })?;
        info!("generated token secret");
        Self::new(secret)
    }

    /// Token for `user` and `action` in the current window.
    #[must_use]
    pub fn issue(&self, user: &str, action: &str) -> String {
        self.issue_at(user, action, unix_now())
    }

    /// Token for `user` and `action` as of `now` (seconds since the epoch).
    #[must_use]
    pub fn issue_at(&self, user: &str, action: &str, now: u64) -> String {
        let tag = self.sign(tick_for(now), user, action);
        URL_SAFE_NO_PAD.encode(&tag[..TOKEN_BYTES])
    }

    /// Whether `token` is valid for `user` and `action` now.
    #[must_use]
    pub fn verify(&self, user: &str, action: &str, token: &str) -> bool {
        self.verify_at(user, action, token, unix_now())
    }

    /// Whether `token` is valid for `user` and `action` as of `now`.
    #[must_use]
    pub fn verify_at(&self, user: &str, action: &str, token: &str, now: u64) -> bool {
        let Ok(decoded) = URL_SAFE_NO_PAD.decode(token.trim()) else {
            return false;
        };
        if decoded.len() != TOKEN_BYTES {
            return false;
        }
        let tick = tick_for(now);
        [Some(tick), tick.checked_sub(1)]
            .into_iter()
            .flatten()
            .any(|candidate| {
                let mut mac = self.mac.clone();
                mac.update(message(candidate, user, action).as_bytes());
                mac.verify_truncated_left(&decoded).is_ok()
            })
    }

    fn sign(&self, tick: u64, user: &str, action: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message(tick, user, action).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn message(tick: u64, user: &str, action: &str) -> String {
    format!("{tick}|{action}|{user}")
}

const fn tick_for(now: u64) -> u64 {
    now / TICK_SECONDS
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .as_ref()
        .map_or(0, Duration::as_secs)
}

fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| char::from(rng.sample(Alphanumeric)))
        .take(length)
        .collect()
}

/// [`Authorizer`] combining a [`RoleStore`] with a [`NonceIssuer`].
#[derive(Debug, Clone)]
pub struct OptionAuthorizer {
    roles: RoleStore,
    nonces: NonceIssuer,
}

impl OptionAuthorizer {
    /// Authorizer over `roles` and `nonces`.
    #[must_use]
    pub const fn new(roles: RoleStore, nonces: NonceIssuer) -> Self {
        Self { roles, nonces }
    }

    /// Role store used for capability lookups.
    #[must_use]
    pub const fn roles(&self) -> &RoleStore {
        &self.roles
    }
}

#[async_trait]
impl Authorizer for OptionAuthorizer {
    async fn user_has_capability(&self, user: &str, capability: &str) -> bool {
        match self.roles.user_has_capability(user, capability).await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(error = %err, user, capability, "capability lookup failed; denying");
                false
            }
        }
    }

    fn verify_token(&self, user: &str, token: &str, action: &str) -> bool {
        self.nonces.verify(user, action, token)
    }

    fn issue_token(&self, user: &str, action: &str) -> String {
        self.nonces.issue(user, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryOptionBackend;
    use serde_json::json;

    const NOW: u64 = 1_760_000_000;

    #[test]
    fn tokens_expire_after_two_windows() {
        let issuer = NonceIssuer::new("secret").expect("issuer");
        let token = issuer.issue_at("alice", REST_TOKEN_ACTION, NOW);
        assert_eq!(token.len(), 16);

        assert!(issuer.verify_at("alice", REST_TOKEN_ACTION, &token, NOW));
        assert!(issuer.verify_at("alice", REST_TOKEN_ACTION, &token, NOW + TICK_SECONDS));
        assert!(!issuer.verify_at(
            "alice",
            REST_TOKEN_ACTION,
            &token,
            NOW + 2 * TICK_SECONDS
        ));
    }

    #[test]
    fn tokens_are_bound_to_user_action_and_secret() {
        let issuer = NonceIssuer::new("secret").expect("issuer");
        let token = issuer.issue_at("alice", REST_TOKEN_ACTION, NOW);
        assert!(!issuer.verify_at("bob", REST_TOKEN_ACTION, &token, NOW));
        assert!(!issuer.verify_at("alice", "other", &token, NOW));

        let other = NonceIssuer::new("different").expect("issuer");
        assert!(!other.verify_at("alice", REST_TOKEN_ACTION, &token, NOW));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let issuer = NonceIssuer::new("secret").expect("issuer");
        for token in ["", "!!!", "AAAA", "AAAAAAAAAAAAAAAAAAAAAAAA"] {
            assert!(!issuer.verify_at("alice", REST_TOKEN_ACTION, token, NOW), "{token}");
        }
        assert!(matches!(NonceIssuer::new(""), Err(AccessError::EmptySecret)));
    }

    #[tokio::test]
    async fn generated_secret_is_reused() {
        let backend = MemoryOptionBackend::new();
        let first = NonceIssuer::from_backend(&backend, None).await.expect("first");
        let stored = backend
            .get_option(NONCE_SALT_OPTION_NAME)
            .await
            .expect("get")
            .expect("salt");
        assert_eq!(stored.as_str().map(str::len), Some(GENERATED_SECRET_LEN));

        let second = NonceIssuer::from_backend(&backend, None).await.expect("second");
        let token = first.issue_at("alice", REST_TOKEN_ACTION, NOW);
        assert!(second.verify_at("alice", REST_TOKEN_ACTION, &token, NOW));

        let configured = NonceIssuer::from_backend(&backend, Some("explicit"))
            .await
            .expect("configured");
        assert!(!configured.verify_at("alice", REST_TOKEN_ACTION, &token, NOW));
    }

    #[tokio::test]
    async fn roles_grant_and_revoke() {
        let backend: Arc<dyn OptionBackend> = Arc::new(MemoryOptionBackend::new());
        let roles = RoleStore::new(Arc::clone(&backend));
        roles.grant_capability("administrator", "manage_plinth").await.expect("grant");
        roles.grant_capability("editor", "manage_plinth").await.expect("grant");
        roles.assign_role("alice", "administrator").await.expect("assign");

        assert!(roles.user_has_capability("alice", "manage_plinth").await.expect("check"));
        assert!(!roles.user_has_capability("bob", "manage_plinth").await.expect("check"));

        assert_eq!(roles.revoke_capability_everywhere("manage_plinth").await.expect("revoke"), 2);
        assert!(!roles.user_has_capability("alice", "manage_plinth").await.expect("check"));
        assert_eq!(roles.revoke_capability_everywhere("manage_plinth").await.expect("revoke"), 0);
    }

    #[tokio::test]
    async fn unreadable_role_document_is_empty() {
        let backend = Arc::new(MemoryOptionBackend::with_options([(
            ROLES_OPTION_NAME.to_string(),
            json!("garbage"),
        )]));
        let roles = RoleStore::new(backend);
        assert_eq!(roles.load().await.expect("load"), RolesDocument::default());
    }

    #[tokio::test]
    async fn authorizer_combines_roles_and_tokens() {
        let backend: Arc<dyn OptionBackend> = Arc::new(MemoryOptionBackend::new());
        let roles = RoleStore::new(Arc::clone(&backend));
        roles.grant_capability("administrator", "manage_plinth").await.expect("grant");
        roles.assign_role("alice", "administrator").await.expect("assign");
        let authorizer =
            OptionAuthorizer::new(roles, NonceIssuer::new("secret").expect("issuer"));

        assert!(authorizer.user_has_capability("alice", "manage_plinth").await);
        let token = authorizer.issue_token("alice", REST_TOKEN_ACTION);
        assert!(authorizer.verify_token("alice", &token, REST_TOKEN_ACTION));
        assert!(!authorizer.verify_token("mallory", &token, REST_TOKEN_ACTION));
    }
}
