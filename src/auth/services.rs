use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    cookies::SessionCookie,
    dto::{GoogleLoginRequest, LoginRequest, SignupRequest},
    google::{IdentityError, IdentityVerifier, VerifiedIdentity},
    jwt::{JwtKeys, TokenError},
    password::{hash_password_async, verify_password_async},
    repo::{StoreError, UserStore},
    repo_types::{NewUser, PublicUser, User},
    sessions::SessionRegistry,
    validate::{is_valid_email, normalize_email},
};
use crate::config::{AppConfig, LinkPolicy, SessionMode};
use crate::error::{AppError, AppResult};

/// An authenticated session as seen by the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: i64,
}

/// A freshly issued session: the cookie value plus who it belongs to.
#[derive(Debug)]
pub struct IssuedSession {
    pub value: String,
    pub user: PublicUser,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityVerifier>,
    keys: JwtKeys,
    sessions: SessionRegistry,
    config: Arc<AppConfig>,
}

/// A google_id collision means the identity belongs to another account.
fn google_write_error(e: StoreError) -> AppError {
    match e {
        StoreError::Duplicate("google_id") => {
            warn!("google subject already linked to another account");
            AppError::Authentication("Failed to authenticate user with Google.".into())
        }
        StoreError::Duplicate(_) => AppError::Conflict("Email already registered".into()),
        other => other.into(),
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityVerifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        let sessions = SessionRegistry::new(keys.ttl);
        Self {
            users,
            identity,
            keys,
            sessions,
            config,
        }
    }

    #[cfg(test)]
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[cfg(test)]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn session_cookie(&self) -> SessionCookie {
        SessionCookie {
            name: self.config.session_mode.cookie_name(),
            secure: self.config.environment.is_production(),
            max_age: self.keys.ttl,
        }
    }

    /// Creates a local account. No session is issued: the caller logs in
    /// separately, so an unverified address never gets an automatic session.
    #[instrument(skip(self, req))]
    pub async fn signup(&self, req: SignupRequest) -> AppResult<PublicUser> {
        let (Some(fullname), Some(email), Some(password)) = (
            present(req.fullname),
            present(req.email),
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::validation("Please fill all the fields"));
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            warn!(email = %email, "signup with invalid email");
            return Err(AppError::validation("Please enter a valid email address"));
        }

        self.config
            .password
            .check(&password)
            .map_err(AppError::Validation)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let hash = hash_password_async(password).await?;
        let user = self
            .users
            .create(NewUser {
                fullname,
                email,
                password_hash: Some(hash),
                google_id: None,
                picture: None,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::Conflict("Email already registered".into()),
                other => other.into(),
            })?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> AppResult<IssuedSession> {
        let (Some(email), Some(password)) =
            (present(req.email), req.password.filter(|p| !p.is_empty()))
        else {
            return Err(AppError::validation("Please provide both email and password"));
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Please enter a valid email address"));
        }

        let user = self.users.find_by_email(&email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());
        let ok = verify_password_async(password, stored_hash).await?;

        let user = match user {
            Some(u) if ok => u,
            Some(u) => {
                warn!(user_id = %u.id, "login invalid password");
                return Err(AppError::invalid_credentials());
            }
            None => {
                warn!(email = %email, "login unknown email");
                return Err(AppError::invalid_credentials());
            }
        };

        let session = self.issue_session(&user).await?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(session)
    }

    #[instrument(skip(self, req))]
    pub async fn google_login(&self, req: GoogleLoginRequest) -> AppResult<IssuedSession> {
        let Some(token) = present(req.token) else {
            return Err(AppError::validation("Please provide a token"));
        };

        let identity = self.verify_identity(&token).await?;
        let email = normalize_email(&identity.email);

        // The subject is stable at Google; the email on it can change.
        if let Some(user) = self.users.find_by_google_id(&identity.subject).await? {
            let session = self.issue_session(&user).await?;
            info!(user_id = %user.id, email = %user.email, "user logged in with google");
            return Ok(session);
        }

        let user = match self.users.find_by_email(&email).await? {
            None => {
                let fullname = identity
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let user = self
                    .users
                    .create(NewUser {
                        fullname,
                        email: email.clone(),
                        password_hash: None,
                        google_id: Some(identity.subject.clone()),
                        picture: identity.picture.clone(),
                    })
                    .await
                    .map_err(google_write_error)?;
                info!(user_id = %user.id, email = %user.email, "user created from google identity");
                user
            }
            Some(existing) => self.reconcile_google(existing, &identity).await?,
        };

        let session = self.issue_session(&user).await?;
        info!(user_id = %user.id, email = %user.email, "user logged in with google");
        Ok(session)
    }

    async fn verify_identity(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let timeout = Duration::from_secs(self.config.google.timeout_secs);
        let verify = self
            .identity
            .verify_id_token(token, &self.config.google.client_id);
        match tokio::time::timeout(timeout, verify).await {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(e)) => {
                warn!(error = %e, "google id token verification failed");
                Err(e.into())
            }
            Err(_) => Err(IdentityError::Unavailable("verification timed out".into()).into()),
        }
    }

    /// Applies the link policy to an account that already owns the verified email.
    async fn reconcile_google(&self, existing: User, identity: &VerifiedIdentity) -> AppResult<User> {
        match (&existing.google_id, self.config.google.link_policy) {
            (Some(gid), _) if *gid == identity.subject => Ok(existing),
            (Some(_), _) => {
                warn!(user_id = %existing.id, "google subject does not match linked account");
                Err(AppError::Authentication(
                    "Failed to authenticate user with Google.".into(),
                ))
            }
            (None, LinkPolicy::Link) => {
                let user = self
                    .users
                    .link_google(existing.id, &identity.subject, identity.picture.as_deref())
                    .await
                    .map_err(google_write_error)?;
                info!(user_id = %user.id, "google identity linked to local account");
                Ok(user)
            }
            (None, LinkPolicy::Reject) => Err(AppError::Conflict(
                "Email already registered with a password".into(),
            )),
        }
    }

    async fn issue_session(&self, user: &User) -> AppResult<IssuedSession> {
        let value = match self.config.session_mode {
            SessionMode::Token => self.keys.sign(user.id, &user.email)?,
            SessionMode::Registry => {
                let (id, _) = self.sessions.create(PublicUser::from(user)).await;
                id.to_string()
            }
        };
        Ok(IssuedSession {
            value,
            user: PublicUser::from(user),
        })
    }

    /// Resolves a cookie value into a session. Unknown or revoked registry ids
    /// report as expired.
    pub async fn resolve_session(&self, value: &str) -> Result<SessionUser, TokenError> {
        match self.config.session_mode {
            SessionMode::Token => {
                let claims = self.keys.verify(value)?;
                Ok(SessionUser {
                    user_id: claims.sub,
                    email: claims.email,
                    expires_at: claims.exp,
                })
            }
            SessionMode::Registry => {
                let id = Uuid::parse_str(value).map_err(|_| TokenError::Malformed)?;
                let entry = self.sessions.get(id).await.ok_or(TokenError::Expired)?;
                Ok(SessionUser {
                    user_id: entry.user.id,
                    email: entry.user.email,
                    expires_at: entry.expires_at.unix_timestamp(),
                })
            }
        }
    }

    /// Ends the session server-side where that is possible. Signed tokens
    /// cannot be revoked; clearing the cookie is the caller's job.
    pub async fn logout(&self, value: Option<&str>) {
        if self.config.session_mode != SessionMode::Registry {
            return;
        }
        if let Some(id) = value.and_then(|v| Uuid::parse_str(v).ok()) {
            if self.sessions.remove(id).await {
                info!(session_id = %id, "session revoked");
            }
        }
    }

    pub async fn list_users(&self, session: &SessionUser) -> AppResult<Vec<PublicUser>> {
        if !self.config.is_admin(&session.email) {
            warn!(user_id = %session.user_id, "non-admin requested user listing");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        let users = self.users.list().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    /// Evicts expired registry sessions. No-op in token mode.
    pub async fn sweep_sessions(&self) -> usize {
        if self.config.session_mode != SessionMode::Registry {
            return 0;
        }
        let purged = self.sessions.purge_expired().await;
        if purged > 0 {
            info!(purged, "expired sessions evicted");
        }
        purged
    }
}
