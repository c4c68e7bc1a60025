//! Registration, login, and session authentication.
//!
//! Login failures are deliberately flattened: unknown email and wrong
//! password both surface as [`CoreError::InvalidCredentials`] so callers
//! cannot probe which addresses hold accounts. The distinction is kept
//! internally in the logs.

use crate::store::actors::ActorStore;
use crate::{Actor, CoreError, CoreResult, NewActor};
use chrono::Utc;
use mera_credentials::{hash_password, verify_password, TokenSigner};
use mera_types::EmailAddress;
use std::sync::Arc;
use uuid::Uuid;

/// A successful registration or login: the session token plus the actor it
/// authenticates.
#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    pub token: String,
    pub actor: Actor,
}

/// Account lifecycle and session verification.
#[derive(Clone, Debug)]
pub struct IdentityService {
    actors: ActorStore,
    signer: TokenSigner,
}

impl IdentityService {
    pub fn new(cfg: Arc<crate::CoreConfig>, signer: TokenSigner) -> Self {
        Self {
            actors: ActorStore::new(cfg),
            signer,
        }
    }

    /// Registers a new actor and issues its first session token.
    ///
    /// Professional profiles always start unverified, whatever the caller
    /// supplied.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for an unusable password.
    /// - [`CoreError::Conflict`] when the email is already registered.
    pub fn register(&self, new_actor: NewActor) -> CoreResult<AuthenticatedSession> {
        if new_actor.password.trim().is_empty() {
            return Err(CoreError::InvalidInput("password is required".into()));
        }

        let mut profile = new_actor.profile;
        profile.reset_verification();

        let actor = Actor {
            id: Uuid::new_v4(),
            email: new_actor.email,
            password_digest: hash_password(&new_actor.password).map_err(CoreError::Credential)?,
            first_name: new_actor.first_name,
            last_name: new_actor.last_name,
            phone: new_actor.phone,
            profile,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        self.actors.create(&actor)?;

        let token = self.signer.issue_session(actor.id, actor.role().as_str())?;
        tracing::info!(actor_id = %actor.id, role = %actor.role(), "actor registered");
        Ok(AuthenticatedSession { token, actor })
    }

    /// Authenticates an email/password pair and issues a session token.
    ///
    /// Updates `last_login` on success.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidCredentials`] for unknown email or wrong
    ///   password (indistinguishable by design).
    /// - [`CoreError::AccountDeactivated`] for inactive accounts.
    pub fn login(&self, email: &EmailAddress, password: &str) -> CoreResult<AuthenticatedSession> {
        let Some(mut actor) = self.actors.find_by_email(email)? else {
            tracing::info!(email = %email, "login rejected: unknown email");
            return Err(CoreError::InvalidCredentials);
        };

        if !actor.is_active {
            tracing::info!(actor_id = %actor.id, "login rejected: account deactivated");
            return Err(CoreError::AccountDeactivated);
        }

        if !verify_password(password, &actor.password_digest).map_err(CoreError::Credential)? {
            tracing::info!(actor_id = %actor.id, "login rejected: wrong password");
            return Err(CoreError::InvalidCredentials);
        }

        actor.last_login = Some(Utc::now());
        self.actors.update(&actor)?;

        let token = self.signer.issue_session(actor.id, actor.role().as_str())?;
        tracing::info!(actor_id = %actor.id, "login succeeded");
        Ok(AuthenticatedSession { token, actor })
    }

    /// Resolves a bearer token to a live actor.
    ///
    /// Fails closed: a valid signature over a vanished or deactivated
    /// account does not authenticate.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TokenInvalidOrExpired`] for verification failures or
    ///   a missing actor.
    /// - [`CoreError::AccountDeactivated`] when the actor exists but is
    ///   inactive.
    pub fn authenticate(&self, bearer_token: &str) -> CoreResult<Actor> {
        let claims = self.signer.verify_session(bearer_token)?;

        let actor = self
            .actors
            .load(claims.actor_id)?
            .ok_or(CoreError::TokenInvalidOrExpired)?;
        if !actor.is_active {
            return Err(CoreError::AccountDeactivated);
        }
        Ok(actor)
    }

    /// Marks a professional profile as verified (operator CLI path).
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] when the actor is missing.
    /// - [`CoreError::InvalidInput`] when the role has no verification
    ///   flag.
    pub fn verify_professional(&self, actor_id: Uuid) -> CoreResult<Actor> {
        let mut actor = self.actors.get(actor_id)?;
        if !actor.profile.set_verified(true) {
            return Err(CoreError::InvalidInput(format!(
                "role '{}' has no verification flag",
                actor.role()
            )));
        }
        self.actors.update(&actor)?;
        tracing::info!(actor_id = %actor.id, "professional verified");
        Ok(actor)
    }

    /// Soft-deactivates an account (operator CLI path). Idempotent.
    pub fn deactivate(&self, actor_id: Uuid) -> CoreResult<Actor> {
        let mut actor = self.actors.get(actor_id)?;
        actor.is_active = false;
        self.actors.update(&actor)?;
        tracing::info!(actor_id = %actor.id, "account deactivated");
        Ok(actor)
    }

    /// Every stored actor (operator CLI listing).
    pub fn list_actors(&self) -> CoreResult<Vec<Actor>> {
        self.actors.list()
    }
}
