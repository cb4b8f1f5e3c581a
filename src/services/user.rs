//! User service
//!
//! Accounts, sign-in and the admin user-management operations:
//! - signup with username/email/password validation
//! - signin by username or email, returning a JWT
//! - token authentication for every protected request
//! - profile and password changes
//! - role/status changes and deletion by admins

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{
    ListParams, NewUser, PagedResult, Role, SigninInput, SignupInput, UpdateProfileInput, User,
    UserProfile, UserRole, UserStatus,
};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{TokenError, TokenService};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,50}$").expect("username pattern is valid"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

const MIN_PASSWORD_LEN: usize = 6;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Wrong credentials, missing or bad token
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Account is banned")]
    UserBanned,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    /// Operation not allowed on this account
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TokenError> for UserServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => UserServiceError::AuthenticationError("Token expired".into()),
            TokenError::Invalid => UserServiceError::AuthenticationError("Invalid token".into()),
            TokenError::Signing(e) => UserServiceError::InternalError(anyhow::Error::new(e)),
        }
    }
}

/// What [`UserService::ensure_admin`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSeed {
    Created,
    Promoted,
    AlreadyAdmin,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            user_repo,
            tokens,
            bcrypt_cost,
        }
    }

    /// Register a new reader account.
    ///
    /// Usernames are 3-50 characters of letters, digits, `_`, `.` or `-`;
    /// passwords need at least 6 characters.
    pub async fn signup(&self, input: SignupInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&input.password)?;

        if self.user_repo.get_by_username(&username).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password, self.bcrypt_cost)?;
        let new_user = NewUser {
            username,
            email,
            password_hash,
            full_name: non_empty(input.full_name),
            role: UserRole::User,
        };

        // Two concurrent signups can both pass the checks above
        match self.user_repo.create(&new_user).await {
            Ok(user) => {
                tracing::info!("New account registered: {}", user.username);
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UserExists(
                "Username or email is already registered".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Sign in with a username or email and return the user with a fresh token
    pub async fn signin(&self, input: SigninInput) -> Result<(User, String), UserServiceError> {
        let login = input.login.trim();
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".into());

        let user = self.find_by_login(login).await?.ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::warn!("Failed sign-in for {}", login);
            return Err(invalid());
        }
        if user.is_banned() {
            tracing::warn!("Banned user {} tried to sign in", user.username);
            return Err(UserServiceError::UserBanned);
        }

        self.user_repo.touch_last_login(user.id).await?;
        let user = self
            .user_repo
            .get_by_id(user.id)
            .await?
            .ok_or(UserServiceError::NotFound)?;
        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, UserServiceError> {
        let user = if login.contains('@') {
            match self.user_repo.get_by_email(login).await? {
                Some(user) => Some(user),
                None => self.user_repo.get_by_username(login).await?,
            }
        } else {
            self.user_repo.get_by_username(login).await?
        };
        Ok(user)
    }

    /// Resolve a bearer token to an active user
    pub async fn authenticate(&self, token: &str) -> Result<User, UserServiceError> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .user_repo
            .get_by_id(claims.user_id()?)
            .await?
            .ok_or_else(|| UserServiceError::AuthenticationError("Account no longer exists".into()))?;
        if user.is_banned() {
            return Err(UserServiceError::UserBanned);
        }
        Ok(user)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Update the caller's own profile; `None` fields are left alone and
    /// empty strings clear optional fields
    pub async fn update_profile(&self, user_id: i64, input: UpdateProfileInput) -> Result<User, UserServiceError> {
        let mut user = self.get_profile(user_id).await?;

        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            validate_email(&email)?;
            if email != user.email.to_lowercase() {
                if let Some(other) = self.user_repo.get_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(UserServiceError::UserExists(format!(
                            "Email '{}' is already registered",
                            email
                        )));
                    }
                }
            }
            user.email = email;
        }
        if input.full_name.is_some() {
            user.full_name = non_empty(input.full_name);
        }
        if input.avatar.is_some() {
            user.avatar = non_empty(input.avatar);
        }
        if input.bio.is_some() {
            user.bio = non_empty(input.bio);
        }

        Ok(self.user_repo.update(&user).await?)
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self.get_profile(user_id).await?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".into(),
            ));
        }
        validate_password(new_password)?;

        let hash = hash_password(new_password, self.bcrypt_cost)?;
        self.user_repo.update_password(user_id, &hash).await?;
        Ok(())
    }

    pub async fn list_users(
        &self,
        params: &ListParams,
        search: Option<&str>,
        role: Option<UserRole>,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (users, total) = self.user_repo.list(params, search, role).await?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn get_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_profile(id).await
    }

    /// Change a user's role. Admins cannot change their own role.
    pub async fn update_role(&self, actor: &User, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        if actor.id == id {
            return Err(UserServiceError::Forbidden("You cannot change your own role".into()));
        }
        let mut user = self.get_user(id).await?;
        user.role = role;
        let user = self.user_repo.update(&user).await?;
        tracing::info!("{} set role of {} to {}", actor.username, user.username, role);
        Ok(user)
    }

    /// Ban or reinstate a user. Admins cannot ban themselves.
    pub async fn update_status(&self, actor: &User, id: i64, status: UserStatus) -> Result<User, UserServiceError> {
        if actor.id == id {
            return Err(UserServiceError::Forbidden("You cannot change your own status".into()));
        }
        let mut user = self.get_user(id).await?;
        user.status = status;
        let user = self.user_repo.update(&user).await?;
        tracing::info!("{} set status of {} to {}", actor.username, user.username, status);
        Ok(user)
    }

    /// Delete an account; ratings, bookmarks, history, comments and
    /// certificates go with it
    pub async fn delete_user(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        if actor.id == id {
            return Err(UserServiceError::Forbidden("You cannot delete your own account".into()));
        }
        if !self.user_repo.delete(id).await? {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!("{} deleted user {}", actor.username, id);
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, UserServiceError> {
        Ok(self.user_repo.list_roles().await?)
    }

    pub async fn list_profiles(&self, params: &ListParams) -> Result<PagedResult<UserProfile>, UserServiceError> {
        let (profiles, total) = self.user_repo.list_profiles(params).await?;
        Ok(PagedResult::new(profiles, total, params))
    }

    /// Create an admin account, or promote and reactivate an existing one
    /// with that username. An existing account keeps its password.
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, AdminSeed), UserServiceError> {
        if let Some(mut user) = self.user_repo.get_by_username(username.trim()).await? {
            if user.is_admin() && !user.is_banned() {
                return Ok((user, AdminSeed::AlreadyAdmin));
            }
            user.role = UserRole::Admin;
            user.status = UserStatus::Active;
            let user = self.user_repo.update(&user).await?;
            return Ok((user, AdminSeed::Promoted));
        }

        let username = username.trim().to_string();
        let email = email.trim().to_lowercase();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(password)?;

        let user = self
            .user_repo
            .create(&NewUser {
                username,
                email,
                password_hash: hash_password(password, self.bcrypt_cost)?,
                full_name: Some("Administrator".into()),
                role: UserRole::Admin,
            })
            .await
            .context("Failed to create admin account")?;
        Ok((user, AdminSeed::Created))
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError(
            "Username must be 3-50 characters of letters, digits, '_', '.' or '-'".into(),
        ))
    }
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.len() <= 255 && EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError("Invalid email address".into()))
    }
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::test_support::migrated_pool;

    pub(crate) async fn test_service() -> UserService {
        let pool = migrated_pool().await;
        UserService::new(
            SqlxUserRepository::boxed(pool),
            TokenService::new("test-secret", 24),
            4,
        )
    }

    fn signup_input(username: &str, email: &str) -> SignupInput {
        SignupInput {
            username: username.into(),
            email: email.into(),
            password: "secret123".into(),
            full_name: Some("  Ada Lovelace ".into()),
        }
    }

    fn signin_input(login: &str, password: &str) -> SigninInput {
        SigninInput {
            login: login.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_signup_defaults_and_duplicates() {
        let service = test_service().await;

        let user = service.signup(signup_input("ada", "Ada@Example.com")).await.unwrap();
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));
        assert_ne!(user.password_hash, "secret123");

        let dup_name = service.signup(signup_input("ada", "other@example.com")).await;
        assert!(matches!(dup_name, Err(UserServiceError::UserExists(_))));
        let dup_email = service.signup(signup_input("ada2", "ADA@example.com")).await;
        assert!(matches!(dup_email, Err(UserServiceError::UserExists(_))));
        let dup_case = service.signup(signup_input("ADA", "third@example.com")).await;
        assert!(matches!(dup_case, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let service = test_service().await;

        for (username, email, password) in [
            ("ab", "a@example.com", "secret123"),
            ("has space", "a@example.com", "secret123"),
            ("valid", "not-an-email", "secret123"),
            ("valid", "a@example.com", "short"),
        ] {
            let result = service
                .signup(SignupInput {
                    username: username.into(),
                    email: email.into(),
                    password: password.into(),
                    full_name: None,
                })
                .await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))), "{}", username);
        }
    }

    #[tokio::test]
    async fn test_signin_by_username_or_email() {
        let service = test_service().await;
        service.signup(signup_input("grace", "grace@example.com")).await.unwrap();

        let (user, token) = service.signin(signin_input("grace", "secret123")).await.unwrap();
        assert!(user.last_login_at.is_some());
        assert_eq!(service.authenticate(&token).await.unwrap().id, user.id);

        let (by_email, _) = service
            .signin(signin_input("GRACE@example.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let wrong = service.signin(signin_input("grace", "nope-nope")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let unknown = service.signin(signin_input("nobody", "secret123")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_banned_user_rejected() {
        let service = test_service().await;
        let (admin, _) = service.ensure_admin("root", "root@example.com", "rootpass").await.unwrap();
        let user = service.signup(signup_input("troll", "troll@example.com")).await.unwrap();
        let (_, token) = service.signin(signin_input("troll", "secret123")).await.unwrap();

        service.update_status(&admin, user.id, UserStatus::Banned).await.unwrap();

        assert!(matches!(
            service.signin(signin_input("troll", "secret123")).await,
            Err(UserServiceError::UserBanned)
        ));
        assert!(matches!(service.authenticate(&token).await, Err(UserServiceError::UserBanned)));
    }

    #[tokio::test]
    async fn test_profile_and_password() {
        let service = test_service().await;
        let user = service.signup(signup_input("lin", "lin@example.com")).await.unwrap();
        service.signup(signup_input("taken", "taken@example.com")).await.unwrap();

        let updated = service
            .update_profile(
                user.id,
                UpdateProfileInput {
                    bio: Some("Reader".into()),
                    full_name: Some("".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Reader"));
        assert_eq!(updated.full_name, None);

        let clash = service
            .update_profile(
                user.id,
                UpdateProfileInput {
                    email: Some("taken@example.com".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(UserServiceError::UserExists(_))));

        assert!(service.change_password(user.id, "wrong-one", "newpass1").await.is_err());
        service.change_password(user.id, "secret123", "newpass1").await.unwrap();
        assert!(service.signin(signin_input("lin", "newpass1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_guards_and_seed() {
        let service = test_service().await;
        let (admin, seeded) = service.ensure_admin("root", "root@example.com", "rootpass").await.unwrap();
        assert_eq!(seeded, AdminSeed::Created);
        assert!(admin.is_admin());

        let (_, again) = service.ensure_admin("root", "root@example.com", "rootpass").await.unwrap();
        assert_eq!(again, AdminSeed::AlreadyAdmin);

        assert!(matches!(
            service.delete_user(&admin, admin.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.update_role(&admin, admin.id, UserRole::User).await,
            Err(UserServiceError::Forbidden(_))
        ));

        let user = service.signup(signup_input("promote", "p@example.com")).await.unwrap();
        let (_, promoted) = service.ensure_admin("promote", "ignored@example.com", "ignored").await.unwrap();
        assert_eq!(promoted, AdminSeed::Promoted);
        assert!(service.get_user(user.id).await.unwrap().is_admin());

        let editor = service.update_role(&admin, user.id, UserRole::Editor).await.unwrap();
        assert_eq!(editor.role, UserRole::Editor);

        service.delete_user(&admin, user.id).await.unwrap();
        assert!(matches!(service.get_user(user.id).await, Err(UserServiceError::NotFound)));
        assert!(matches!(
            service.delete_user(&admin, user.id).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_users_and_roles() {
        let service = test_service().await;
        service.ensure_admin("root", "root@example.com", "rootpass").await.unwrap();
        service.signup(signup_input("alice", "alice@example.com")).await.unwrap();
        service.signup(signup_input("bob", "bob@example.com")).await.unwrap();

        let page = service
            .list_users(&ListParams::new(1, 10), Some("ali"), None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "alice");

        let admins = service
            .list_users(&ListParams::default(), None, Some(UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(admins.total, 1);

        let roles = service.list_roles().await.unwrap();
        let user_role = roles.iter().find(|r| r.name == "user").unwrap();
        assert_eq!(user_role.user_count, 2);

        let profiles = service.list_profiles(&ListParams::default()).await.unwrap();
        assert_eq!(profiles.total, 3);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn usernames_from_allowed_alphabet_validate(name in "[A-Za-z0-9_.-]{3,50}") {
                prop_assert!(validate_username(&name).is_ok());
            }

            #[test]
            fn short_passwords_rejected(password in ".{0,5}") {
                prop_assert!(validate_password(&password).is_err());
            }
        }
    }
}
