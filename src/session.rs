//! Page-session state and the login/registration flow.

use std::collections::HashMap;

use crate::error::{ClientError, ClientResult};
use crate::logging::{log, log_validation, obj, v_str, Domain, Level};
use crate::remote::{AuthRequest, RemoteStore};

pub const IS_LOGGED_IN: &str = "isLoggedIn";
pub const USERNAME: &str = "username";
pub const FULL_NAME: &str = "fullName";
pub const USER_ID: &str = "userId";

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Key/value state that lives as long as the session and is cleared on logout.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    items: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub username: String,
    pub full_name: String,
    pub user_id: String,
}

impl SessionStore {
    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_logged_in(&self) -> bool {
        self.get_item(IS_LOGGED_IN) == Some("true")
    }

    pub fn user(&self) -> Option<SessionUser> {
        if !self.is_logged_in() {
            return None;
        }
        Some(SessionUser {
            username: self.get_item(USERNAME).unwrap_or_default().to_string(),
            full_name: self.get_item(FULL_NAME).unwrap_or_default().to_string(),
            user_id: self.get_item(USER_ID).unwrap_or_default().to_string(),
        })
    }

    pub fn greeting(&self) -> Option<String> {
        self.get_item(FULL_NAME)
            .filter(|n| !n.is_empty())
            .map(|n| format!("Welcome, {}!", n))
    }

    pub fn require_login(&self) -> ClientResult<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(ClientError::NotLoggedIn)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub pin: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
}

fn reject(form: &str, msg: &str) -> ClientError {
    log_validation(form, msg);
    ClientError::validation(msg)
}

impl LoginInput {
    pub fn validate(&self) -> ClientResult<AuthRequest> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(reject("login", "Please enter both username and password"));
        }
        Ok(AuthRequest::Login {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

impl RegisterInput {
    /// Lengths count characters, not bytes.
    pub fn validate(&self) -> ClientResult<AuthRequest> {
        let pin = self.pin.trim();
        let username = self.username.trim();
        let full_name = self.full_name.trim();
        if pin.is_empty()
            || username.is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
            || full_name.is_empty()
        {
            return Err(reject("register", "Please fill in all fields"));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(reject("register", "Username must be at least 3 characters"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(reject("register", "Password must be at least 6 characters"));
        }
        if self.password != self.confirm_password {
            return Err(reject("register", "Passwords do not match"));
        }
        Ok(AuthRequest::Register {
            pin: pin.to_string(),
            username: username.to_string(),
            password: self.password.clone(),
            full_name: full_name.to_string(),
        })
    }
}

/// Logs in and fills the session. A refusal by the store is `ClientError::Rejected`.
pub async fn login(remote: &dyn RemoteStore, session: &mut SessionStore, input: &LoginInput) -> ClientResult<SessionUser> {
    let req = input.validate()?;
    let username = match &req {
        AuthRequest::Login { username, .. } => username.clone(),
        AuthRequest::Register { username, .. } => username.clone(),
    };
    let reply = remote.authenticate(&req).await?;
    if !reply.success {
        log(
            Level::Info,
            Domain::Session,
            "login_refused",
            obj(&[("username", v_str(&username))]),
        );
        return Err(ClientError::Rejected(
            reply.message.unwrap_or_else(|| "Invalid username or password".to_string()),
        ));
    }
    session.set_item(IS_LOGGED_IN, "true");
    session.set_item(USERNAME, &username);
    session.set_item(FULL_NAME, reply.full_name.as_deref().unwrap_or_default());
    session.set_item(USER_ID, reply.user_id.as_deref().unwrap_or_default());
    log(
        Level::Info,
        Domain::Session,
        "login",
        obj(&[("username", v_str(&username))]),
    );
    session.user().ok_or(ClientError::NotLoggedIn)
}

pub async fn register(remote: &dyn RemoteStore, input: &RegisterInput) -> ClientResult<()> {
    let req = input.validate()?;
    let reply = remote.authenticate(&req).await?;
    if !reply.success {
        return Err(ClientError::Rejected(
            reply.message.unwrap_or_else(|| "Registration failed".to_string()),
        ));
    }
    log(Level::Info, Domain::Session, "registered", obj(&[]));
    Ok(())
}

pub fn logout(session: &mut SessionStore) {
    session.clear();
    log(Level::Info, Domain::Session, "logout", obj(&[]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    fn register_input() -> RegisterInput {
        RegisterInput {
            pin: "0000".into(),
            username: "asha".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            full_name: "Asha K".into(),
        }
    }

    fn message(err: ClientError) -> String {
        err.to_string()
    }

    #[test]
    fn test_login_requires_both_fields() {
        let input = LoginInput { username: "  ".into(), password: "x".into() };
        assert_eq!(message(input.validate().unwrap_err()), "Please enter both username and password");
    }

    #[test]
    fn test_register_rules_in_order() {
        let mut input = register_input();
        input.full_name = " ".into();
        assert_eq!(message(input.validate().unwrap_err()), "Please fill in all fields");

        let mut input = register_input();
        input.username = "as".into();
        assert_eq!(message(input.validate().unwrap_err()), "Username must be at least 3 characters");

        let mut input = register_input();
        input.password = "short".into();
        input.confirm_password = "short".into();
        assert_eq!(message(input.validate().unwrap_err()), "Password must be at least 6 characters");

        let mut input = register_input();
        input.confirm_password = "secret2".into();
        assert_eq!(message(input.validate().unwrap_err()), "Passwords do not match");

        assert!(register_input().validate().is_ok());
    }

    #[tokio::test]
    async fn test_login_fills_session_and_logout_clears() {
        let remote = MemoryRemote::default();
        remote.seed_account("asha", "secret1", "Asha K");
        let mut session = SessionStore::default();
        let user = login(
            &remote,
            &mut session,
            &LoginInput { username: " asha ".into(), password: "secret1".into() },
        )
        .await
        .unwrap();
        assert_eq!(user.username, "asha");
        assert_eq!(session.get_item(IS_LOGGED_IN), Some("true"));
        assert_eq!(session.greeting().as_deref(), Some("Welcome, Asha K!"));
        assert!(!session.get_item(USER_ID).unwrap_or_default().is_empty());

        logout(&mut session);
        assert!(!session.is_logged_in());
        assert!(matches!(session.require_login(), Err(ClientError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let remote = MemoryRemote::default();
        remote.seed_account("asha", "secret1", "Asha K");
        let mut session = SessionStore::default();
        let err = login(
            &remote,
            &mut session,
            &LoginInput { username: "asha".into(), password: "nope".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_register_reports_store_message() {
        let remote = MemoryRemote::new("9999");
        let err = register(&remote, &register_input()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid registration PIN");
    }
}
