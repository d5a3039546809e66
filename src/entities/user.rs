//! Manager accounts

use crate::core::auth::{hash_password, parse_scopes};
use crate::core::entity::Record;
use crate::core::error::{ManagerError, ManagerResult, ValidationError};
use crate::core::query::{FilterOperator, FilterRequest, QueryEngine};
use crate::core::service::Resource;
use crate::core::store::{Document, RecordStore};
use crate::impl_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use validator::Validate;

/// An account allowed to call the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub mail: String,
    /// Hex SHA-512 of the password; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_enabled: bool,
    pub created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Comma or whitespace separated scope names
    pub scopes: String,
}

impl_record!(User, "user",
    fields {
        id: Integer,
        mail: Text,
        is_enabled: Boolean,
        created: DateTime,
        scopes: Text,
    }
    nullable {
        last_login: DateTime,
    }
);

impl User {
    pub fn scope_set(&self) -> BTreeSet<String> {
        parse_scopes(&self.scopes)
    }

    pub fn password_matches(&self, password: &str) -> bool {
        self.password_hash == hash_password(password)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(email)]
    pub mail: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password_confirm: String,
    #[serde(default)]
    pub scopes: String,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email)]
    pub mail: Option<String>,
    #[validate(length(min = 1))]
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub is_enabled: Option<bool>,
    pub scopes: Option<String>,
}

impl Document for User {
    fn to_document(&self) -> anyhow::Result<Value> {
        let mut doc = serde_json::to_value(self)?;
        doc["password_hash"] = Value::String(self.password_hash.clone());
        Ok(doc)
    }
}

impl Resource for User {
    const SCOPE: &'static str = "user";

    type Create = UserCreate;
    type Update = UserUpdate;

    fn from_create(payload: UserCreate, now: DateTime<Utc>) -> ManagerResult<Self> {
        Ok(User {
            id: 0,
            mail: payload.mail,
            password_hash: hash_password(&payload.password),
            is_enabled: payload.is_enabled,
            created: now,
            last_login: None,
            scopes: payload.scopes,
        })
    }

    fn apply_update(&mut self, payload: UserUpdate) -> ManagerResult<()> {
        if let Some(password) = payload.password {
            if payload.password_confirm.as_deref() != Some(password.as_str()) {
                return Err(ManagerError::Validation(ValidationError::FieldError {
                    field: "password_confirm".to_string(),
                    message: "passwords do not match".to_string(),
                }));
            }
            self.password_hash = hash_password(&password);
        }
        if let Some(mail) = payload.mail {
            self.mail = mail;
        }
        if let Some(is_enabled) = payload.is_enabled {
            self.is_enabled = is_enabled;
        }
        if let Some(scopes) = payload.scopes {
            self.scopes = scopes;
        }
        Ok(())
    }
}

/// Find an enabled user by mail, oldest first
pub async fn find_enabled_by_mail(
    store: &dyn RecordStore<User>,
    mail: &str,
) -> ManagerResult<Vec<User>> {
    let request = FilterRequest::new()
        .filter("mail", FilterOperator::Eq, serde_json::json!(mail))
        .filter("is_enabled", FilterOperator::Eq, serde_json::json!(true))
        .page(0, 100);
    let query = QueryEngine::default().build(User::fields(), &request)?;
    Ok(store.fetch(&query).await?)
}

/// Check credentials and record the login.
///
/// Returns `None` for unknown mail, wrong password or a disabled account.
pub async fn login(
    store: &dyn RecordStore<User>,
    mail: &str,
    password: &str,
) -> ManagerResult<Option<User>> {
    let Some(mut user) = find_enabled_by_mail(store, mail)
        .await?
        .into_iter()
        .find(|u| u.password_matches(password))
    else {
        tracing::warn!(mail, "rejected login");
        return Ok(None);
    };

    user.last_login = Some(Utc::now());
    let user = store.save(user).await?;
    if let Some(user) = &user {
        tracing::info!(user_id = user.id, "user logged in");
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn create(mail: &str, password: &str, is_enabled: bool) -> UserCreate {
        UserCreate {
            mail: mail.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
            scopes: "event".to_string(),
            is_enabled,
        }
    }

    #[test]
    fn test_password_confirmation_rule() {
        let mut payload = create("a@b.c", "pw", true);
        assert!(payload.validate().is_ok());
        payload.password_confirm = "other".to_string();
        assert!(payload.validate().is_err());

        let mut bad_mail = create("not-a-mail", "pw", true);
        bad_mail.password_confirm = "pw".to_string();
        assert!(bad_mail.validate().is_err());
    }

    #[test]
    fn test_hash_is_not_serialized() {
        let user = User::from_create(create("a@b.c", "pw", true), Utc::now()).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["mail"], "a@b.c");
    }

    #[test]
    fn test_password_hash_not_queryable() {
        assert!(User::fields().lookup("password_hash").is_none());
        assert!(User::fields().lookup("last_login").unwrap().nullable);
    }

    #[test]
    fn test_update_password_requires_confirmation() {
        let mut user = User::from_create(create("a@b.c", "pw", true), Utc::now()).unwrap();
        let err = user
            .apply_update(UserUpdate {
                password: Some("new".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(user.password_matches("pw"));

        user.apply_update(UserUpdate {
            password: Some("new".to_string()),
            password_confirm: Some("new".to_string()),
            scopes: Some("admin".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(user.password_matches("new"));
        assert_eq!(user.mail, "a@b.c");
        assert!(user.scope_set().contains("admin"));
    }

    #[tokio::test]
    async fn test_login_checks_password_and_enabled() {
        let store = InMemoryStore::<User>::new();
        store
            .insert(User::from_create(create("a@b.c", "pw", true), Utc::now()).unwrap())
            .await
            .unwrap();
        store
            .insert(User::from_create(create("off@b.c", "pw", false), Utc::now()).unwrap())
            .await
            .unwrap();

        assert!(login(&store, "a@b.c", "wrong").await.unwrap().is_none());
        assert!(login(&store, "off@b.c", "pw").await.unwrap().is_none());

        let user = login(&store, "a@b.c", "pw").await.unwrap().unwrap();
        assert!(user.last_login.is_some());
        assert_eq!(store.get(user.id).await.unwrap().unwrap().last_login, user.last_login);
    }
}
