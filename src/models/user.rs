//! User model, user references and JWT claims

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// User as stored in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub display_name: String,
    pub email: String,
    pub is_admin: bool,
    /// Token granting anonymous read access to this user's shelf
    #[serde(skip_serializing)]
    pub share_token: Option<String>,
}

/// Short public representation (friends list, shared shelf header)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserShort {
    pub id: i32,
    pub display_name: String,
}

impl From<&User> for UserShort {
    fn from(user: &User) -> Self {
        UserShort {
            id: user.id,
            display_name: user.display_name.clone(),
        }
    }
}

/// A user designated either by numeric id or by email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(i32),
    Email(String),
}

impl std::str::FromStr for UserRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::Validation("User reference is empty".to_string()));
        }
        if let Ok(id) = s.parse::<i32>() {
            return Ok(UserRef::Id(id));
        }
        if s.contains('@') {
            return Ok(UserRef::Email(s.to_lowercase()));
        }
        Err(AppError::Validation(format!(
            "'{}' is neither a user id nor an email address",
            s
        )))
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "user {}", id),
            UserRef::Email(email) => write!(f, "{}", email),
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Claims for `user` valid for `hours`
    pub fn for_user(user: &User, hours: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.email.clone(),
            user_id: user.id,
            is_admin: user.is_admin,
            iat: now,
            exp: now + hours * 3600,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ref_parses_ids_and_emails() {
        assert_eq!("42".parse::<UserRef>().unwrap(), UserRef::Id(42));
        assert_eq!(
            " Ada@Example.org ".parse::<UserRef>().unwrap(),
            UserRef::Email("ada@example.org".to_string())
        );
        assert!("nobody".parse::<UserRef>().is_err());
        assert!("".parse::<UserRef>().is_err());
    }

    #[test]
    fn claims_round_trip_through_token() {
        let user = User {
            id: 7,
            display_name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            is_admin: false,
            share_token: None,
        };
        let token = UserClaims::for_user(&user, 1).create_token("secret").unwrap();
        let claims = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
