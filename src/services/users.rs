//! Share links: anonymous read access to one user's shelf

use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{BookView, UserShort},
    repository::DirectoryStore,
};

const SHARE_TOKEN_LEN: usize = 32;

/// What an anonymous visitor sees through a share link
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedLibrary {
    pub owner: UserShort,
    pub books: Vec<BookView>,
}

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn DirectoryStore>,
}

impl UsersService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    fn generate_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SHARE_TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    /// Issue a new share token, invalidating the previous link
    pub async fn rotate_share_token(&self, user_id: i32) -> AppResult<String> {
        let token = Self::generate_token();
        if !self.store.set_share_token(user_id, Some(token.clone())).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        tracing::info!(user = user_id, "Share token rotated");
        Ok(token)
    }

    pub async fn revoke_share_token(&self, user_id: i32) -> AppResult<()> {
        if !self.store.set_share_token(user_id, None).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        Ok(())
    }

    pub async fn shared_library(&self, token: &str) -> AppResult<SharedLibrary> {
        let owner = self
            .store
            .get_user_by_share_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Unknown share link".to_string()))?;
        let books = self.store.list_books_by_owner(owner.id).await?;
        Ok(SharedLibrary {
            owner: UserShort::from(&owner),
            books: books.iter().map(BookView::from).collect::<Vec<_>>(),
        })
    }
}
