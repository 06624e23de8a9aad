//! Friendship model: one undirected edge per pair of users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Canonically ordered pair of distinct users (`low < high`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FriendPair {
    low: i32,
    high: i32,
}

impl FriendPair {
    /// Returns `None` when both ids are the same user
    pub fn new(a: i32, b: i32) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    pub fn contains(&self, user_id: i32) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The other member of the pair, if `user_id` is one of them
    pub fn other(&self, user_id: i32) -> Option<i32> {
        if !self.contains(user_id) {
            return None;
        }
        Some(if self.low == user_id { self.high } else { self.low })
    }
}

/// Stored friendship edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub user_low: i32,
    pub user_high: i32,
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    pub fn pair(&self) -> Option<FriendPair> {
        FriendPair::new(self.user_low, self.user_high)
    }

    /// The friend of `user_id` in this edge, if `user_id` is part of it
    pub fn other(&self, user_id: i32) -> Option<i32> {
        self.pair()?.other(user_id)
    }
}

/// Relationship between two users as seen by the friendship state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    None,
    Pending,
    Friends,
}
