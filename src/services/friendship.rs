//! Friendship engine: request / accept / decline protocol over the undirected
//! friendship relation.
//!
//! Per ordered pair the states are `None -> Pending -> Friends` or
//! `Pending -> None` on decline. The pending phase lives only in the inbox
//! as a FRIEND_REQUEST; no edge exists until it is accepted.

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        FriendPair, Friendship, FriendshipStatus, NewNotification, Notification, NotificationKind,
        Resolution, User, UserRef,
    },
    repository::DirectoryStore,
    services::notifications::NotificationInbox,
};

#[derive(Clone)]
pub struct FriendshipService {
    store: Arc<dyn DirectoryStore>,
    inbox: NotificationInbox,
}

impl FriendshipService {
    pub fn new(store: Arc<dyn DirectoryStore>, inbox: NotificationInbox) -> Self {
        Self { store, inbox }
    }

    async fn resolve_user(&self, target: &UserRef) -> AppResult<User> {
        let user = match target {
            UserRef::Id(id) => self.store.get_user(*id).await?,
            UserRef::Email(email) => self.store.get_user_by_email(email).await?,
        };
        user.ok_or_else(|| AppError::NotFound(format!("No user matches {}", target)))
    }

    async fn require_user(&self, id: i32) -> AppResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Ask `target` to become friends with `sender_id`
    pub async fn send_friend_request(
        &self,
        sender_id: i32,
        target: &UserRef,
    ) -> AppResult<Notification> {
        let sender = self.require_user(sender_id).await?;
        let receiver = self.resolve_user(target).await?;

        let pair = FriendPair::new(sender.id, receiver.id).ok_or_else(|| {
            AppError::InvalidState("Cannot send a friend request to yourself".to_string())
        })?;

        if self.store.are_friends(pair).await? {
            return Err(AppError::AlreadyFriends(format!(
                "{} and {} are already friends",
                sender.display_name, receiver.display_name
            )));
        }

        if let Some(pending) = self.store.find_friend_request(sender.id, receiver.id).await? {
            let message = if pending.sender_id == sender.id {
                format!("A friend request to {} is already pending", receiver.display_name)
            } else {
                format!("{} has already sent you a friend request", receiver.display_name)
            };
            return Err(AppError::DuplicateRequest(message));
        }

        // A concurrent submit that slipped past the lookup is rejected by the store
        self.inbox
            .record(NewNotification::friend_request(&sender, receiver.id))
            .await
    }

    /// Accept a pending request: the edge is stored and the request removed together
    pub async fn accept_friend_request(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Resolution<Friendship>> {
        let Some(request) = self.inbox.owned_by(notification_id, actor_id).await? else {
            return Ok(Resolution::AlreadyResolved);
        };
        if request.kind != NotificationKind::FriendRequest {
            return Err(AppError::InvalidState(format!(
                "Notification {} is not a friend request",
                notification_id
            )));
        }

        let pair = FriendPair::new(request.sender_id, request.receiver_id).ok_or_else(|| {
            AppError::Internal(format!("Friend request {} targets its sender", notification_id))
        })?;

        match self.store.create_friendship(request.id, pair).await? {
            Some(friendship) => {
                tracing::info!(
                    user_a = pair.low(),
                    user_b = pair.high(),
                    "Friend request accepted"
                );
                Ok(Resolution::Applied(friendship))
            }
            None => Ok(Resolution::AlreadyResolved),
        }
    }

    /// Decline a pending request; no edge is created
    pub async fn decline_friend_request(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Resolution<()>> {
        let resolution = self
            .inbox
            .decline(notification_id, actor_id, NotificationKind::FriendRequest)
            .await?;
        if resolution.is_applied() {
            tracing::info!(notification = notification_id, "Friend request declined");
        }
        Ok(resolution)
    }

    /// Where the pair stands in the request protocol
    pub async fn friendship_status(&self, a: i32, b: i32) -> AppResult<FriendshipStatus> {
        let Some(pair) = FriendPair::new(a, b) else {
            return Ok(FriendshipStatus::None);
        };
        if self.store.are_friends(pair).await? {
            return Ok(FriendshipStatus::Friends);
        }
        if self.store.find_friend_request(a, b).await?.is_some() {
            return Ok(FriendshipStatus::Pending);
        }
        Ok(FriendshipStatus::None)
    }

    pub async fn list_friends(&self, user_id: i32) -> AppResult<Vec<User>> {
        self.require_user(user_id).await?;
        self.store.list_friends(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryDirectory;

    struct Fixture {
        store: Arc<MemoryDirectory>,
        friends: FriendshipService,
        inbox: NotificationInbox,
        u1: User,
        u2: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryDirectory::new());
        let inbox = NotificationInbox::new(store.clone());
        let friends = FriendshipService::new(store.clone(), inbox.clone());
        let u1 = store.add_user("Ursula", "ursula@example.org").await;
        let u2 = store.add_user("Vernor", "vernor@example.org").await;
        Fixture {
            store,
            friends,
            inbox,
            u1,
            u2,
        }
    }

    #[tokio::test]
    async fn request_then_accept_creates_one_edge() {
        let f = fixture().await;
        let request = f
            .friends
            .send_friend_request(f.u1.id, &UserRef::Email("VERNOR@example.org".into()))
            .await
            .unwrap();
        assert_eq!(request.kind, NotificationKind::FriendRequest);
        assert_eq!(request.receiver_id, f.u2.id);
        assert_eq!(request.sender_name, "Ursula");
        assert_eq!(f.store.friendship_count().await, 0);
        assert_eq!(
            f.friends.friendship_status(f.u2.id, f.u1.id).await.unwrap(),
            FriendshipStatus::Pending
        );

        let accepted = f.friends.accept_friend_request(request.id, f.u2.id).await.unwrap();
        assert!(accepted.is_applied());
        assert_eq!(f.store.friendship_count().await, 1);
        assert!(f.inbox.list_for_user(f.u2.id).await.unwrap().is_empty());

        // both directions see the friendship
        let of_u1 = f.friends.list_friends(f.u1.id).await.unwrap();
        let of_u2 = f.friends.list_friends(f.u2.id).await.unwrap();
        assert_eq!(of_u1.iter().map(|u| u.id).collect::<Vec<_>>(), vec![f.u2.id]);
        assert_eq!(of_u2.iter().map(|u| u.id).collect::<Vec<_>>(), vec![f.u1.id]);
        assert_eq!(
            f.friends.friendship_status(f.u1.id, f.u2.id).await.unwrap(),
            FriendshipStatus::Friends
        );
    }

    #[tokio::test]
    async fn second_request_is_duplicate() {
        let f = fixture().await;
        f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();

        let err = f
            .friends
            .send_friend_request(f.u1.id, &UserRef::Id(f.u2.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRequest(_)));

        let err = f
            .friends
            .send_friend_request(f.u2.id, &UserRef::Id(f.u1.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRequest(_)));

        assert_eq!(f.inbox.list_for_user(f.u2.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn request_between_friends_is_rejected() {
        let f = fixture().await;
        let request = f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();
        f.friends.accept_friend_request(request.id, f.u2.id).await.unwrap();

        let err = f
            .friends
            .send_friend_request(f.u2.id, &UserRef::Id(f.u1.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyFriends(_)));
    }

    #[tokio::test]
    async fn unknown_and_self_targets() {
        let f = fixture().await;
        let err = f
            .friends
            .send_friend_request(f.u1.id, &UserRef::Email("nobody@example.org".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = f
            .friends
            .send_friend_request(f.u1.id, &UserRef::Id(f.u1.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn decline_is_idempotent_and_creates_no_edge() {
        let f = fixture().await;
        let request = f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();

        let first = f.friends.decline_friend_request(request.id, f.u2.id).await.unwrap();
        let second = f.friends.decline_friend_request(request.id, f.u2.id).await.unwrap();
        assert_eq!(first, Resolution::Applied(()));
        assert_eq!(second, Resolution::AlreadyResolved);
        assert_eq!(f.store.friendship_count().await, 0);
        assert_eq!(
            f.friends.friendship_status(f.u1.id, f.u2.id).await.unwrap(),
            FriendshipStatus::None
        );

        // after a decline the sender may ask again
        assert!(f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.is_ok());
    }

    #[tokio::test]
    async fn accept_twice_is_a_no_op() {
        let f = fixture().await;
        let request = f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();

        assert!(f.friends.accept_friend_request(request.id, f.u2.id).await.unwrap().is_applied());
        assert_eq!(
            f.friends.accept_friend_request(request.id, f.u2.id).await.unwrap(),
            Resolution::AlreadyResolved
        );
        assert_eq!(f.store.friendship_count().await, 1);
    }

    #[tokio::test]
    async fn sender_cannot_accept_own_request() {
        let f = fixture().await;
        let request = f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();

        let err = f.friends.accept_friend_request(request.id, f.u1.id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(f.store.friendship_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_accepts_produce_a_single_edge() {
        let f = fixture().await;
        let request = f.friends.send_friend_request(f.u1.id, &UserRef::Id(f.u2.id)).await.unwrap();

        let (a, b) = tokio::join!(
            f.friends.accept_friend_request(request.id, f.u2.id),
            f.friends.accept_friend_request(request.id, f.u2.id)
        );
        let applied = [a.unwrap(), b.unwrap()].iter().filter(|r| r.is_applied()).count();
        assert_eq!(applied, 1);
        assert_eq!(f.store.friendship_count().await, 1);
    }
}
