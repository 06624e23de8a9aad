//! Business logic services

pub mod email;
pub mod friendship;
pub mod lending;
pub mod notifications;
pub mod reminders;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::DirectoryStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub friendship: friendship::FriendshipService,
    pub lending: lending::LendingService,
    pub notifications: notifications::NotificationInbox,
    pub reminders: reminders::ReminderScanner,
    pub users: users::UsersService,
}

impl Services {
    /// Wire every service over the same store and mailer
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        mailer: Arc<dyn email::Mailer>,
        config: &AppConfig,
    ) -> Self {
        let notifications = notifications::NotificationInbox::new(store.clone());
        Self {
            friendship: friendship::FriendshipService::new(store.clone(), notifications.clone()),
            lending: lending::LendingService::new(
                store.clone(),
                notifications.clone(),
                mailer,
                config.lending.clone(),
            ),
            reminders: reminders::ReminderScanner::new(
                store.clone(),
                notifications.clone(),
                config.reminders.clone(),
            ),
            users: users::UsersService::new(store),
            notifications,
        }
    }
}
