//! In-memory document store.
//!
//! Implements the full `AccountStore` semantics over locked maps. This is
//! the backend the test suite runs against; it also keeps the server
//! usable without a database for local experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::models::{
    Account, Chat, ChatMessage, ContactEntry, ContactWithChat, Group, GroupEntry, GroupMessage,
    GroupWithUnread,
};
use crate::store::AccountStore;

#[derive(Default)]
struct Collections {
    accounts: HashMap<i64, Account>,
    chats: HashMap<i32, Chat>,
    groups: HashMap<i32, Group>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<bool, Error> {
        let mut c = self.inner.write().await;
        if c.accounts.contains_key(&account.phone_number) {
            return Ok(false);
        }
        c.accounts.insert(account.phone_number, account);
        Ok(true)
    }

    async fn find_account(&self, phone: i64) -> Result<Option<Account>, Error> {
        Ok(self.inner.read().await.accounts.get(&phone).cloned())
    }

    async fn set_status(&self, phone: i64, online: bool) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.status = online;
        }
        Ok(())
    }

    async fn set_image_url(&self, phone: i64, url: &str) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.image_url = url.to_string();
        }
        Ok(())
    }

    async fn set_name_and_password(
        &self,
        phone: i64,
        first_name: &str,
        last_name: &str,
        hashed_password: &str,
    ) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.first_name = first_name.to_string();
            account.last_name = last_name.to_string();
            account.hashed_password = hashed_password.to_string();
        }
        Ok(())
    }

    async fn set_hashed_password(&self, phone: i64, hashed_password: &str) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.hashed_password = hashed_password.to_string();
        }
        Ok(())
    }

    async fn push_contact(&self, phone: i64, entry: ContactEntry) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.contacts.push(entry);
        }
        Ok(())
    }

    async fn push_group_membership(&self, phone: i64, entry: GroupEntry) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.groups.push(entry);
        }
        Ok(())
    }

    async fn pull_group_membership(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            account.groups.retain(|entry| entry.group_id != group_id);
        }
        Ok(())
    }

    async fn increment_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            if let Some(entry) = account
                .contacts
                .iter_mut()
                .find(|entry| entry.chat_id == chat_id)
            {
                entry.unread_messages += 1;
            }
        }
        Ok(())
    }

    async fn reset_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            if let Some(entry) = account
                .contacts
                .iter_mut()
                .find(|entry| entry.chat_id == chat_id)
            {
                entry.unread_messages = 0;
            }
        }
        Ok(())
    }

    async fn increment_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            if let Some(entry) = account
                .groups
                .iter_mut()
                .find(|entry| entry.group_id == group_id)
            {
                entry.group_unread_messages += 1;
            }
        }
        Ok(())
    }

    async fn reset_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(&phone) {
            if let Some(entry) = account
                .groups
                .iter_mut()
                .find(|entry| entry.group_id == group_id)
            {
                entry.group_unread_messages = 0;
            }
        }
        Ok(())
    }

    async fn create_chat(&self, chat: Chat) -> Result<bool, Error> {
        let mut c = self.inner.write().await;
        if c.chats.contains_key(&chat.chat_id) {
            return Ok(false);
        }
        c.chats.insert(chat.chat_id, chat);
        Ok(true)
    }

    async fn find_chat(&self, chat_id: i32) -> Result<Option<Chat>, Error> {
        Ok(self.inner.read().await.chats.get(&chat_id).cloned())
    }

    async fn push_chat_message(&self, chat_id: i32, message: ChatMessage) -> Result<(), Error> {
        if let Some(chat) = self.inner.write().await.chats.get_mut(&chat_id) {
            chat.messages.push(message);
        }
        Ok(())
    }

    async fn pull_chat_message(&self, chat_id: i32, full_time: &str) -> Result<(), Error> {
        if let Some(chat) = self.inner.write().await.chats.get_mut(&chat_id) {
            chat.messages.retain(|message| message.time != full_time);
        }
        Ok(())
    }

    async fn create_group(&self, group: Group) -> Result<bool, Error> {
        let mut c = self.inner.write().await;
        if c.groups.contains_key(&group.group_id) {
            return Ok(false);
        }
        c.groups.insert(group.group_id, group);
        Ok(true)
    }

    async fn find_group(&self, group_id: i32) -> Result<Option<Group>, Error> {
        Ok(self.inner.read().await.groups.get(&group_id).cloned())
    }

    async fn set_group_image_url(&self, group_id: i32, url: &str) -> Result<(), Error> {
        if let Some(group) = self.inner.write().await.groups.get_mut(&group_id) {
            group.group_image_url = url.to_string();
        }
        Ok(())
    }

    async fn add_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error> {
        if let Some(group) = self.inner.write().await.groups.get_mut(&group_id) {
            group.group_members.extend_from_slice(members);
        }
        Ok(())
    }

    async fn remove_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error> {
        if let Some(group) = self.inner.write().await.groups.get_mut(&group_id) {
            group.group_members.retain(|member| !members.contains(member));
        }
        Ok(())
    }

    async fn push_group_message(&self, group_id: i32, message: GroupMessage) -> Result<(), Error> {
        if let Some(group) = self.inner.write().await.groups.get_mut(&group_id) {
            group.group_messages.push(message);
        }
        Ok(())
    }

    async fn pull_group_message(&self, group_id: i32, full_time: &str) -> Result<(), Error> {
        if let Some(group) = self.inner.write().await.groups.get_mut(&group_id) {
            group
                .group_messages
                .retain(|message| message.time != full_time);
        }
        Ok(())
    }

    async fn fetch_contacts_and_chats(&self, phone: i64) -> Result<Vec<ContactWithChat>, Error> {
        let c = self.inner.read().await;
        let Some(account) = c.accounts.get(&phone) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(account.contacts.len());
        for entry in &account.contacts {
            let Some(contact) = c.accounts.get(&entry.contact_id) else {
                continue;
            };
            let Some(chat) = c.chats.get(&entry.chat_id) else {
                continue;
            };
            rows.push(ContactWithChat {
                contact_info: contact.contact_info(),
                chat_id: entry.chat_id,
                unread_messages: entry.unread_messages,
                chat_messages: chat.messages.clone(),
            });
        }
        Ok(rows)
    }

    async fn fetch_groups_and_chats(&self, phone: i64) -> Result<Vec<GroupWithUnread>, Error> {
        let c = self.inner.read().await;
        let Some(account) = c.accounts.get(&phone) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(account.groups.len());
        for entry in &account.groups {
            let Some(group) = c.groups.get(&entry.group_id) else {
                continue;
            };
            rows.push(GroupWithUnread {
                group_id: group.group_id,
                group_name: group.group_name.clone(),
                group_unread_messages: entry.group_unread_messages,
                group_image_url: group.group_image_url.clone(),
                group_admin: group.group_admin,
                group_members: group.group_members.clone(),
                group_messages: group.group_messages.clone(),
            });
        }
        Ok(rows)
    }

    async fn delete_account(&self, phone: i64) -> Result<(), Error> {
        let mut c = self.inner.write().await;
        let Some(account) = c.accounts.get(&phone).cloned() else {
            return Ok(());
        };

        for entry in &account.groups {
            if let Some(group) = c.groups.get_mut(&entry.group_id) {
                group.group_members.retain(|member| *member != phone);
            }
        }

        for entry in &account.contacts {
            let chat_id = entry.chat_id;
            for other in c.accounts.values_mut() {
                other.contacts.retain(|contact| contact.chat_id != chat_id);
            }
            c.chats.remove(&chat_id);
        }

        c.accounts.remove(&phone);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageBody;

    fn account(phone: i64, first: &str) -> Account {
        Account::new(
            phone,
            first.into(),
            "x".into(),
            "hash".into(),
            "q".into(),
            "a".into(),
        )
    }

    fn text(sender: i64, time: &str, body: &str) -> ChatMessage {
        ChatMessage {
            sender,
            time: time.into(),
            body: MessageBody::Text {
                message: body.into(),
            },
        }
    }

    async fn seed_pair(store: &MemoryStore) -> i32 {
        store.insert_account(account(1001, "A")).await.unwrap();
        store.insert_account(account(1002, "B")).await.unwrap();

        let chat_id = 77;
        store
            .create_chat(Chat {
                chat_id,
                messages: vec![text(chat_id as i64, "00:00", "Server: New Conversation")],
            })
            .await
            .unwrap();
        store
            .push_contact(
                1001,
                ContactEntry {
                    contact_id: 1002,
                    chat_id,
                    unread_messages: 1,
                },
            )
            .await
            .unwrap();
        store
            .push_contact(
                1002,
                ContactEntry {
                    contact_id: 1001,
                    chat_id,
                    unread_messages: 1,
                },
            )
            .await
            .unwrap();
        chat_id
    }

    #[tokio::test]
    async fn duplicate_inserts_are_reported() {
        let store = MemoryStore::new();
        assert!(store.insert_account(account(1001, "A")).await.unwrap());
        assert!(!store.insert_account(account(1001, "A2")).await.unwrap());

        assert!(store
            .create_chat(Chat {
                chat_id: 5,
                messages: vec![]
            })
            .await
            .unwrap());
        assert!(!store
            .create_chat(Chat {
                chat_id: 5,
                messages: vec![]
            })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unread_counter_is_positional_and_resettable() {
        let store = MemoryStore::new();
        let chat_id = seed_pair(&store).await;

        store.increment_unread(1002, chat_id).await.unwrap();
        store.increment_unread(1002, chat_id).await.unwrap();
        let b = store.find_account(1002).await.unwrap().unwrap();
        assert_eq!(b.contacts[0].unread_messages, 3);

        store.reset_unread(1002, chat_id).await.unwrap();
        store.reset_unread(1002, chat_id).await.unwrap();
        let b = store.find_account(1002).await.unwrap().unwrap();
        assert_eq!(b.contacts[0].unread_messages, 0);

        // Untouched counterpart.
        let a = store.find_account(1001).await.unwrap().unwrap();
        assert_eq!(a.contacts[0].unread_messages, 1);
    }

    #[tokio::test]
    async fn contacts_aggregation_preserves_shape_and_order() {
        let store = MemoryStore::new();
        let chat_id = seed_pair(&store).await;
        store
            .push_chat_message(chat_id, text(1001, "T1", "hi"))
            .await
            .unwrap();

        store.insert_account(account(1003, "C")).await.unwrap();
        store
            .create_chat(Chat {
                chat_id: 88,
                messages: vec![],
            })
            .await
            .unwrap();
        store
            .push_contact(
                1001,
                ContactEntry {
                    contact_id: 1003,
                    chat_id: 88,
                    unread_messages: 0,
                },
            )
            .await
            .unwrap();

        let rows = store.fetch_contacts_and_chats(1001).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].contact_info.phone_number, 1002);
        assert_eq!(rows[0].chat_id, chat_id);
        assert_eq!(rows[0].unread_messages, 1);
        assert_eq!(rows[0].chat_messages.len(), 2);
        assert_eq!(rows[1].contact_info.phone_number, 1003);
        assert!(rows[1].chat_messages.is_empty());
    }

    #[tokio::test]
    async fn contact_ids_are_deduplicated() {
        let store = MemoryStore::new();
        seed_pair(&store).await;
        // A second conversation with the same counterparty.
        store
            .push_contact(
                1001,
                ContactEntry {
                    contact_id: 1002,
                    chat_id: 99,
                    unread_messages: 0,
                },
            )
            .await
            .unwrap();

        let ids = store.fetch_contact_ids(1001).await.unwrap();
        assert_eq!(ids, vec![1002]);
        assert_eq!(store.fetch_contact_ids(4040).await.unwrap(), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn groups_aggregation_joins_unread_counters() {
        let store = MemoryStore::new();
        store.insert_account(account(1001, "A")).await.unwrap();
        store
            .create_group(Group {
                group_id: 9,
                group_name: "G".into(),
                group_image_url: "img".into(),
                group_admin: 1001,
                group_members: vec![1001, 1002],
                group_messages: vec![],
            })
            .await
            .unwrap();
        store
            .push_group_membership(
                1001,
                GroupEntry {
                    group_id: 9,
                    group_unread_messages: 1,
                },
            )
            .await
            .unwrap();
        store.increment_group_unread(1001, 9).await.unwrap();

        let rows = store.fetch_groups_and_chats(1001).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group_id, 9);
        assert_eq!(rows[0].group_unread_messages, 2);
        assert_eq!(rows[0].group_members, vec![1001, 1002]);
        assert_eq!(rows[0].group_admin, 1001);
    }

    #[tokio::test]
    async fn delete_account_cascades() {
        let store = MemoryStore::new();
        let chat_id = seed_pair(&store).await;
        store
            .create_group(Group {
                group_id: 9,
                group_name: "G".into(),
                group_image_url: "img".into(),
                group_admin: 1002,
                group_members: vec![1001, 1002],
                group_messages: vec![],
            })
            .await
            .unwrap();
        store
            .push_group_membership(
                1001,
                GroupEntry {
                    group_id: 9,
                    group_unread_messages: 1,
                },
            )
            .await
            .unwrap();

        store.delete_account(1001).await.unwrap();

        assert!(store.find_account(1001).await.unwrap().is_none());
        assert!(store.find_chat(chat_id).await.unwrap().is_none());
        let b = store.find_account(1002).await.unwrap().unwrap();
        assert!(b.contacts.iter().all(|entry| entry.chat_id != chat_id));
        let group = store.find_group(9).await.unwrap().unwrap();
        assert_eq!(group.group_members, vec![1002]);

        // Re-running a completed cascade is a no-op.
        store.delete_account(1001).await.unwrap();
    }

    #[tokio::test]
    async fn deleted_messages_are_pulled_by_time_key() {
        let store = MemoryStore::new();
        let chat_id = seed_pair(&store).await;
        store
            .push_chat_message(chat_id, text(1001, "T1", "one"))
            .await
            .unwrap();
        store
            .push_chat_message(chat_id, text(1001, "T2", "two"))
            .await
            .unwrap();

        store.pull_chat_message(chat_id, "T1").await.unwrap();
        let chat = store.find_chat(chat_id).await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 2);
        assert!(chat.messages.iter().all(|message| message.time != "T1"));
    }
}
