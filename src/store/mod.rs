//! Persistence over the three logical collections: `accounts`, `chats`,
//! `groups`.
//!
//! All state mutation and the composite aggregations live behind
//! [`AccountStore`] so sessions can be wired to the MongoDB-backed
//! [`MongoStore`] in production and the [`MemoryStore`] fake in tests.
//! Operations are per-element where the handlers need them per-element
//! (positional unread counters). Nothing here is transactional; the
//! account-deletion cascade is best-effort and re-runnable.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{
    Account, Chat, ChatMessage, ContactEntry, ContactWithChat, Group, GroupEntry, GroupMessage,
    GroupWithUnread,
};

#[async_trait]
pub trait AccountStore: Send + Sync {
    // ── accounts ──

    /// Insert a new account. Returns false when the phone number is
    /// already taken.
    async fn insert_account(&self, account: Account) -> Result<bool, Error>;

    async fn find_account(&self, phone: i64) -> Result<Option<Account>, Error>;

    async fn set_status(&self, phone: i64, online: bool) -> Result<(), Error>;

    async fn set_image_url(&self, phone: i64, url: &str) -> Result<(), Error>;

    async fn set_name_and_password(
        &self,
        phone: i64,
        first_name: &str,
        last_name: &str,
        hashed_password: &str,
    ) -> Result<(), Error>;

    async fn set_hashed_password(&self, phone: i64, hashed_password: &str) -> Result<(), Error>;

    async fn push_contact(&self, phone: i64, entry: ContactEntry) -> Result<(), Error>;

    async fn push_group_membership(&self, phone: i64, entry: GroupEntry) -> Result<(), Error>;

    async fn pull_group_membership(&self, phone: i64, group_id: i32) -> Result<(), Error>;

    /// `contacts.$.unread_messages += 1` for the entry matching `chat_id`.
    async fn increment_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error>;

    /// `contacts.$.unread_messages = 0` for the entry matching `chat_id`.
    async fn reset_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error>;

    async fn increment_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error>;

    async fn reset_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error>;

    // ── chats ──

    /// Insert a new chat document. Returns false on an ID collision so
    /// the caller can retry with a fresh ID.
    async fn create_chat(&self, chat: Chat) -> Result<bool, Error>;

    async fn find_chat(&self, chat_id: i32) -> Result<Option<Chat>, Error>;

    async fn push_chat_message(&self, chat_id: i32, message: ChatMessage) -> Result<(), Error>;

    /// Remove the message whose `time` equals `full_time`.
    async fn pull_chat_message(&self, chat_id: i32, full_time: &str) -> Result<(), Error>;

    // ── groups ──

    /// Insert a new group document. Returns false on an ID collision.
    async fn create_group(&self, group: Group) -> Result<bool, Error>;

    async fn find_group(&self, group_id: i32) -> Result<Option<Group>, Error>;

    async fn set_group_image_url(&self, group_id: i32, url: &str) -> Result<(), Error>;

    async fn add_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error>;

    async fn remove_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error>;

    async fn push_group_message(&self, group_id: i32, message: GroupMessage) -> Result<(), Error>;

    async fn pull_group_message(&self, group_id: i32, full_time: &str) -> Result<(), Error>;

    // ── aggregations ──

    /// For each of the account's contacts, the contact's public info
    /// joined with the full transcript of the shared chat. Order of the
    /// `contacts` array is preserved; contacts whose account or chat
    /// document is missing are skipped.
    async fn fetch_contacts_and_chats(&self, phone: i64) -> Result<Vec<ContactWithChat>, Error>;

    /// For each of the account's groups, the group record joined with
    /// the account's unread counter for it.
    async fn fetch_groups_and_chats(&self, phone: i64) -> Result<Vec<GroupWithUnread>, Error>;

    /// Flat, de-duplicated list of the account's contact phone numbers.
    /// Empty when the account does not exist.
    async fn fetch_contact_ids(&self, phone: i64) -> Result<Vec<i64>, Error> {
        let Some(account) = self.find_account(phone).await? else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(account
            .contacts
            .iter()
            .map(|entry| entry.contact_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    // ── cascade ──

    /// Delete an account and everything that references it: pull it from
    /// every group it belongs to, pull its shared chats from every
    /// counterparty's contacts, delete those chat documents, then delete
    /// the account itself. Best-effort: a failed step is logged and the
    /// remaining steps still run, so a partial delete completes on re-run.
    async fn delete_account(&self, phone: i64) -> Result<(), Error>;
}
