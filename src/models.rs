//! Persisted document types for the three logical collections
//! (`accounts`, `chats`, `groups`) and the record shapes returned by the
//! store's composite aggregations.
//!
//! Field names are wire names: these structs serialize both into the
//! document store and into outbound JSON frames, so the protocol's mixed
//! `camelCase`/`snake_case` naming is preserved via serde renames.

use serde::{Deserialize, Serialize};

/// One entry of an account's `contacts` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    #[serde(rename = "contactID")]
    pub contact_id: i64,
    #[serde(rename = "chatID")]
    pub chat_id: i32,
    pub unread_messages: i64,
}

/// One entry of an account's `groups` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(rename = "groupID")]
    pub group_id: i32,
    pub group_unread_messages: i64,
}

/// A user account, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub phone_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub image_url: String,
    /// True while an authenticated session is connected.
    pub status: bool,
    pub hashed_password: String,
    pub secret_question: String,
    pub secret_answer: String,
    pub contacts: Vec<ContactEntry>,
    pub groups: Vec<GroupEntry>,
}

impl Account {
    /// Fresh account as created by sign-up: offline, no image, no
    /// contacts, no groups.
    pub fn new(
        phone_number: i64,
        first_name: String,
        last_name: String,
        hashed_password: String,
        secret_question: String,
        secret_answer: String,
    ) -> Self {
        Self {
            phone_number,
            first_name,
            last_name,
            image_url: String::new(),
            status: false,
            hashed_password,
            secret_question,
            secret_answer,
            contacts: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// The public projection of this account sent to other clients.
    pub fn contact_info(&self) -> ContactInfo {
        ContactInfo {
            phone_number: self.phone_number,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            status: self.status,
            image_url: self.image_url.clone(),
        }
    }
}

/// Message payload: exactly one of a text body, a file URL, or an audio
/// URL. Untagged so the persisted document carries just the one field
/// that is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text { message: String },
    File { file_url: String },
    Audio { audio_url: String },
}

/// One record of a chat's `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: i64,
    /// Opaque sender-chosen timestamp; only compared verbatim when a
    /// message is deleted.
    pub time: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// A 1:1 conversation document, keyed by chat ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    #[serde(rename = "_id")]
    pub chat_id: i32,
    pub messages: Vec<ChatMessage>,
}

/// One record of a group's `group_messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    #[serde(rename = "sender_ID")]
    pub sender_id: i64,
    pub sender_name: String,
    pub time: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// A multi-user conversation document, keyed by group ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub group_id: i32,
    pub group_name: String,
    pub group_image_url: String,
    pub group_admin: i64,
    /// Flat member array.
    pub group_members: Vec<i64>,
    pub group_messages: Vec<GroupMessage>,
}

/// Public account projection embedded in contact listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(rename = "_id")]
    pub phone_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: bool,
    pub image_url: String,
}

/// One row of `fetch_contacts_and_chats`: a contact joined with the full
/// transcript of the shared conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactWithChat {
    #[serde(rename = "contactInfo")]
    pub contact_info: ContactInfo,
    #[serde(rename = "chatID")]
    pub chat_id: i32,
    pub unread_messages: i64,
    #[serde(rename = "chatMessages")]
    pub chat_messages: Vec<ChatMessage>,
}

/// One row of `fetch_groups_and_chats`: a group record joined with the
/// account's per-group unread counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWithUnread {
    #[serde(rename = "_id")]
    pub group_id: i32,
    pub group_name: String,
    pub group_unread_messages: i64,
    pub group_image_url: String,
    pub group_admin: i64,
    pub group_members: Vec<i64>,
    pub group_messages: Vec<GroupMessage>,
}
