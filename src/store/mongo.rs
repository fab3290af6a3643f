//! MongoDB-backed `AccountStore`.
//!
//! A thin mirror of the trait operations onto the driver: `$set`,
//! `$push`, `$pull`, `$inc` with positional filters for the per-element
//! counters, and aggregation pipelines for the composite reads. The
//! logical database is `chatAppDB`.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, from_document, to_bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database};
use tracing::warn;

use crate::error::Error;
use crate::models::{
    Account, Chat, ChatMessage, ContactEntry, ContactWithChat, Group, GroupEntry, GroupMessage,
    GroupWithUnread,
};
use crate::store::AccountStore;

const DB_NAME: &str = "chatAppDB";

pub struct MongoStore {
    accounts: Collection<Account>,
    chats: Collection<Chat>,
    groups: Collection<Group>,
}

impl MongoStore {
    /// Connect to the document store at `uri` and bind the three
    /// collections.
    pub async fn connect(uri: &str) -> Result<Self, Error> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(client.database(DB_NAME)))
    }

    pub fn new(db: Database) -> Self {
        Self {
            accounts: db.collection("accounts"),
            chats: db.collection("chats"),
            groups: db.collection("groups"),
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

#[async_trait]
impl AccountStore for MongoStore {
    async fn insert_account(&self, account: Account) -> Result<bool, Error> {
        match self.accounts.insert_one(&account, None).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_account(&self, phone: i64) -> Result<Option<Account>, Error> {
        Ok(self.accounts.find_one(doc! {"_id": phone}, None).await?)
    }

    async fn set_status(&self, phone: i64, online: bool) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$set": {"status": online}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_image_url(&self, phone: i64, url: &str) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$set": {"image_url": url}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_name_and_password(
        &self,
        phone: i64,
        first_name: &str,
        last_name: &str,
        hashed_password: &str,
    ) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$set": {
                    "first_name": first_name,
                    "last_name": last_name,
                    "hashed_password": hashed_password,
                }},
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_hashed_password(&self, phone: i64, hashed_password: &str) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$set": {"hashed_password": hashed_password}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn push_contact(&self, phone: i64, entry: ContactEntry) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$push": {"contacts": to_bson(&entry)?}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn push_group_membership(&self, phone: i64, entry: GroupEntry) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$push": {"groups": to_bson(&entry)?}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn pull_group_membership(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone},
                doc! {"$pull": {"groups": {"groupID": group_id}}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn increment_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone, "contacts.chatID": chat_id},
                doc! {"$inc": {"contacts.$.unread_messages": 1_i64}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn reset_unread(&self, phone: i64, chat_id: i32) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone, "contacts.chatID": chat_id},
                doc! {"$set": {"contacts.$.unread_messages": 0_i64}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn increment_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone, "groups.groupID": group_id},
                doc! {"$inc": {"groups.$.group_unread_messages": 1_i64}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn reset_group_unread(&self, phone: i64, group_id: i32) -> Result<(), Error> {
        self.accounts
            .update_one(
                doc! {"_id": phone, "groups.groupID": group_id},
                doc! {"$set": {"groups.$.group_unread_messages": 0_i64}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn create_chat(&self, chat: Chat) -> Result<bool, Error> {
        match self.chats.insert_one(&chat, None).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_chat(&self, chat_id: i32) -> Result<Option<Chat>, Error> {
        Ok(self.chats.find_one(doc! {"_id": chat_id}, None).await?)
    }

    async fn push_chat_message(&self, chat_id: i32, message: ChatMessage) -> Result<(), Error> {
        self.chats
            .update_one(
                doc! {"_id": chat_id},
                doc! {"$push": {"messages": to_bson(&message)?}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn pull_chat_message(&self, chat_id: i32, full_time: &str) -> Result<(), Error> {
        self.chats
            .update_one(
                doc! {"_id": chat_id},
                doc! {"$pull": {"messages": {"time": full_time}}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn create_group(&self, group: Group) -> Result<bool, Error> {
        match self.groups.insert_one(&group, None).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_group(&self, group_id: i32) -> Result<Option<Group>, Error> {
        Ok(self.groups.find_one(doc! {"_id": group_id}, None).await?)
    }

    async fn set_group_image_url(&self, group_id: i32, url: &str) -> Result<(), Error> {
        self.groups
            .update_one(
                doc! {"_id": group_id},
                doc! {"$set": {"group_image_url": url}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn add_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error> {
        self.groups
            .update_one(
                doc! {"_id": group_id},
                doc! {"$push": {"group_members": {"$each": members.to_vec()}}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn remove_group_members(&self, group_id: i32, members: &[i64]) -> Result<(), Error> {
        self.groups
            .update_one(
                doc! {"_id": group_id},
                doc! {"$pull": {"group_members": {"$in": members.to_vec()}}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn push_group_message(&self, group_id: i32, message: GroupMessage) -> Result<(), Error> {
        self.groups
            .update_one(
                doc! {"_id": group_id},
                doc! {"$push": {"group_messages": to_bson(&message)?}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn pull_group_message(&self, group_id: i32, full_time: &str) -> Result<(), Error> {
        self.groups
            .update_one(
                doc! {"_id": group_id},
                doc! {"$pull": {"group_messages": {"time": full_time}}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn fetch_contacts_and_chats(&self, phone: i64) -> Result<Vec<ContactWithChat>, Error> {
        // Embeds the chat document directly instead of unwinding every
        // message and regrouping; same output shape, and transcripts
        // that are currently empty survive the join.
        let pipeline = vec![
            doc! {"$match": {"_id": phone}},
            doc! {"$unwind": "$contacts"},
            doc! {"$lookup": {
                "from": "accounts",
                "localField": "contacts.contactID",
                "foreignField": "_id",
                "as": "contactInfo",
            }},
            doc! {"$unwind": "$contactInfo"},
            doc! {"$lookup": {
                "from": "chats",
                "localField": "contacts.chatID",
                "foreignField": "_id",
                "as": "chatDoc",
            }},
            doc! {"$unwind": "$chatDoc"},
            doc! {"$project": {
                "_id": 0,
                "contactInfo": {
                    "_id": "$contactInfo._id",
                    "first_name": "$contactInfo.first_name",
                    "last_name": "$contactInfo.last_name",
                    "status": "$contactInfo.status",
                    "image_url": "$contactInfo.image_url",
                },
                "chatID": "$contacts.chatID",
                "unread_messages": "$contacts.unread_messages",
                "chatMessages": "$chatDoc.messages",
            }},
        ];

        let mut cursor = self.accounts.aggregate(pipeline, None).await?;
        let mut rows = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            rows.push(from_document::<ContactWithChat>(document)?);
        }
        Ok(rows)
    }

    async fn fetch_groups_and_chats(&self, phone: i64) -> Result<Vec<GroupWithUnread>, Error> {
        let pipeline = vec![
            doc! {"$match": {"_id": phone}},
            doc! {"$unwind": "$groups"},
            doc! {"$lookup": {
                "from": "groups",
                "localField": "groups.groupID",
                "foreignField": "_id",
                "as": "groupInfo",
            }},
            doc! {"$unwind": "$groupInfo"},
            doc! {"$project": {
                "_id": "$groupInfo._id",
                "group_name": "$groupInfo.group_name",
                "group_unread_messages": "$groups.group_unread_messages",
                "group_image_url": "$groupInfo.group_image_url",
                "group_admin": "$groupInfo.group_admin",
                "group_members": "$groupInfo.group_members",
                "group_messages": "$groupInfo.group_messages",
            }},
        ];

        let mut cursor = self.accounts.aggregate(pipeline, None).await?;
        let mut rows = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            rows.push(from_document::<GroupWithUnread>(document)?);
        }
        Ok(rows)
    }

    async fn delete_account(&self, phone: i64) -> Result<(), Error> {
        let Some(account) = self.find_account(phone).await? else {
            return Ok(());
        };

        for entry in &account.groups {
            if let Err(err) = self
                .groups
                .update_one(
                    doc! {"_id": entry.group_id},
                    doc! {"$pull": {"group_members": phone}},
                    None,
                )
                .await
            {
                warn!(phone, group_id = entry.group_id, %err, "cascade: group pull failed");
            }
        }

        for entry in &account.contacts {
            let chat_id = entry.chat_id;
            if let Err(err) = self
                .accounts
                .update_many(
                    doc! {"contacts.chatID": chat_id},
                    doc! {"$pull": {"contacts": {"chatID": chat_id}}},
                    None,
                )
                .await
            {
                warn!(phone, chat_id, %err, "cascade: contact pull failed");
            }
            if let Err(err) = self.chats.delete_one(doc! {"_id": chat_id}, None).await {
                warn!(phone, chat_id, %err, "cascade: chat delete failed");
            }
        }

        self.accounts.delete_one(doc! {"_id": phone}, None).await?;
        Ok(())
    }
}
