//! Frame handlers: one function per inbound message type.
//!
//! A handler mutates the store, optionally uploads to the blob store, then
//! pushes frames back to the sender and/or to other live sockets resolved
//! through the registry. Errors never escape: `dispatch` logs whatever a
//! handler could not absorb itself, and the session stays up. A recipient
//! that is offline, or whose socket is mid-close, is skipped without
//! failing the rest of a fan-out.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::blob::BlobStore;
use crate::error::Error;
use crate::models::{
    Account, Chat, ChatMessage, ContactEntry, ContactWithChat, Group, GroupEntry, GroupMessage,
    GroupWithUnread, MessageBody,
};
use crate::protocol::ClientFrame;
use crate::session::Session;
use crate::state::SharedState;
use crate::store::AccountStore;

/// How many fresh random IDs to try before giving up on an insert that
/// keeps colliding.
const ID_ALLOCATION_ATTEMPTS: u32 = 8;

/// Route one decoded frame to its handler. The session has already gated
/// authentication; the `(None, _)` arm only fires if that gate and this
/// table ever disagree.
pub async fn dispatch(session: &mut Session, frame: ClientFrame) {
    let kind = frame.kind();
    let result = match (session.identity(), frame) {
        (_, ClientFrame::SignUp {
            phone_number,
            first_name,
            last_name,
            password,
            secret_question,
            secret_answer,
        }) => {
            sign_up(
                session,
                phone_number,
                first_name,
                last_name,
                password,
                secret_question,
                secret_answer,
            )
            .await
        }
        (_, ClientFrame::LoginRequest {
            phone_number,
            password,
            time_zone,
        }) => login_request(session, phone_number, password, time_zone).await,
        (_, ClientFrame::RetrieveQuestion { phone_number }) => {
            retrieve_question(session, phone_number).await
        }
        (_, ClientFrame::UpdatePassword {
            phone_number,
            password,
        }) => update_password(session, phone_number, password).await,
        (_, ClientFrame::NewPasswordRequest) => {
            // The recovery flow is client-driven through retrieve_question
            // and update_password; this frame carries nothing to act on.
            debug!("new_password_request acknowledged");
            Ok(())
        }

        (Some(me), ClientFrame::LookupFriend { phone_number }) => {
            lookup_friend(session, me, phone_number).await
        }
        (Some(me), ClientFrame::Text {
            receiver,
            message,
            time,
            chat_id,
        }) => text(session, me, receiver, message, time, chat_id).await,
        (Some(me), ClientFrame::File {
            receiver,
            file_name,
            file_data,
            time,
            chat_id,
        }) => file(session, me, receiver, file_name, file_data, time, chat_id).await,
        (Some(me), ClientFrame::Audio {
            receiver,
            audio_name,
            audio_data,
            time,
            chat_id,
        }) => audio(session, me, receiver, audio_name, audio_data, time, chat_id).await,
        (Some(me), ClientFrame::NewGroup {
            group_name,
            group_members,
        }) => new_group(session, me, group_name, group_members).await,
        (Some(me), ClientFrame::GroupText {
            group_id,
            message,
            time,
            sender_name,
        }) => group_text(session, me, group_id, message, time, sender_name).await,
        (Some(me), ClientFrame::GroupFile {
            group_id,
            file_name,
            file_data,
            time,
            sender_name,
        }) => {
            group_file(
                session,
                me,
                group_id,
                file_name,
                file_data,
                time,
                sender_name,
            )
            .await
        }
        (Some(me), ClientFrame::GroupAudio {
            group_id,
            audio_name,
            audio_data,
            time,
            sender_name,
        }) => {
            group_audio(
                session,
                me,
                group_id,
                audio_name,
                audio_data,
                time,
                sender_name,
            )
            .await
        }
        (Some(me), ClientFrame::IsTyping { receiver }) => is_typing(session, me, receiver).await,
        (Some(me), ClientFrame::GroupIsTyping {
            group_id,
            sender_name,
        }) => group_is_typing(session, me, group_id, sender_name).await,
        (Some(me), ClientFrame::ProfileImage {
            file_name,
            file_data,
        }) => profile_image(session, me, file_name, file_data).await,
        (Some(_), ClientFrame::GroupProfileImage {
            group_id,
            file_name,
            file_data,
        }) => group_profile_image(session, group_id, file_name, file_data).await,
        (Some(me), ClientFrame::ProfileImageDeleted) => profile_image_deleted(session, me).await,
        (Some(me), ClientFrame::UpdateInfo {
            first_name,
            last_name,
            password,
        }) => update_info(session, me, first_name, last_name, password).await,
        (Some(_), ClientFrame::AddGroupMember {
            group_id,
            member_list,
        }) => add_group_member(session, group_id, member_list).await,
        (Some(_), ClientFrame::RemoveGroupMember {
            group_id,
            member_list,
        }) => remove_group_member(session, group_id, member_list).await,
        (Some(_), ClientFrame::DeleteMessage {
            receiver,
            chat_id,
            full_time,
        }) => delete_message(session, receiver, chat_id, full_time).await,
        (Some(_), ClientFrame::DeleteGroupMessage {
            group_id,
            full_time,
        }) => delete_group_message(session, group_id, full_time).await,
        (Some(me), ClientFrame::UpdateUnreadMessage { chat_id }) => {
            session.state().store.reset_unread(me, chat_id).await
        }
        (Some(me), ClientFrame::UpdateGroupUnreadMessage { group_id }) => {
            session.state().store.reset_group_unread(me, group_id).await
        }
        (Some(me), ClientFrame::DeleteAccount) => delete_account(session, me).await,

        (None, frame) => {
            warn!(kind = frame.kind(), "authenticated-only frame slipped the gate");
            Ok(())
        }
    };

    if let Err(err) = result {
        error!(kind, %err, "handler failed");
    }
}

// ── account lifecycle ──

async fn sign_up(
    session: &Session,
    phone_number: i64,
    first_name: String,
    last_name: String,
    password: String,
    secret_question: String,
    secret_answer: String,
) -> Result<(), Error> {
    let state = session.state();

    let created = match state.hasher.hash(&password) {
        Ok(hashed) => {
            let account = Account::new(
                phone_number,
                first_name,
                last_name,
                hashed,
                secret_question,
                secret_answer,
            );
            match state.store.insert_account(account).await {
                Ok(created) => created,
                Err(err) => {
                    error!(phone_number, %err, "sign_up: insert failed");
                    false
                }
            }
        }
        Err(err) => {
            error!(%err, "sign_up: password hashing failed");
            false
        }
    };

    let (status, message) = if created {
        ("succeeded", "Account Created Successfully")
    } else {
        ("failed", "Failed to Create Account, try again")
    };
    session.send(&json!({
        "type": "sign_up",
        "status": status,
        "message": message,
    }));
    Ok(())
}

async fn login_request(
    session: &mut Session,
    phone_number: i64,
    password: String,
    time_zone: String,
) -> Result<(), Error> {
    let state = session.state().clone();

    let account = match state.store.find_account(phone_number).await {
        Ok(account) => account,
        Err(err) => {
            error!(phone_number, %err, "login: account load failed");
            session.send(&json!({
                "type": "login_request",
                "status": "failed",
                "message": "Server error, try again later",
            }));
            return Ok(());
        }
    };

    let Some(account) = account else {
        session.send(&json!({
            "type": "login_request",
            "status": "failed",
            "message": "Account Doesn't exist in our Database, verify and try again",
        }));
        return Ok(());
    };

    if !state.hasher.verify(&password, &account.hashed_password) {
        session.send(&json!({
            "type": "login_request",
            "status": "failed",
            "message": "Password Incorrect",
        }));
        return Ok(());
    }

    info!(phone_number, "client connected");
    session.set_identity(phone_number);
    state
        .registry
        .insert(phone_number, session.sender(), time_zone)
        .await;

    if let Err(err) = state.store.set_status(phone_number, true).await {
        error!(phone_number, %err, "login: status update failed");
    }

    let contacts = state
        .store
        .fetch_contacts_and_chats(phone_number)
        .await
        .unwrap_or_else(|err| {
            error!(phone_number, %err, "login: contact aggregation failed");
            Vec::new()
        });
    let groups = state
        .store
        .fetch_groups_and_chats(phone_number)
        .await
        .unwrap_or_else(|err| {
            error!(phone_number, %err, "login: group aggregation failed");
            Vec::new()
        });

    session.send(&json!({
        "type": "login_request",
        "status": "succeeded",
        "message": "loading your data...",
        "my_info": account,
        "contacts": contacts,
        "groups": groups,
    }));

    let frame = json!({"type": "client_connected", "phone_number": phone_number});
    broadcast_to_contacts(&state, phone_number, &frame).await;
    Ok(())
}

async fn retrieve_question(session: &Session, phone_number: i64) -> Result<(), Error> {
    let account = session.state().store.find_account(phone_number).await?;
    if account.is_none() {
        warn!(phone_number, "secret question requested for unknown account");
    }
    let (question, answer) = account
        .map(|account| (account.secret_question, account.secret_answer))
        .unwrap_or_default();

    session.send(&json!({
        "type": "question_answer",
        "secret_question": question,
        "secret_answer": answer,
    }));
    Ok(())
}

async fn update_password(
    session: &Session,
    phone_number: i64,
    password: String,
) -> Result<(), Error> {
    let state = session.state();
    let hashed = state.hasher.hash(&password)?;
    state
        .store
        .set_hashed_password(phone_number, &hashed)
        .await?;
    info!(phone_number, "password updated");
    Ok(())
}

async fn update_info(
    session: &Session,
    me: i64,
    first_name: String,
    last_name: String,
    password: String,
) -> Result<(), Error> {
    let state = session.state();
    let hashed = state.hasher.hash(&password)?;
    state
        .store
        .set_name_and_password(me, &first_name, &last_name, &hashed)
        .await?;

    let frame = json!({
        "type": "contact_info_updated",
        "phone_number": me,
        "first_name": first_name,
        "last_name": last_name,
    });
    broadcast_to_contacts(state, me, &frame).await;
    Ok(())
}

async fn delete_account(session: &mut Session, me: i64) -> Result<(), Error> {
    let state = session.state().clone();
    state.store.delete_account(me).await?;
    state.registry.remove(me).await;
    session.clear_identity();
    info!(phone = me, "account deleted");
    Ok(())
}

// ── contacts and 1:1 messaging ──

async fn lookup_friend(session: &Session, me: i64, phone_number: i64) -> Result<(), Error> {
    let state = session.state();

    let target = match state.store.find_account(phone_number).await {
        Ok(target) => target,
        Err(err) => {
            error!(phone_number, %err, "lookup_friend: target load failed");
            return Ok(());
        }
    };
    let Some(target) = target else {
        session.send(&json!({
            "type": "lookup_friend",
            "status": "failed",
            "message": format!("The Account: {phone_number} doesn't exist in our Database"),
        }));
        return Ok(());
    };

    let chat = allocate_chat(state).await?;
    let chat_id = chat.chat_id;

    if me != phone_number {
        state
            .store
            .push_contact(
                phone_number,
                ContactEntry {
                    contact_id: me,
                    chat_id,
                    unread_messages: 1,
                },
            )
            .await?;
    }

    if state.registry.contains(phone_number).await {
        if let Ok(Some(requester)) = state.store.find_account(me).await {
            let row = ContactWithChat {
                contact_info: requester.contact_info(),
                chat_id,
                unread_messages: 1,
                chat_messages: chat.messages.clone(),
            };
            let frame = json!({
                "type": "added_you",
                "message": format!("{me} added You"),
                "json_array": [row],
            });
            state.registry.send_to(phone_number, &frame).await;
        }
    }

    state
        .store
        .push_contact(
            me,
            ContactEntry {
                contact_id: phone_number,
                chat_id,
                unread_messages: 1,
            },
        )
        .await?;

    let row = ContactWithChat {
        contact_info: target.contact_info(),
        chat_id,
        unread_messages: 1,
        chat_messages: chat.messages,
    };
    session.send(&json!({
        "type": "lookup_friend",
        "status": "succeeded",
        "message": format!(
            "{phone_number} also known as {} is now Your friend",
            target.first_name
        ),
        "json_array": [row],
    }));
    Ok(())
}

async fn text(
    session: &Session,
    me: i64,
    receiver: i64,
    message: String,
    time: String,
    chat_id: i32,
) -> Result<(), Error> {
    let record = ChatMessage {
        sender: me,
        time,
        body: MessageBody::Text { message },
    };
    deliver_chat_message(session, "text", receiver, chat_id, record).await
}

async fn file(
    session: &Session,
    me: i64,
    receiver: i64,
    file_name: String,
    file_data: String,
    time: String,
    chat_id: i32,
) -> Result<(), Error> {
    let file_url = upload_media(session.state(), &file_name, &file_data).await?;
    let record = ChatMessage {
        sender: me,
        time,
        body: MessageBody::File { file_url },
    };
    deliver_chat_message(session, "file", receiver, chat_id, record).await
}

async fn audio(
    session: &Session,
    me: i64,
    receiver: i64,
    audio_name: String,
    audio_data: String,
    time: String,
    chat_id: i32,
) -> Result<(), Error> {
    let audio_url = upload_media(session.state(), &audio_name, &audio_data).await?;
    let record = ChatMessage {
        sender: me,
        time,
        body: MessageBody::Audio { audio_url },
    };
    deliver_chat_message(session, "audio", receiver, chat_id, record).await
}

/// Echo to the sender, forward to the receiver if online, append to the
/// transcript, bump the receiver's unread counter.
async fn deliver_chat_message(
    session: &Session,
    kind: &str,
    receiver: i64,
    chat_id: i32,
    record: ChatMessage,
) -> Result<(), Error> {
    let state = session.state();
    let frame = tagged_frame(kind, "chatID", chat_id, &record)?;

    session.send(&frame);
    state.registry.send_to(receiver, &frame).await;

    state.store.push_chat_message(chat_id, record).await?;
    state.store.increment_unread(receiver, chat_id).await?;
    Ok(())
}

async fn is_typing(session: &Session, me: i64, receiver: i64) -> Result<(), Error> {
    session
        .state()
        .registry
        .send_to(receiver, &json!({"type": "is_typing", "sender": me}))
        .await;
    Ok(())
}

async fn delete_message(
    session: &Session,
    receiver: i64,
    chat_id: i32,
    full_time: String,
) -> Result<(), Error> {
    let state = session.state();
    let frame = json!({
        "type": "delete_message",
        "chatID": chat_id,
        "full_time": full_time,
    });
    session.send(&frame);
    state.registry.send_to(receiver, &frame).await;

    state.store.pull_chat_message(chat_id, &full_time).await?;
    Ok(())
}

// ── profile images ──

async fn profile_image(
    session: &Session,
    me: i64,
    file_name: String,
    file_data: String,
) -> Result<(), Error> {
    let state = session.state();
    let image_url = upload_media(state, &file_name, &file_data).await?;
    state.store.set_image_url(me, &image_url).await?;

    session.send(&json!({"type": "profile_image", "image_url": image_url}));

    let frame = json!({
        "type": "client_profile_image",
        "phone_number": me,
        "image_url": image_url,
    });
    broadcast_to_contacts(state, me, &frame).await;
    Ok(())
}

async fn profile_image_deleted(session: &Session, me: i64) -> Result<(), Error> {
    let state = session.state();
    let image_url = state.assets.default_avatar.clone();
    state.store.set_image_url(me, &image_url).await?;

    let frame = json!({
        "type": "client_profile_image",
        "phone_number": me,
        "image_url": image_url,
    });
    broadcast_to_contacts(state, me, &frame).await;
    Ok(())
}

async fn group_profile_image(
    session: &Session,
    group_id: i32,
    file_name: String,
    file_data: String,
) -> Result<(), Error> {
    let state = session.state();
    let image_url = upload_media(state, &file_name, &file_data).await?;
    state.store.set_group_image_url(group_id, &image_url).await?;

    if let Some(group) = state.store.find_group(group_id).await? {
        let frame = json!({
            "type": "group_profile_image",
            "groupID": group_id,
            "group_image_url": image_url,
        });
        state
            .registry
            .send_to_many(&group.group_members, &frame)
            .await;
    }
    Ok(())
}

// ── groups ──

async fn new_group(
    session: &Session,
    me: i64,
    group_name: String,
    group_members: Vec<i64>,
) -> Result<(), Error> {
    let state = session.state();
    let group = allocate_group(state, me, group_name, group_members).await?;

    let row = group_with_unread(&group, 1);
    let frame = json!({"type": "added_to_group", "groups": [row]});

    for member in &group.group_members {
        if let Err(err) = state
            .store
            .push_group_membership(
                *member,
                GroupEntry {
                    group_id: group.group_id,
                    group_unread_messages: 1,
                },
            )
            .await
        {
            warn!(member, group_id = group.group_id, %err, "new_group: membership push failed");
        }
        state.registry.send_to(*member, &frame).await;
    }

    info!(group_id = group.group_id, admin = me, "group created");
    Ok(())
}

async fn add_group_member(
    session: &Session,
    group_id: i32,
    member_list: Vec<i64>,
) -> Result<(), Error> {
    let state = session.state();
    state.store.add_group_members(group_id, &member_list).await?;

    let Some(group) = state.store.find_group(group_id).await? else {
        warn!(group_id, "add_group_member: group vanished after update");
        return Ok(());
    };

    for member in &member_list {
        if let Err(err) = state
            .store
            .push_group_membership(
                *member,
                GroupEntry {
                    group_id,
                    group_unread_messages: 1,
                },
            )
            .await
        {
            warn!(member, group_id, %err, "add_group_member: membership push failed");
        }
    }

    let row = group_with_unread(&group, 1);
    let added = json!({"type": "added_to_group", "groups": [row]});
    state.registry.send_to_many(&member_list, &added).await;

    let existing: Vec<i64> = group
        .group_members
        .iter()
        .copied()
        .filter(|member| !member_list.contains(member))
        .collect();
    let notice = json!({
        "type": "add_group_member",
        "groupID": group_id,
        "member_list": member_list,
    });
    state.registry.send_to_many(&existing, &notice).await;
    Ok(())
}

async fn remove_group_member(
    session: &Session,
    group_id: i32,
    member_list: Vec<i64>,
) -> Result<(), Error> {
    let state = session.state();
    state
        .store
        .remove_group_members(group_id, &member_list)
        .await?;

    for member in &member_list {
        if let Err(err) = state.store.pull_group_membership(*member, group_id).await {
            warn!(member, group_id, %err, "remove_group_member: membership pull failed");
        }
    }

    let removed = json!({"type": "removed_from_group", "groupID": group_id});
    state.registry.send_to_many(&member_list, &removed).await;

    if let Some(group) = state.store.find_group(group_id).await? {
        let notice = json!({
            "type": "remove_group_member",
            "groupID": group_id,
            "member_list": member_list,
        });
        state
            .registry
            .send_to_many(&group.group_members, &notice)
            .await;
    }
    Ok(())
}

async fn group_text(
    session: &Session,
    me: i64,
    group_id: i32,
    message: String,
    time: String,
    sender_name: String,
) -> Result<(), Error> {
    let record = GroupMessage {
        sender_id: me,
        sender_name,
        time,
        body: MessageBody::Text { message },
    };
    deliver_group_message(session.state(), "group_text", group_id, record).await
}

async fn group_file(
    session: &Session,
    me: i64,
    group_id: i32,
    file_name: String,
    file_data: String,
    time: String,
    sender_name: String,
) -> Result<(), Error> {
    let file_url = upload_media(session.state(), &file_name, &file_data).await?;
    let record = GroupMessage {
        sender_id: me,
        sender_name,
        time,
        body: MessageBody::File { file_url },
    };
    deliver_group_message(session.state(), "group_file", group_id, record).await
}

async fn group_audio(
    session: &Session,
    me: i64,
    group_id: i32,
    audio_name: String,
    audio_data: String,
    time: String,
    sender_name: String,
) -> Result<(), Error> {
    let audio_url = upload_media(session.state(), &audio_name, &audio_data).await?;
    let record = GroupMessage {
        sender_id: me,
        sender_name,
        time,
        body: MessageBody::Audio { audio_url },
    };
    deliver_group_message(session.state(), "group_audio", group_id, record).await
}

/// Fan out to every online member, bump every member's unread counter,
/// append to the group transcript.
async fn deliver_group_message(
    state: &SharedState,
    kind: &str,
    group_id: i32,
    record: GroupMessage,
) -> Result<(), Error> {
    let Some(group) = state.store.find_group(group_id).await? else {
        warn!(group_id, "message for unknown group dropped");
        return Ok(());
    };

    let frame = tagged_frame(kind, "groupID", group_id, &record)?;
    state
        .registry
        .send_to_many(&group.group_members, &frame)
        .await;

    for member in &group.group_members {
        if let Err(err) = state.store.increment_group_unread(*member, group_id).await {
            warn!(member, group_id, %err, "group unread increment failed");
        }
    }

    state.store.push_group_message(group_id, record).await?;
    Ok(())
}

async fn group_is_typing(
    session: &Session,
    me: i64,
    group_id: i32,
    sender_name: String,
) -> Result<(), Error> {
    let state = session.state();
    let Some(group) = state.store.find_group(group_id).await? else {
        return Ok(());
    };

    let others: Vec<i64> = group
        .group_members
        .iter()
        .copied()
        .filter(|member| *member != me)
        .collect();
    let frame = json!({
        "type": "group_is_typing",
        "groupID": group_id,
        "sender_name": sender_name,
    });
    state.registry.send_to_many(&others, &frame).await;
    Ok(())
}

async fn delete_group_message(
    session: &Session,
    group_id: i32,
    full_time: String,
) -> Result<(), Error> {
    let state = session.state();

    if let Some(group) = state.store.find_group(group_id).await? {
        let frame = json!({
            "type": "delete_group_message",
            "groupID": group_id,
            "full_time": full_time,
        });
        state
            .registry
            .send_to_many(&group.group_members, &frame)
            .await;
    }

    state.store.pull_group_message(group_id, &full_time).await?;
    Ok(())
}

// ── shared helpers ──

/// Deliver one frame to every contact of `phone` that is online.
pub(crate) async fn broadcast_to_contacts(state: &SharedState, phone: i64, frame: &Value) {
    match state.store.fetch_contact_ids(phone).await {
        Ok(contact_ids) => {
            state.registry.send_to_many(&contact_ids, frame).await;
        }
        Err(err) => error!(phone, %err, "contact fan-out failed"),
    }
}

/// Base64-decode a media payload and store it, returning the fetch URL.
/// Aborts the calling handler before anything is persisted.
async fn upload_media(state: &SharedState, name: &str, data: &str) -> Result<String, Error> {
    let bytes = BASE64
        .decode(data)
        .map_err(|err| Error::InvalidPayload(format!("base64 media payload: {err}")))?;
    state.blobs.put(name, &bytes).await
}

/// Serialize a message record and stamp the frame discriminator and
/// conversation ID onto it.
fn tagged_frame<T: serde::Serialize>(
    kind: &str,
    id_key: &str,
    id: i32,
    record: &T,
) -> Result<Value, Error> {
    let mut frame = serde_json::to_value(record)?;
    let Some(map) = frame.as_object_mut() else {
        return Err(Error::InvalidPayload("message record is not an object".into()));
    };
    map.insert("type".into(), kind.into());
    map.insert(id_key.into(), id.into());
    Ok(frame)
}

fn random_id() -> i32 {
    rand::thread_rng().gen_range(1..=i32::MAX)
}

/// Wall-clock HH:MM stamp for server-authored messages.
fn clock_time() -> String {
    Utc::now().format("%H:%M").to_string()
}

/// Insert a new chat under a fresh uniformly random ID, retrying on
/// collision. The transcript starts with one server-authored message.
async fn allocate_chat(state: &SharedState) -> Result<Chat, Error> {
    for _ in 0..ID_ALLOCATION_ATTEMPTS {
        let chat_id = random_id();
        let chat = Chat {
            chat_id,
            messages: vec![ChatMessage {
                sender: chat_id as i64,
                time: clock_time(),
                body: MessageBody::Text {
                    message: "Server: New Conversation".into(),
                },
            }],
        };
        if state.store.create_chat(chat.clone()).await? {
            return Ok(chat);
        }
        debug!(chat_id, "chat id collision, retrying");
    }
    Err(Error::IdAllocation(ID_ALLOCATION_ATTEMPTS))
}

/// Insert a new group under a fresh ID, retrying on collision.
async fn allocate_group(
    state: &SharedState,
    admin: i64,
    group_name: String,
    group_members: Vec<i64>,
) -> Result<Group, Error> {
    for _ in 0..ID_ALLOCATION_ATTEMPTS {
        let group_id = random_id();
        let group = Group {
            group_id,
            group_name: group_name.clone(),
            group_image_url: state.assets.default_group_image.clone(),
            group_admin: admin,
            group_members: group_members.clone(),
            group_messages: vec![GroupMessage {
                sender_id: group_id as i64,
                sender_name: "Server".into(),
                time: clock_time(),
                body: MessageBody::Text {
                    message: "Server: New Group".into(),
                },
            }],
        };
        if state.store.create_group(group.clone()).await? {
            return Ok(group);
        }
        debug!(group_id, "group id collision, retrying");
    }
    Err(Error::IdAllocation(ID_ALLOCATION_ATTEMPTS))
}

fn group_with_unread(group: &Group, unread: i64) -> GroupWithUnread {
    GroupWithUnread {
        group_id: group.group_id,
        group_name: group.group_name.clone(),
        group_unread_messages: unread,
        group_image_url: group.group_image_url.clone(),
        group_admin: group.group_admin,
        group_members: group.group_members.clone(),
        group_messages: group.group_messages.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, MessageBody};

    #[test]
    fn tagged_frames_carry_discriminator_and_conversation_id() {
        let record = ChatMessage {
            sender: 1001,
            time: "T1".into(),
            body: MessageBody::Text {
                message: "hi".into(),
            },
        };
        let frame = tagged_frame("text", "chatID", 42, &record).unwrap();
        assert_eq!(frame["type"], "text");
        assert_eq!(frame["chatID"], 42);
        assert_eq!(frame["sender"], 1001);
        assert_eq!(frame["message"], "hi");
    }

    #[test]
    fn random_ids_stay_in_the_positive_32_bit_range() {
        for _ in 0..1000 {
            assert!(random_id() >= 1);
        }
    }

    #[test]
    fn clock_time_is_hh_mm() {
        let stamp = clock_time();
        assert_eq!(stamp.len(), 5);
        assert_eq!(stamp.as_bytes()[2], b':');
    }
}
