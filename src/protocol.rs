//! Inbound wire protocol.
//!
//! Every frame is one JSON object with a string `type` discriminator. The
//! set of recognized types is closed: anything else fails to parse and is
//! logged and dropped by the session. Outbound frames are assembled ad hoc
//! with `serde_json::json!` in the handlers.

use serde::Deserialize;

/// A decoded client frame, discriminated by the `type` field.
///
/// Numeric IDs follow the persisted model: phone numbers are 64-bit,
/// chat and group IDs 32-bit. Binary payloads (`file_data`, `audio_data`)
/// arrive base64-encoded with a paired name field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "sign_up")]
    SignUp {
        phone_number: i64,
        first_name: String,
        last_name: String,
        password: String,
        secret_question: String,
        secret_answer: String,
    },
    #[serde(rename = "login_request")]
    LoginRequest {
        phone_number: i64,
        password: String,
        #[serde(default)]
        time_zone: String,
    },
    #[serde(rename = "lookup_friend")]
    LookupFriend { phone_number: i64 },
    #[serde(rename = "profile_image")]
    ProfileImage { file_name: String, file_data: String },
    #[serde(rename = "group_profile_image")]
    GroupProfileImage {
        #[serde(rename = "groupID")]
        group_id: i32,
        file_name: String,
        file_data: String,
    },
    #[serde(rename = "profile_image_deleted")]
    ProfileImageDeleted,
    #[serde(rename = "text")]
    Text {
        receiver: i64,
        message: String,
        time: String,
        #[serde(rename = "chatID")]
        chat_id: i32,
    },
    #[serde(rename = "file")]
    File {
        receiver: i64,
        file_name: String,
        file_data: String,
        time: String,
        #[serde(rename = "chatID")]
        chat_id: i32,
    },
    #[serde(rename = "audio")]
    Audio {
        receiver: i64,
        audio_name: String,
        audio_data: String,
        time: String,
        #[serde(rename = "chatID")]
        chat_id: i32,
    },
    #[serde(rename = "new_group")]
    NewGroup {
        group_name: String,
        group_members: Vec<i64>,
    },
    #[serde(rename = "group_text")]
    GroupText {
        #[serde(rename = "groupID")]
        group_id: i32,
        message: String,
        time: String,
        sender_name: String,
    },
    #[serde(rename = "group_file")]
    GroupFile {
        #[serde(rename = "groupID")]
        group_id: i32,
        file_name: String,
        file_data: String,
        time: String,
        sender_name: String,
    },
    #[serde(rename = "group_audio")]
    GroupAudio {
        #[serde(rename = "groupID")]
        group_id: i32,
        audio_name: String,
        audio_data: String,
        time: String,
        sender_name: String,
    },
    #[serde(rename = "is_typing")]
    IsTyping { receiver: i64 },
    #[serde(rename = "group_is_typing")]
    GroupIsTyping {
        #[serde(rename = "groupID")]
        group_id: i32,
        sender_name: String,
    },
    /// Own-profile update; the wire name doubles as the fan-out frame
    /// contacts receive.
    #[serde(rename = "contact_info_updated")]
    UpdateInfo {
        first_name: String,
        last_name: String,
        password: String,
    },
    #[serde(rename = "update_password")]
    UpdatePassword { phone_number: i64, password: String },
    #[serde(rename = "new_password_request")]
    NewPasswordRequest,
    #[serde(rename = "retrieve_question")]
    RetrieveQuestion { phone_number: i64 },
    #[serde(rename = "add_group_member")]
    AddGroupMember {
        #[serde(rename = "groupID")]
        group_id: i32,
        member_list: Vec<i64>,
    },
    #[serde(rename = "remove_group_member")]
    RemoveGroupMember {
        #[serde(rename = "groupID")]
        group_id: i32,
        member_list: Vec<i64>,
    },
    #[serde(rename = "delete_message")]
    DeleteMessage {
        receiver: i64,
        #[serde(rename = "chatID")]
        chat_id: i32,
        full_time: String,
    },
    #[serde(rename = "delete_group_message")]
    DeleteGroupMessage {
        #[serde(rename = "groupID")]
        group_id: i32,
        full_time: String,
    },
    #[serde(rename = "update_unread_message")]
    UpdateUnreadMessage {
        #[serde(rename = "chatID")]
        chat_id: i32,
    },
    #[serde(rename = "update_group_unread_message")]
    UpdateGroupUnreadMessage {
        #[serde(rename = "groupID")]
        group_id: i32,
    },
    #[serde(rename = "delete_account")]
    DeleteAccount,
}

impl ClientFrame {
    /// Frame types a socket may send before `login_request` succeeds.
    /// Everything else requires an authenticated identity and is dropped
    /// (with a log line) otherwise.
    pub fn allowed_unauthenticated(&self) -> bool {
        matches!(
            self,
            ClientFrame::SignUp { .. }
                | ClientFrame::LoginRequest { .. }
                | ClientFrame::RetrieveQuestion { .. }
                | ClientFrame::UpdatePassword { .. }
                | ClientFrame::NewPasswordRequest
        )
    }

    /// The wire discriminator, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::SignUp { .. } => "sign_up",
            ClientFrame::LoginRequest { .. } => "login_request",
            ClientFrame::LookupFriend { .. } => "lookup_friend",
            ClientFrame::ProfileImage { .. } => "profile_image",
            ClientFrame::GroupProfileImage { .. } => "group_profile_image",
            ClientFrame::ProfileImageDeleted => "profile_image_deleted",
            ClientFrame::Text { .. } => "text",
            ClientFrame::File { .. } => "file",
            ClientFrame::Audio { .. } => "audio",
            ClientFrame::NewGroup { .. } => "new_group",
            ClientFrame::GroupText { .. } => "group_text",
            ClientFrame::GroupFile { .. } => "group_file",
            ClientFrame::GroupAudio { .. } => "group_audio",
            ClientFrame::IsTyping { .. } => "is_typing",
            ClientFrame::GroupIsTyping { .. } => "group_is_typing",
            ClientFrame::UpdateInfo { .. } => "contact_info_updated",
            ClientFrame::UpdatePassword { .. } => "update_password",
            ClientFrame::NewPasswordRequest => "new_password_request",
            ClientFrame::RetrieveQuestion { .. } => "retrieve_question",
            ClientFrame::AddGroupMember { .. } => "add_group_member",
            ClientFrame::RemoveGroupMember { .. } => "remove_group_member",
            ClientFrame::DeleteMessage { .. } => "delete_message",
            ClientFrame::DeleteGroupMessage { .. } => "delete_group_message",
            ClientFrame::UpdateUnreadMessage { .. } => "update_unread_message",
            ClientFrame::UpdateGroupUnreadMessage { .. } => "update_group_unread_message",
            ClientFrame::DeleteAccount => "delete_account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_frames() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"text","receiver":1002,"message":"hi","time":"T1","chatID":42}"#,
        )
        .unwrap();
        match frame {
            ClientFrame::Text {
                receiver,
                message,
                chat_id,
                ..
            } => {
                assert_eq!(receiver, 1002);
                assert_eq!(message, "hi");
                assert_eq!(chat_id, 42);
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"save_data"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"lookup_friend","phone_number":1002,"client_version":"3.1"}"#,
        )
        .unwrap();
        assert!(matches!(
            frame,
            ClientFrame::LookupFriend { phone_number: 1002 }
        ));
    }

    #[test]
    fn auth_gate_admits_only_the_recovery_and_login_frames() {
        let pre_auth = [
            r#"{"type":"sign_up","phone_number":1,"first_name":"","last_name":"","password":"","secret_question":"","secret_answer":""}"#,
            r#"{"type":"login_request","phone_number":1,"password":""}"#,
            r#"{"type":"retrieve_question","phone_number":1}"#,
            r#"{"type":"update_password","phone_number":1,"password":"x"}"#,
            r#"{"type":"new_password_request"}"#,
        ];
        for raw in pre_auth {
            let frame: ClientFrame = serde_json::from_str(raw).unwrap();
            assert!(frame.allowed_unauthenticated(), "{}", frame.kind());
        }

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"delete_account"}"#).unwrap();
        assert!(!frame.allowed_unauthenticated());
    }
}
