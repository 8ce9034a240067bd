//! WeChat message parsing and reply rendering.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

/// Inbound webhook message.
///
/// WeChat delivers a flat XML document; `MsgId` identifies one delivery
/// attempt and is reused when the platform retries an unacknowledged
/// message.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,

    #[serde(rename = "FromUserName")]
    pub from_user_name: String,

    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,

    #[serde(rename = "MsgType", default)]
    pub msg_type: String,

    #[serde(rename = "Content", default)]
    pub content: String,

    #[serde(rename = "MsgId", default)]
    pub msg_id: String,
}

impl IncomingMessage {
    /// Message id used for redelivery detection. Some event payloads
    /// carry no `MsgId`; fall back to sender + creation time.
    pub fn delivery_id(&self) -> String {
        if self.msg_id.is_empty() {
            format!("{}:{}", self.from_user_name, self.create_time)
        } else {
            self.msg_id.clone()
        }
    }
}

/// Parse an inbound XML body.
pub fn parse_message(xml: &str) -> Result<IncomingMessage, quick_xml::DeError> {
    quick_xml::de::from_str(xml)
}

/// Render a passive text reply.
///
/// Sender and recipient are the *reply's* perspective, i.e. already
/// swapped relative to the inbound message. Content is sanitized before
/// it is placed on the wire.
pub fn render_reply(to_user: &str, from_user: &str, content: &str) -> String {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let content = sanitize_answer(content);

    format!(
        "<xml>\n\
         <ToUserName><![CDATA[{to_user}]]></ToUserName>\n\
         <FromUserName><![CDATA[{from_user}]]></FromUserName>\n\
         <CreateTime>{created}</CreateTime>\n\
         <MsgType><![CDATA[text]]></MsgType>\n\
         <Content><![CDATA[{content}]]></Content>\n\
         </xml>"
    )
}

/// Strip backend citation markers and surrounding whitespace.
pub fn sanitize_answer(answer: &str) -> String {
    answer.replace("CITATIONS:", "").trim().to_string()
}
