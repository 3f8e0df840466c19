use serde::Serialize;
use serde_json::Value;

// Conversation from an inbound body: the `messages` array of a JSON object.
// Turns are kept untyped and forwarded as they came.
pub fn conversation(body: &[u8]) -> Option<Vec<Value>> {
    match serde_json::from_slice(body).ok()? {
        Value::Object(mut fields) => match fields.remove("messages")? {
            Value::Array(messages) => Some(messages),
            _ => None,
        },
        _ => None,
    }
}

// One conversation turn as sent upstream
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

// Chat-completion request format. Caller turns are forwarded untouched.
#[derive(Serialize, Debug)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<Value>,
    pub stream: bool,
}

// The one field we read back from an upstream response, for logging only
pub fn reply_text(body: &Value) -> Option<&str> {
    body.pointer("/choices/0/message/content")?.as_str()
}

// First `max` characters of a message's content, for logging
pub fn preview(message: &Value, max: usize) -> (String, String) {
    let role = message
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    let content = message.get("content").and_then(Value::as_str).unwrap_or("");
    let mut text: String = content.chars().take(max).collect();
    if content.chars().count() > max {
        text.push_str("...");
    }
    (role, text)
}
