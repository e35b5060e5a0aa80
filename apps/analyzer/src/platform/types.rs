use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub name: String,
    pub email: String,
}

/// A file or directory entry in the hosted file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsItem {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// An in-memory file handed to the platform (upload, write, image input).
#[derive(Debug, Clone, PartialEq)]
pub struct FileBlob {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            data: data.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One part of a structured chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// A file already stored on the platform, referenced by its path.
    File { puter_path: String },
    #[serde(other)]
    Other,
}

/// Message content is either a bare string or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// The textual payload: the string itself, or the text of the first part.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => match parts.first() {
                Some(ContentPart::Text { text }) => Some(text),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: MessageContent) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// A chat request is either a plain prompt or a full message list.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatPrompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ResponseMessage,
}

/// Image input for text extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Url(String),
    Blob(FileBlob),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvItem {
    pub key: String,
    pub value: String,
}

/// Result of a key listing: bare keys, or key/value pairs when values were requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KvListing {
    Keys(Vec<String>),
    Items(Vec<KvItem>),
}
