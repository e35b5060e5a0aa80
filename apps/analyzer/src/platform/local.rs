//! Single-user host: files on disk, keys in memory, inference over the
//! Anthropic Messages API.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm_client::{Base64Source, LlmClient, LlmMessage, RequestBlock, DEFAULT_MODEL};
use crate::platform::{
    AiApi, AuthApi, ChatOptions, ChatPrompt, ChatResponse, ContentPart, FileBlob, FsApi, FsItem,
    Identity, ImageInput, KvApi, KvItem, KvListing, MessageContent, Platform, PlatformError,
    ResponseMessage, Role,
};

const FILES_DIR: &str = "files";
const KV_SNAPSHOT: &str = "kv.json";
const UPLOAD_DIR: &str = "uploads";

const IMG2TXT_PROMPT: &str = "Extract all text visible in this image. \
    Return only the extracted text, preserving line breaks. \
    Do NOT add commentary.";

/// Matches `key` against a pattern where `*` stands for any run of characters.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(at) => rest = &rest[at + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Media type from the file extension, falling back to the content's magic
/// bytes when the name says nothing useful.
fn media_type_for(name: &str, data: &[u8]) -> &'static str {
    extension_media_type(name)
        .or_else(|| sniff_media_type(data))
        .unwrap_or("application/octet-stream")
}

fn extension_media_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref()? {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Resolves a model alias to a concrete model id.
fn resolve_model(options: Option<&ChatOptions>) -> String {
    match options.and_then(|o| o.model.as_deref()) {
        Some("claude-sonnet-4") => "claude-sonnet-4-20250514".to_string(),
        Some(model) => model.to_string(),
        None => DEFAULT_MODEL.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

pub struct LocalAuth {
    identity: Identity,
    signed_in: AtomicBool,
}

#[async_trait]
impl AuthApi for LocalAuth {
    async fn is_signed_in(&self) -> Result<bool, PlatformError> {
        Ok(self.signed_in.load(Ordering::SeqCst))
    }

    async fn get_user(&self) -> Result<Identity, PlatformError> {
        if !self.signed_in.load(Ordering::SeqCst) {
            return Err(PlatformError::NotSignedIn);
        }
        Ok(self.identity.clone())
    }

    async fn sign_in(&self) -> Result<(), PlatformError> {
        self.signed_in.store(true, Ordering::SeqCst);
        info!("Local user '{}' signed in", self.identity.name);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), PlatformError> {
        self.signed_in.store(false, Ordering::SeqCst);
        info!("Local user '{}' signed out", self.identity.name);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Files
// ────────────────────────────────────────────────────────────────────────────

/// Files rooted at a directory. Platform paths are `/`-separated and absolute.
#[derive(Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    fn resolve(&self, path: &str) -> Result<PathBuf, PlatformError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(PlatformError::InvalidPath(path.to_string())),
            }
        }
        Ok(resolved)
    }

    async fn item_for(&self, path: String) -> Result<FsItem, PlatformError> {
        let metadata = tokio::fs::metadata(self.resolve(&path)?).await?;
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Ok(FsItem {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.is_file().then(|| metadata.len()),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            path,
        })
    }

    async fn read_bytes(&self, path: &str) -> Result<Bytes, PlatformError> {
        match tokio::fs::read(self.resolve(path)?).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PlatformError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FsApi for LocalFs {
    async fn upload(&self, files: Vec<FileBlob>) -> Result<FsItem, PlatformError> {
        let mut uploaded = None;
        for file in files {
            let name = Path::new(&file.name)
                .file_name()
                .and_then(|n| n.to_str())
                .filter(|n| !n.is_empty())
                .unwrap_or("upload")
                .to_string();
            let path = format!("/{UPLOAD_DIR}/{}-{name}", Uuid::new_v4());
            let item = self.write(&path, file.data).await?;
            uploaded.get_or_insert(item);
        }
        uploaded.ok_or_else(|| PlatformError::Operation("No files to upload".to_string()))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<FsItem, PlatformError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        debug!("Wrote {} bytes to {}", data.len(), path);
        self.item_for(path.to_string()).await
    }

    async fn read(&self, path: &str) -> Result<Bytes, PlatformError> {
        self.read_bytes(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        let target = self.resolve(path)?;
        let metadata = match tokio::fs::metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlatformError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, PlatformError> {
        let mut entries = tokio::fs::read_dir(self.resolve(path)?).await?;
        let base = path.trim_end_matches('/');
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            items.push(self.item_for(format!("{base}/{name}")).await?);
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inference
// ────────────────────────────────────────────────────────────────────────────

pub struct LocalAi {
    llm: LlmClient,
    fs: LocalFs,
}

impl LocalAi {
    async fn file_block(&self, path: &str) -> Result<RequestBlock, PlatformError> {
        let data = self.fs.read_bytes(path).await?;
        let media_type = media_type_for(path, &data);
        let source = Base64Source::new(media_type, BASE64.encode(&data));
        Ok(if media_type.starts_with("image/") {
            RequestBlock::Image { source }
        } else {
            RequestBlock::Document { source }
        })
    }

    async fn to_llm_message(
        &self,
        role: Role,
        content: MessageContent,
    ) -> Result<LlmMessage, PlatformError> {
        let blocks = match content {
            MessageContent::Text(text) => vec![RequestBlock::Text { text }],
            MessageContent::Parts(parts) => {
                let mut blocks = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        ContentPart::Text { text } => blocks.push(RequestBlock::Text { text }),
                        ContentPart::File { puter_path } => {
                            blocks.push(self.file_block(&puter_path).await?)
                        }
                        ContentPart::Other => {}
                    }
                }
                blocks
            }
        };
        Ok(LlmMessage {
            role: match role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: blocks,
        })
    }
}

#[async_trait]
impl AiApi for LocalAi {
    async fn chat(
        &self,
        prompt: ChatPrompt,
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, PlatformError> {
        let messages = match prompt {
            ChatPrompt::Text(text) => vec![
                self.to_llm_message(Role::User, MessageContent::Text(text))
                    .await?,
            ],
            ChatPrompt::Messages(messages) => {
                let mut converted = Vec::with_capacity(messages.len());
                for message in messages {
                    converted.push(self.to_llm_message(message.role, message.content).await?);
                }
                converted
            }
        };

        let model = resolve_model(options.as_ref());
        let response = self.llm.send(&model, None, &messages).await?;
        let parts = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .map(|text| ContentPart::Text { text })
            .collect();

        Ok(ChatResponse {
            message: ResponseMessage {
                role: Role::Assistant,
                content: MessageContent::Parts(parts),
            },
        })
    }

    async fn img2txt(&self, image: ImageInput) -> Result<String, PlatformError> {
        let image_block = match image {
            ImageInput::Url(path) => self.file_block(&path).await?,
            ImageInput::Blob(blob) => {
                let media_type = blob
                    .content_type
                    .clone()
                    .unwrap_or_else(|| media_type_for(&blob.name, &blob.data).to_string());
                RequestBlock::Image {
                    source: Base64Source::new(media_type, BASE64.encode(&blob.data)),
                }
            }
        };
        let messages = [LlmMessage {
            role: "user",
            content: vec![
                image_block,
                RequestBlock::Text {
                    text: IMG2TXT_PROMPT.to_string(),
                },
            ],
        }];
        Ok(self.llm.send_text(DEFAULT_MODEL, None, &messages).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Key-value
// ────────────────────────────────────────────────────────────────────────────

/// In-memory map mirrored to a JSON snapshot after every mutation.
pub struct LocalKv {
    entries: RwLock<BTreeMap<String, String>>,
    snapshot: PathBuf,
    persist: tokio::sync::Mutex<()>,
}

impl LocalKv {
    async fn load(snapshot: PathBuf) -> Result<Self, PlatformError> {
        let entries: BTreeMap<String, String> = match tokio::fs::read(&snapshot).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Loaded {} key(s) from {}", entries.len(), snapshot.display());
        Ok(Self {
            entries: RwLock::new(entries),
            snapshot,
            persist: tokio::sync::Mutex::new(()),
        })
    }

    /// Writes the current map through a staging file so a crash mid-write
    /// leaves the previous snapshot intact.
    async fn persist(&self) -> Result<(), PlatformError> {
        let _writer = self.persist.lock().await;
        let data = serde_json::to_vec(&*self.entries.read())?;
        let staging = self.snapshot.with_extension("json.tmp");
        tokio::fs::write(&staging, &data).await?;
        tokio::fs::rename(&staging, &self.snapshot).await?;
        debug!("Persisted {} byte key snapshot", data.len());
        Ok(())
    }
}

#[async_trait]
impl KvApi for LocalKv {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, PlatformError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        self.persist().await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, PlatformError> {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn list(&self, pattern: &str, return_values: bool) -> Result<KvListing, PlatformError> {
        let entries = self.entries.read();
        let matching = entries.iter().filter(|(key, _)| glob_match(pattern, key));
        Ok(if return_values {
            KvListing::Items(
                matching
                    .map(|(key, value)| KvItem {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            )
        } else {
            KvListing::Keys(matching.map(|(key, _)| key.clone()).collect())
        })
    }

    async fn flush(&self) -> Result<bool, PlatformError> {
        self.entries.write().clear();
        self.persist().await?;
        Ok(true)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Platform
// ────────────────────────────────────────────────────────────────────────────

pub struct LocalPlatform {
    auth: LocalAuth,
    fs: LocalFs,
    ai: LocalAi,
    kv: LocalKv,
}

impl LocalPlatform {
    /// Opens a host rooted at `storage_root`, creating it if needed. Files live
    /// under `files/`, keys in `kv.json`. The local user starts signed out.
    pub async fn open(
        storage_root: impl Into<PathBuf>,
        identity: Identity,
        llm: LlmClient,
    ) -> Result<Arc<Self>, PlatformError> {
        let root = storage_root.into();
        let files = root.join(FILES_DIR);
        tokio::fs::create_dir_all(&files).await?;
        info!("Local platform storage at {}", root.display());
        let kv = LocalKv::load(root.join(KV_SNAPSHOT)).await?;
        let fs = LocalFs { root: files };
        Ok(Arc::new(Self {
            auth: LocalAuth {
                identity,
                signed_in: AtomicBool::new(false),
            },
            ai: LocalAi {
                llm,
                fs: fs.clone(),
            },
            fs,
            kv,
        }))
    }
}

impl Platform for LocalPlatform {
    fn auth(&self) -> &dyn AuthApi {
        &self.auth
    }

    fn fs(&self) -> &dyn FsApi {
        &self.fs
    }

    fn ai(&self) -> &dyn AiApi {
        &self.ai
    }

    fn kv(&self) -> &dyn KvApi {
        &self.kv
    }
}
