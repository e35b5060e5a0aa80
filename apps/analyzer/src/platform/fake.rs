//! In-memory platform for unit tests: scripted chat replies, injectable
//! failures, and an ordered log of every call it receives.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::platform::local::glob_match;
use crate::platform::{
    AiApi, AuthApi, ChatOptions, ChatPrompt, ChatResponse, FileBlob, FsApi, FsItem, Identity,
    ImageInput, KvApi, KvItem, KvListing, MessageContent, Platform, PlatformError,
    ResponseMessage, Role,
};

pub struct FakePlatform {
    signed_in: Mutex<bool>,
    identity: Identity,
    files: Mutex<BTreeMap<String, Bytes>>,
    kv: Mutex<BTreeMap<String, String>>,
    chat_reply: Mutex<MessageContent>,
    failures: Mutex<HashMap<&'static str, String>>,
    failures_from: Mutex<HashMap<&'static str, usize>>,
    calls: Mutex<Vec<String>>,
    kv_writes: Mutex<Vec<(String, String)>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signed_in: Mutex::new(false),
            identity: Identity {
                uid: "user-1".to_string(),
                name: "ada".to_string(),
                email: "ada@example.com".to_string(),
            },
            files: Mutex::new(BTreeMap::new()),
            kv: Mutex::new(BTreeMap::new()),
            chat_reply: Mutex::new(MessageContent::Text("{}".to_string())),
            failures: Mutex::new(HashMap::new()),
            failures_from: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            kv_writes: Mutex::new(Vec::new()),
        })
    }

    pub fn signed_in(self: Arc<Self>) -> Arc<Self> {
        *self.signed_in.lock() = true;
        self
    }

    /// Makes `op` (e.g. `"fs.upload"`) fail with `"<op> failed"`.
    pub fn fail(&self, op: &'static str) {
        self.failures.lock().insert(op, format!("{op} failed"));
    }

    pub fn fail_with(&self, op: &'static str, message: &str) {
        self.failures.lock().insert(op, message.to_string());
    }

    /// Lets the first `nth - 1` calls of `op` succeed, then fails every later one.
    pub fn fail_from(&self, op: &'static str, nth: usize) {
        self.failures_from.lock().insert(op, nth);
    }

    pub fn recover(&self, op: &'static str) {
        self.failures.lock().remove(op);
        self.failures_from.lock().remove(op);
    }

    pub fn reply_with(&self, content: MessageContent) {
        *self.chat_reply.lock() = content;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn kv_writes(&self) -> Vec<(String, String)> {
        self.kv_writes.lock().clone()
    }

    pub fn kv_value(&self, key: &str) -> Option<String> {
        self.kv.lock().get(key).cloned()
    }

    pub fn kv_len(&self) -> usize {
        self.kv.lock().len()
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.files.lock().get(path).cloned()
    }

    fn enter(&self, op: &'static str) -> Result<(), PlatformError> {
        let seen = {
            let mut calls = self.calls.lock();
            calls.push(op.to_string());
            calls.iter().filter(|c| c.as_str() == op).count()
        };
        if let Some(message) = self.failures.lock().get(op) {
            return Err(PlatformError::Operation(message.clone()));
        }
        match self.failures_from.lock().get(op) {
            Some(&nth) if seen >= nth => Err(PlatformError::Operation(format!("{op} failed"))),
            _ => Ok(()),
        }
    }
}

impl Platform for FakePlatform {
    fn auth(&self) -> &dyn AuthApi {
        self
    }

    fn fs(&self) -> &dyn FsApi {
        self
    }

    fn ai(&self) -> &dyn AiApi {
        self
    }

    fn kv(&self) -> &dyn KvApi {
        self
    }
}

#[async_trait]
impl AuthApi for FakePlatform {
    async fn is_signed_in(&self) -> Result<bool, PlatformError> {
        self.enter("auth.isSignedIn")?;
        Ok(*self.signed_in.lock())
    }

    async fn get_user(&self) -> Result<Identity, PlatformError> {
        self.enter("auth.getUser")?;
        Ok(self.identity.clone())
    }

    async fn sign_in(&self) -> Result<(), PlatformError> {
        self.enter("auth.signIn")?;
        *self.signed_in.lock() = true;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), PlatformError> {
        self.enter("auth.signOut")?;
        *self.signed_in.lock() = false;
        Ok(())
    }
}

#[async_trait]
impl FsApi for FakePlatform {
    async fn upload(&self, files: Vec<FileBlob>) -> Result<FsItem, PlatformError> {
        self.enter("fs.upload")?;
        let file = files
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::Operation("no files".to_string()))?;
        let path = format!("/uploads/{}", file.name);
        let size = file.data.len() as u64;
        self.files.lock().insert(path.clone(), file.data);
        Ok(FsItem {
            name: file.name,
            path,
            is_dir: false,
            size: Some(size),
            modified: None,
        })
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<FsItem, PlatformError> {
        self.enter("fs.write")?;
        let size = data.len() as u64;
        self.files.lock().insert(path.to_string(), data);
        Ok(FsItem {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            is_dir: false,
            size: Some(size),
            modified: None,
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes, PlatformError> {
        self.enter("fs.read")?;
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.enter("fs.delete")?;
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn readdir(&self, path: &str) -> Result<Vec<FsItem>, PlatformError> {
        self.enter("fs.readdir")?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix))
            .map(|(p, data)| FsItem {
                name: p[prefix.len()..].to_string(),
                path: p.clone(),
                is_dir: false,
                size: Some(data.len() as u64),
                modified: None,
            })
            .collect())
    }
}

#[async_trait]
impl AiApi for FakePlatform {
    async fn chat(
        &self,
        _prompt: ChatPrompt,
        _options: Option<ChatOptions>,
    ) -> Result<ChatResponse, PlatformError> {
        self.enter("ai.chat")?;
        Ok(ChatResponse {
            message: ResponseMessage {
                role: Role::Assistant,
                content: self.chat_reply.lock().clone(),
            },
        })
    }

    async fn img2txt(&self, _image: ImageInput) -> Result<String, PlatformError> {
        self.enter("ai.img2txt")?;
        Ok("extracted text".to_string())
    }
}

#[async_trait]
impl KvApi for FakePlatform {
    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        self.enter("kv.get")?;
        Ok(self.kv.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, PlatformError> {
        self.enter("kv.set")?;
        self.kv.lock().insert(key.to_string(), value.to_string());
        self.kv_writes
            .lock()
            .push((key.to_string(), value.to_string()));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, PlatformError> {
        self.enter("kv.delete")?;
        Ok(self.kv.lock().remove(key).is_some())
    }

    async fn list(&self, pattern: &str, return_values: bool) -> Result<KvListing, PlatformError> {
        self.enter("kv.list")?;
        let kv = self.kv.lock();
        let matching = kv.iter().filter(|(k, _)| glob_match(pattern, k));
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
        self.enter("kv.flush")?;
        self.kv.lock().clear();
        Ok(true)
    }
}
