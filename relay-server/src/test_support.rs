//! In-process provider fakes shared by the unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use relay_providers::{
    CompletionProvider, CompletionRequest, GeneratedImage, ImageProvider, ImageRequest,
    ProviderError, Role,
};

use crate::config::{Config, OPENAI_API_KEY, STABILITY_API_KEY};

enum ImageBehaviour {
    Bytes(Bytes),
    Status(u16, String),
    Malformed,
}

pub struct FakeImageProvider {
    behaviour: ImageBehaviour,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl FakeImageProvider {
    fn with(behaviour: ImageBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn returning(bytes: &[u8]) -> Self {
        Self::with(ImageBehaviour::Bytes(Bytes::copy_from_slice(bytes)))
    }

    pub fn failing_status(status: u16, message: &str) -> Self {
        Self::with(ImageBehaviour::Status(status, message.to_owned()))
    }

    pub fn failing_malformed() -> Self {
        Self::with(ImageBehaviour::Malformed)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
        match &self.behaviour {
            ImageBehaviour::Bytes(bytes) => Ok(GeneratedImage {
                format: request.format,
                bytes: bytes.clone(),
            }),
            ImageBehaviour::Status(status, message) => Err(ProviderError::Status {
                status: *status,
                message: message.clone(),
            }),
            ImageBehaviour::Malformed => Err(ProviderError::Malformed("fake".into())),
        }
    }
}

/// Completion fake that records every request it receives.
pub struct FakeCompletionProvider {
    reply: Option<String>,
    fail_next: AtomicBool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletionProvider {
    /// Replies `echo: <last user message>`.
    pub fn echo() -> Self {
        Self {
            reply: None,
            fail_next: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_owned()),
            ..Self::echo()
        }
    }

    /// Make the next call fail as if the provider were unreachable.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeCompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        // Give other tasks a chance to interleave, like a real network call.
        tokio::task::yield_now().await;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 503,
                message: "upstream unavailable".into(),
            });
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }
}

/// Config with test credentials, uploads under `upload_dir`, Swagger off and
/// `extra` applied on top.
pub fn test_config(upload_dir: &Path, extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        (STABILITY_API_KEY.to_owned(), "sk-stab".to_owned()),
        (OPENAI_API_KEY.to_owned(), "sk-oai".to_owned()),
        ("RELAY_UPLOAD_DIR".to_owned(), upload_dir.display().to_string()),
        ("RELAY_ENABLE_SWAGGER".to_owned(), "false".to_owned()),
    ]);
    for (k, v) in extra {
        env.insert((*k).to_owned(), (*v).to_owned());
    }
    Config::from_lookup(|k| env.get(k).cloned()).unwrap()
}

/// Files currently in `dir` (empty if it does not exist).
pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}
