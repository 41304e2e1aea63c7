//! In-process transport and responder
//!
//! Artifacts live in a map, user input is queued by tests with
//! [`MemoryTransport::push_input`], and uploaded images become downloadable
//! under `memory://` URLs. Individual operations can be made to fail.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{
    ActionButton, ArtifactContent, ArtifactHandle, ArtifactId, ArtifactImage, Collected,
    DestinationId, DownloadedImage, FetchedArtifact, InputAttachment, InputScope, Responder,
    SentArtifact, Transport, UserInput,
};
use crate::error::TransportError;
use crate::types::ImageMimeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Send,
    Edit,
    Disable,
    Delete,
    Fetch,
    Download,
}

/// What happened to an artifact, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Sent(ArtifactHandle),
    Edited(ArtifactHandle),
    Disabled(ArtifactHandle),
    Deleted(ArtifactHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub content: ArtifactContent,
    pub actions: Vec<ActionButton>,
    pub image_url: Option<String>,
}

#[derive(Default)]
struct State {
    artifacts: HashMap<ArtifactHandle, StoredArtifact>,
    order: Vec<ArtifactHandle>,
    events: Vec<TransportEvent>,
    pending_inputs: VecDeque<UserInput>,
    downloads: HashMap<String, DownloadedImage>,
    failing: HashSet<TransportOp>,
}

pub struct MemoryTransport {
    state: Mutex<State>,
    input_arrived: Notify,
    next_id: AtomicU64,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            input_arrived: Notify::new(),
            next_id: AtomicU64::new(1000),
        }
    }
}

fn mime_for_filename(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => ImageMimeType::Jpeg,
        "gif" => ImageMimeType::Gif,
        "webp" => ImageMimeType::WebP,
        _ => ImageMimeType::Png,
    };
    mime.as_str().to_string()
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn check(&self, op: TransportOp) -> Result<(), TransportError> {
        if self.lock().failing.contains(&op) {
            Err(TransportError::Request(format!("injected {:?} failure", op)))
        } else {
            Ok(())
        }
    }

    /// Make every following `op` fail until [`MemoryTransport::recover`]
    pub fn fail(&self, op: TransportOp) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: TransportOp) {
        self.lock().failing.remove(&op);
    }

    /// Queue a user message; it is stored as an artifact so it can be deleted
    pub fn push_input(
        &self,
        scope: &InputScope,
        content: &str,
        attachments: Vec<InputAttachment>,
    ) -> ArtifactHandle {
        let handle = ArtifactHandle {
            destination: scope.channel.clone(),
            id: ArtifactId(self.next_id()),
        };
        {
            let mut state = self.lock();
            state.artifacts.insert(
                handle.clone(),
                StoredArtifact {
                    content: ArtifactContent::plain(content),
                    actions: Vec::new(),
                    image_url: None,
                },
            );
            state.order.push(handle.clone());
            state.pending_inputs.push_back(UserInput {
                handle: handle.clone(),
                author_id: scope.user_id.clone(),
                content: content.to_string(),
                attachments,
            });
        }
        self.input_arrived.notify_waiters();
        handle
    }

    /// Queue a user message carrying one attachment whose bytes are downloadable
    pub fn push_attachment(
        &self,
        scope: &InputScope,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ArtifactHandle {
        let url = format!("memory://attachments/{}/{}", self.next_id(), filename);
        self.register_download(&url, bytes, Some(content_type));
        self.push_input(
            scope,
            "",
            vec![InputAttachment {
                url,
                filename: filename.to_string(),
                content_type: Some(content_type.to_string()),
            }],
        )
    }

    pub fn register_download(&self, url: &str, bytes: Vec<u8>, mime_type: Option<&str>) {
        self.lock().downloads.insert(
            url.to_string(),
            DownloadedImage {
                bytes,
                mime_type: mime_type.map(str::to_string),
            },
        );
    }

    pub fn artifact(&self, handle: &ArtifactHandle) -> Option<StoredArtifact> {
        self.lock().artifacts.get(handle).cloned()
    }

    /// Live artifacts in a destination, oldest first
    pub fn artifacts_in(
        &self,
        destination: &DestinationId,
    ) -> Vec<(ArtifactHandle, StoredArtifact)> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter(|h| &h.destination == destination)
            .filter_map(|h| state.artifacts.get(h).map(|a| (h.clone(), a.clone())))
            .collect()
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.lock().events.clone()
    }

    /// Inputs queued but not yet consumed by a collector
    pub fn pending_inputs(&self) -> usize {
        self.lock().pending_inputs.len()
    }

    fn store_image(
        &self,
        handle: &ArtifactHandle,
        image: Option<&ArtifactImage>,
    ) -> Option<String> {
        match image? {
            ArtifactImage::Url(url) => Some(url.clone()),
            ArtifactImage::Upload { filename, bytes } => {
                let url = format!("memory://{}/{}/{}", handle.destination, handle.id, filename);
                let mime = mime_for_filename(filename);
                self.register_download(&url, bytes.clone(), Some(&mime));
                Some(url)
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_artifact(
        &self,
        destination: &DestinationId,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<SentArtifact, TransportError> {
        self.check(TransportOp::Send)?;
        let handle = ArtifactHandle {
            destination: destination.clone(),
            id: ArtifactId(self.next_id()),
        };
        let image_url = self.store_image(&handle, content.image.as_ref());

        let mut state = self.lock();
        state.artifacts.insert(
            handle.clone(),
            StoredArtifact {
                content: content.clone(),
                actions: actions.to_vec(),
                image_url: image_url.clone(),
            },
        );
        state.order.push(handle.clone());
        state.events.push(TransportEvent::Sent(handle.clone()));

        Ok(SentArtifact { handle, image_url })
    }

    async fn edit_artifact(
        &self,
        handle: &ArtifactHandle,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<(), TransportError> {
        self.check(TransportOp::Edit)?;
        let new_image = self.store_image(handle, content.image.as_ref());

        let mut state = self.lock();
        let stored = state
            .artifacts
            .get_mut(handle)
            .ok_or_else(|| TransportError::NotFound(handle.id.to_string()))?;
        stored.content = content.clone();
        stored.actions = actions.to_vec();
        if new_image.is_some() {
            stored.image_url = new_image;
        }
        state.events.push(TransportEvent::Edited(handle.clone()));
        Ok(())
    }

    async fn disable_actions(&self, handle: &ArtifactHandle) -> Result<(), TransportError> {
        self.check(TransportOp::Disable)?;
        let mut state = self.lock();
        let stored = state
            .artifacts
            .get_mut(handle)
            .ok_or_else(|| TransportError::NotFound(handle.id.to_string()))?;
        for action in &mut stored.actions {
            action.disabled = true;
        }
        state.events.push(TransportEvent::Disabled(handle.clone()));
        Ok(())
    }

    async fn delete_artifact(&self, handle: &ArtifactHandle) -> Result<(), TransportError> {
        self.check(TransportOp::Delete)?;
        let mut state = self.lock();
        state
            .artifacts
            .remove(handle)
            .ok_or_else(|| TransportError::NotFound(handle.id.to_string()))?;
        state.events.push(TransportEvent::Deleted(handle.clone()));
        Ok(())
    }

    async fn fetch_artifact(
        &self,
        handle: &ArtifactHandle,
    ) -> Result<FetchedArtifact, TransportError> {
        self.check(TransportOp::Fetch)?;
        let state = self.lock();
        let stored = state
            .artifacts
            .get(handle)
            .ok_or_else(|| TransportError::NotFound(handle.id.to_string()))?;
        Ok(FetchedArtifact {
            handle: handle.clone(),
            fields: stored.content.fields.clone(),
            image_url: stored.image_url.clone(),
        })
    }

    async fn await_user_input(
        &self,
        scope: &InputScope,
        timeout: Duration,
    ) -> Result<Collected<UserInput>, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Registered before the queue check so a push in between is not missed
            let notified = self.input_arrived.notified();
            {
                let mut state = self.lock();
                let position = state
                    .pending_inputs
                    .iter()
                    .position(|i| {
                        i.handle.destination == scope.channel && i.author_id == scope.user_id
                    });
                if let Some(input) = position.and_then(|p| state.pending_inputs.remove(p)) {
                    return Ok(Collected::Input(input));
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Collected::Timeout);
            }
        }
    }

    async fn download_attachment(&self, url: &str) -> Result<DownloadedImage, TransportError> {
        self.check(TransportOp::Download)?;
        self.lock()
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Download(format!("{} is no longer available", url)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Update(String),
    FollowUp(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Update(t) | Reply::FollowUp(t) => t,
        }
    }
}

/// Responder that records every reply
#[derive(Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<Reply>>,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.replies().iter().map(|r| r.text().to_string()).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.replies().last().map(|r| r.text().to_string())
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push(reply);
        }
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn update(&self, text: &str) -> Result<(), TransportError> {
        self.push(Reply::Update(text.to_string()));
        Ok(())
    }

    async fn follow_up(&self, text: &str) -> Result<(), TransportError> {
        self.push(Reply::FollowUp(text.to_string()));
        Ok(())
    }
}
