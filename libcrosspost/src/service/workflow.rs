//! Interactive posting workflow
//!
//! One instance runs per `/post` invocation and walks
//! `SelectingAccount → CollectingText → CollectingImage → RenderingPreview`,
//! ending in `AwaitingConfirmation` with a preview artifact whose fields carry
//! the encoded draft. Nothing survives the instance besides that artifact:
//! publishing is handled later by [`crate::service::confirm`].
//!
//! Every terminal failure produces exactly one reply to the initiating user.
//! A timeout or malformed reply ends the instance; there is no re-prompt.

use std::sync::Arc;

use crate::error::{TransportError, WorkflowError};
use crate::service::collector::{collect, discard};
use crate::service::draft::DraftState;
use crate::service::render;
use crate::service::WorkflowSettings;
use crate::store::{Clock, CredentialStore};
use crate::transport::{
    ArtifactHandle, ArtifactImage, Collected, DestinationId, InputScope, PreviewAction, Responder,
    Transport, UserInput, EMBED_TOTAL_LIMIT,
};
use crate::types::{Account, ImagePayload, ImagePolicy, PlatformKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    SelectingAccount,
    CollectingText,
    CollectingImage,
    RenderingPreview,
    AwaitingConfirmation,
}

#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    /// The preview is rendered; the draft now lives only in its fields
    AwaitingConfirmation {
        preview: ArtifactHandle,
        draft: DraftState,
    },
    Failed {
        state: WorkflowState,
        error: WorkflowError,
    },
}

impl WorkflowOutcome {
    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, WorkflowOutcome::AwaitingConfirmation { .. })
    }
}

pub struct PostingWorkflow<'a> {
    store: &'a dyn CredentialStore,
    transport: &'a dyn Transport,
    responder: &'a dyn Responder,
    settings: &'a WorkflowSettings,
    clock: Arc<dyn Clock>,
    platform: PlatformKind,
    scope: InputScope,
    state: WorkflowState,
    list_shown: bool,
}

impl<'a> PostingWorkflow<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        transport: &'a dyn Transport,
        responder: &'a dyn Responder,
        settings: &'a WorkflowSettings,
        clock: Arc<dyn Clock>,
        platform: PlatformKind,
        scope: InputScope,
    ) -> Self {
        Self {
            store,
            transport,
            responder,
            settings,
            clock,
            platform,
            scope,
            state: WorkflowState::SelectingAccount,
            list_shown: false,
        }
    }

    pub async fn run(mut self) -> WorkflowOutcome {
        tracing::debug!(
            platform = %self.platform,
            user = %self.scope.user_id,
            channel = %self.scope.channel,
            "Starting posting workflow"
        );

        match self.drive().await {
            Ok((preview, draft)) => {
                self.enter(WorkflowState::AwaitingConfirmation);
                WorkflowOutcome::AwaitingConfirmation { preview, draft }
            }
            Err(error) => {
                tracing::warn!(
                    platform = %self.platform,
                    state = ?self.state,
                    error = %error,
                    "Posting workflow ended"
                );
                self.report(&error).await;
                WorkflowOutcome::Failed {
                    state: self.state,
                    error,
                }
            }
        }
    }

    fn enter(&mut self, next: WorkflowState) {
        tracing::debug!(
            platform = %self.platform,
            from = ?self.state,
            to = ?next,
            "Workflow transition"
        );
        self.state = next;
    }

    /// Failures before the account list replace the loading reply; later
    /// ones are sent as a follow-up so the list stays readable.
    async fn report(&self, error: &WorkflowError) {
        let message = error.user_message();
        let sent = if self.list_shown {
            self.responder.follow_up(&message).await
        } else {
            self.responder.update(&message).await
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Failed to report workflow failure");
        }
    }

    async fn drive(&mut self) -> Result<(ArtifactHandle, DraftState), WorkflowError> {
        let account = self.select_account().await?;

        self.enter(WorkflowState::CollectingText);
        let text = self.collect_text().await?;

        self.enter(WorkflowState::CollectingImage);
        let image = self.collect_image().await?;

        self.enter(WorkflowState::RenderingPreview);
        let rendered = self.render_preview(&account, text, image).await?;

        let notice = format!(
            "✅ Preview created! Check {} to publish when ready.",
            self.transport.mention(&rendered.0.destination)
        );
        if let Err(e) = self.responder.follow_up(&notice).await {
            tracing::warn!(error = %e, "Failed to confirm preview");
        }
        Ok(rendered)
    }

    async fn select_account(&mut self) -> Result<Account, WorkflowError> {
        self.responder.update(&render::loading_accounts(self.platform)).await?;

        let mut accounts = self.store.accounts(self.platform).await?;
        if accounts.is_empty() {
            return Err(WorkflowError::NoAccountsFound(self.platform));
        }

        self.responder
            .update(&render::account_list(self.platform, &accounts))
            .await?;
        self.list_shown = true;

        let reply = collect(
            self.transport,
            &self.scope,
            None,
            self.settings.timeouts.selection,
            |input: UserInput| async move { input.content },
        )
        .await?;
        let reply = match reply {
            Collected::Input(reply) => reply,
            Collected::Timeout => return Err(WorkflowError::UserTimeout("account selection")),
        };

        let index = parse_selection(&reply, accounts.len())?;
        let account = accounts.swap_remove(index);
        tracing::debug!(platform = %self.platform, account = %account.id, "Account selected");
        Ok(account)
    }

    async fn collect_text(&self) -> Result<String, WorkflowError> {
        let user = self.transport.mention_user(&self.scope.user_id);
        let prompt = render::text_prompt(self.platform, &user);
        let text = collect(
            self.transport,
            &self.scope,
            Some(&prompt),
            self.settings.timeouts.text,
            |input: UserInput| async move { input.content.trim().to_string() },
        )
        .await?;

        match text {
            Collected::Timeout => Err(WorkflowError::UserTimeout("post text")),
            Collected::Input(text) if text.is_empty() && self.platform.requires_text() => Err(
                WorkflowError::InvalidUserInput("Post text cannot be empty.".to_string()),
            ),
            Collected::Input(text) => Ok(text),
        }
    }

    async fn collect_image(&self) -> Result<Option<ImagePayload>, WorkflowError> {
        let window = self.settings.timeouts.image;
        let user = self.transport.mention_user(&self.scope.user_id);
        let prompt = render::image_prompt(self.platform, &user, window);
        let platform = self.platform;
        let transport = self.transport;

        let collected = collect(
            self.transport,
            &self.scope,
            Some(&prompt),
            window,
            |input: UserInput| async move { read_image(transport, platform, input).await },
        )
        .await?;

        match collected {
            Collected::Input(image) => image,
            Collected::Timeout => match platform.image_policy() {
                ImagePolicy::Required => Err(WorkflowError::ImageTimeout(window)),
                ImagePolicy::Optional => Ok(None),
            },
        }
    }

    async fn render_preview(
        &self,
        account: &Account,
        text: String,
        image: Option<ImagePayload>,
    ) -> Result<(ArtifactHandle, DraftState), WorkflowError> {
        let destination = self
            .store
            .config()
            .await?
            .draft_channel
            .filter(|c| !c.trim().is_empty())
            .or_else(|| Some(self.settings.draft_fallback.clone()))
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| WorkflowError::ConfigurationMissing("Draft channel".to_string()))?;
        let destination = DestinationId(destination);
        let now = self.clock.now();

        let content = render::preview(self.platform, account, &text, image.as_ref(), now);
        let sent = self.transport.send_artifact(&destination, &content, &[]).await?;

        let draft = DraftState {
            platform: self.platform,
            account_id: account.id.clone(),
            account_name: account.display_name.clone(),
            text,
            image_ref: image.as_ref().and(sent.image_url.clone()),
        };

        let mut content = render::fit_embed(content.fields(draft.to_fields()));
        if content.embed_len() > EMBED_TOTAL_LIMIT {
            discard(self.transport, &sent.handle, "oversized preview").await;
            return Err(WorkflowError::InvalidUserInput(
                "Post text is too long to preview. Please shorten it and try again.".to_string(),
            ));
        }
        if let Some(url) = &draft.image_ref {
            content = content.image(ArtifactImage::Url(url.clone()));
        }
        let actions = PreviewAction::preview_buttons(&sent.handle.id, false);
        if let Err(e) = self.transport.edit_artifact(&sent.handle, &content, &actions).await {
            discard(self.transport, &sent.handle, "incomplete preview").await;
            return Err(e.into());
        }

        tracing::info!(
            platform = %self.platform,
            preview = %sent.handle.id,
            destination = %destination,
            has_image = draft.image_ref.is_some(),
            "Rendered draft preview"
        );
        Ok((sent.handle, draft))
    }
}

/// Zero-based index of a 1-based account number
fn parse_selection(reply: &str, count: usize) -> Result<usize, WorkflowError> {
    let reply = reply.trim();
    reply
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| {
            WorkflowError::InvalidUserInput(format!(
                "Invalid account number \"{}\". Please enter a number between 1 and {}.",
                reply, count
            ))
        })
}

/// Interpret the reply to the image prompt, downloading any image right away
async fn read_image(
    transport: &dyn Transport,
    platform: PlatformKind,
    input: UserInput,
) -> Result<Option<ImagePayload>, WorkflowError> {
    let policy = platform.image_policy();

    let Some(attachment) = input.attachments.first() else {
        let skipped = input.content.trim().eq_ignore_ascii_case("skip");
        return match policy {
            ImagePolicy::Required => Err(WorkflowError::ImageRequired(platform)),
            ImagePolicy::Optional => {
                if !skipped {
                    tracing::debug!(%platform, "Reply without attachment treated as skip");
                }
                Ok(None)
            }
        };
    };

    if !attachment.is_image() {
        return Err(WorkflowError::InvalidUserInput(
            "Please upload an image file (JPG, PNG, GIF).".to_string(),
        ));
    }

    let downloaded = transport
        .download_attachment(&attachment.url)
        .await
        .map_err(|e| match e {
            TransportError::Download(message) => WorkflowError::ImageDownload(message),
            other => WorkflowError::ImageDownload(other.to_string()),
        })?;
    let mime_type = downloaded
        .mime_type
        .or_else(|| attachment.content_type.clone())
        .unwrap_or_else(|| "image/png".to_string());

    tracing::debug!(%platform, mime = %mime_type, size = downloaded.bytes.len(), "Buffered image");
    Ok(Some(ImagePayload::new(downloaded.bytes, mime_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryTransport, TransportOp};
    use crate::transport::InputAttachment;

    #[test]
    fn test_parse_selection_bounds() {
        assert_eq!(parse_selection(" 2 ", 3).unwrap(), 1);
        for bad in ["0", "4", "two", "", "-1"] {
            let err = parse_selection(bad, 3).unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidUserInput(_)), "{}", bad);
        }
        assert_eq!(
            parse_selection("9", 2).unwrap_err().user_message(),
            "❌ Invalid account number \"9\". Please enter a number between 1 and 2."
        );
    }

    fn input(content: &str, attachments: Vec<InputAttachment>) -> UserInput {
        UserInput {
            handle: ArtifactHandle::new("100", "1"),
            author_id: "42".into(),
            content: content.into(),
            attachments,
        }
    }

    fn attachment(url: &str, content_type: &str) -> InputAttachment {
        InputAttachment {
            url: url.into(),
            filename: "file".into(),
            content_type: Some(content_type.into()),
        }
    }

    #[tokio::test]
    async fn test_skip_and_implicit_skip_on_optional_platform() {
        let transport = MemoryTransport::new();
        for reply in ["skip", "SKIP", "no thanks"] {
            let image = read_image(&transport, PlatformKind::X, input(reply, vec![]))
                .await
                .unwrap();
            assert!(image.is_none());
        }
    }

    #[tokio::test]
    async fn test_required_platform_rejects_text_reply() {
        let transport = MemoryTransport::new();
        let err = read_image(&transport, PlatformKind::Dribbble, input("skip", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ImageRequired(PlatformKind::Dribbble)));
    }

    #[tokio::test]
    async fn test_non_image_attachment_rejected() {
        let transport = MemoryTransport::new();
        let err = read_image(
            &transport,
            PlatformKind::LinkedIn,
            input("", vec![attachment("memory://doc.pdf", "application/pdf")]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.user_message(), "❌ Please upload an image file (JPG, PNG, GIF).");
    }

    #[tokio::test]
    async fn test_image_downloaded_with_mime() {
        let transport = MemoryTransport::new();
        transport.register_download("memory://a.jpg", vec![0xFF, 0xD8], Some("image/jpeg"));
        let image = read_image(
            &transport,
            PlatformKind::Instagram,
            input("", vec![attachment("memory://a.jpg", "image/jpeg")]),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(image.bytes, vec![0xFF, 0xD8]);
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_download_failure_is_reported() {
        let transport = MemoryTransport::new();
        transport.fail(TransportOp::Download);
        let err = read_image(
            &transport,
            PlatformKind::X,
            input("", vec![attachment("memory://gone.png", "image/png")]),
        )
        .await
        .unwrap_err();
        assert!(err.user_message().starts_with("❌ Failed to download image: "));
    }
}
