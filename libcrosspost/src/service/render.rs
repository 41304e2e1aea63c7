//! Rendering of prompts, previews and publish status artifacts

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::service::draft::DraftState;
use crate::transport::{
    ArtifactContent, ArtifactImage, EMBED_DESCRIPTION_LIMIT, EMBED_TOTAL_LIMIT,
};
use crate::types::{Account, ImagePayload, ImagePolicy, PlatformKind, Published};

pub const ERROR_COLOR: u32 = 0xFF0000;

pub fn platform_color(platform: PlatformKind) -> u32 {
    match platform {
        PlatformKind::X => 0x1DA1F2,
        PlatformKind::LinkedIn => 0x0A66C2,
        PlatformKind::Instagram => 0xE4405F,
        PlatformKind::Dribbble => 0xEA4C89,
    }
}

pub fn platform_emoji(platform: PlatformKind) -> &'static str {
    match platform {
        PlatformKind::X => "𝕏",
        PlatformKind::LinkedIn => "💼",
        PlatformKind::Instagram => "📸",
        PlatformKind::Dribbble => "🏀",
    }
}

/// First `max` characters of `text`, with an ellipsis when cut
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Whole seconds read as "60 seconds", anything else in humantime form
pub fn wait_time(window: Duration) -> String {
    match window.as_secs() {
        1 if window.subsec_nanos() == 0 => "1 second".to_string(),
        secs if secs > 0 && window.subsec_nanos() == 0 => format!("{} seconds", secs),
        _ => humantime::format_duration(window).to_string(),
    }
}

/// Shorten the description until the embed fits the transport limits
///
/// Other parts are left alone; the caller checks `embed_len` if those alone
/// may be too large.
pub fn fit_embed(mut content: ArtifactContent) -> ArtifactContent {
    let Some(description) = content.description.take() else {
        return content;
    };
    let room = EMBED_TOTAL_LIMIT
        .saturating_sub(content.embed_len())
        .min(EMBED_DESCRIPTION_LIMIT);
    if description.chars().count() <= room {
        content.description = Some(description);
    } else if room > 3 {
        content.description = Some(truncate(&description, room - 3));
    }
    content
}

pub fn loading_accounts(platform: PlatformKind) -> String {
    format!("⏳ Loading {} accounts...", platform)
}

/// Numbered account list the user picks from
pub fn account_list(platform: PlatformKind, accounts: &[Account]) -> String {
    let mut list = format!("📱 **Select a {} account:**\n\n", platform);
    for (i, account) in accounts.iter().enumerate() {
        list.push_str(&format!("**{}.** {}", i + 1, account.display_name));
        if let Some(handle) = account.handle() {
            list.push(' ');
            list.push_str(&handle);
        }
        list.push('\n');
    }
    list.push_str("\n💬 Reply with the account number (e.g., \"1\")");
    list
}

pub fn text_prompt(platform: PlatformKind, user: &str) -> ArtifactContent {
    ArtifactContent::plain(format!(
        "✍️ **Enter your {} post text:**\n\n{}, type your message below.",
        platform, user
    ))
}

pub fn image_prompt(platform: PlatformKind, user: &str, window: Duration) -> ArtifactContent {
    let text = match platform.image_policy() {
        ImagePolicy::Required => format!(
            "📸 **Image Required for {}**\n\n{}, send an image in this channel.\n\n⏱️ You have {}.",
            platform,
            user,
            wait_time(window)
        ),
        ImagePolicy::Optional => format!(
            "📸 **Add Image? (Optional)**\n\n{}, send an image in this channel, or type \"skip\".\n\n⏱️ You have {}.",
            user,
            wait_time(window)
        ),
    };
    ArtifactContent::plain(text)
}

/// Preview embed; the draft fields and actions are added once the artifact exists
pub fn preview(
    platform: PlatformKind,
    account: &Account,
    text: &str,
    image: Option<&ImagePayload>,
    now: DateTime<Utc>,
) -> ArtifactContent {
    let handle = account.handle().unwrap_or_else(|| "@account".to_string());
    let mut content = ArtifactContent::new()
        .author(format!("{} ({})", account.display_name, handle), None)
        .color(platform_color(platform))
        .footer(format!("{} • Preview", platform))
        .timestamp(now);
    if !text.is_empty() {
        content = content.description(text);
    }
    if let Some(image) = image {
        content = content.image(ArtifactImage::Upload {
            filename: format!("preview.{}", image.extension()),
            bytes: image.bytes.clone(),
        });
    }
    fit_embed(content)
}

fn summary(draft: &DraftState) -> String {
    format!(
        "📱 **Account:** {}\n📝 **Content:** {}",
        draft.account_name,
        truncate(&draft.text, 100)
    )
}

pub fn publishing(draft: &DraftState, now: DateTime<Utc>) -> ArtifactContent {
    ArtifactContent::new()
        .author(
            format!("{} Publishing to {}...", platform_emoji(draft.platform), draft.platform),
            None,
        )
        .description(summary(draft))
        .color(platform_color(draft.platform))
        .timestamp(now)
}

/// Durable record of a successful publish; the image is re-uploaded so it
/// does not depend on the preview's attachment URL
pub fn published(
    draft: &DraftState,
    result: &Published,
    image: Option<&ImagePayload>,
    posted_by: Option<&str>,
    now: DateTime<Utc>,
) -> ArtifactContent {
    let mut content = ArtifactContent::new()
        .author(
            format!("{} Published to {}!", platform_emoji(draft.platform), draft.platform),
            Some(result.url.clone()),
        )
        .title(&draft.account_name)
        .color(platform_color(draft.platform))
        .field(
            "🔗 Post Link",
            format!("[View on {}]({})", draft.platform, result.url),
            true,
        )
        .field("📅 Published", format!("<t:{}:R>", now.timestamp()), true)
        .timestamp(now);
    if !draft.text.is_empty() {
        content = content.description(truncate(&draft.text, 200));
    }
    if let Some(warning) = &result.warning {
        content = content.field("⚠️ Warning", warning, false);
    }
    if let Some(user) = posted_by {
        content = content.footer(format!("Posted by {}", user));
    }
    if let Some(image) = image {
        content = content.image(ArtifactImage::Upload {
            filename: format!("published-image.{}", image.extension()),
            bytes: image.bytes.clone(),
        });
    }
    content
}

pub fn publish_failed(draft: &DraftState, error: &str, now: DateTime<Utc>) -> ArtifactContent {
    ArtifactContent::new()
        .author(format!("❌ Failed to publish to {}", draft.platform), None)
        .description(format!("{}\n\n⚠️ **Error:** {}", summary(draft), error))
        .color(ERROR_COLOR)
        .timestamp(now)
}

pub fn download_failed(error: &str, now: DateTime<Utc>) -> ArtifactContent {
    ArtifactContent::new()
        .author("❌ Failed to download image", None)
        .description(format!("⚠️ **Error:** {}", error))
        .color(ERROR_COLOR)
        .timestamp(now)
}
