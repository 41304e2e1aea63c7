//! Slash command definitions

use libcrosspost::PlatformKind;
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, CreateCommand,
    CreateCommandOption,
};

pub const POST: &str = "post";
const PLATFORM_OPTION: &str = "platform";

fn choice_label(platform: PlatformKind) -> &'static str {
    match platform {
        PlatformKind::X => "𝕏 (Twitter)",
        PlatformKind::LinkedIn => "LinkedIn",
        PlatformKind::Instagram => "Instagram",
        PlatformKind::Dribbble => "Dribbble",
    }
}

/// `/post platform:<choice>`
pub fn post() -> CreateCommand {
    let option = PlatformKind::ALL.iter().fold(
        CreateCommandOption::new(
            CommandOptionType::String,
            PLATFORM_OPTION,
            "Select the platform to post to",
        )
        .required(true),
        |option, platform| option.add_string_choice(choice_label(*platform), platform.as_str()),
    );

    CreateCommand::new(POST)
        .description("Post content to social media platforms")
        .add_option(option)
}

/// Every command the bot registers
pub fn all() -> Vec<CreateCommand> {
    vec![post()]
}

/// Parse the chosen platform value
pub fn parse_platform(value: Option<&str>) -> Result<PlatformKind, String> {
    let value = value.ok_or_else(|| "❌ Please choose a platform.".to_string())?;
    value
        .parse()
        .map_err(|_| format!("❌ Unknown platform \"{}\".", value))
}

pub fn platform_of(command: &CommandInteraction) -> Result<PlatformKind, String> {
    let value = command
        .data
        .options
        .iter()
        .find(|o| o.name == PLATFORM_OPTION)
        .and_then(|o| match &o.value {
            CommandDataOptionValue::String(s) => Some(s.as_str()),
            _ => None,
        });
    parse_platform(value)
}
