use std::fmt;

use super::templates::{BrainMode, FreeformSpec, TemplateRegistry, TemplateSpec};

/// What to render and how much content that takes.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub template: TemplateSpec,
    pub required_photo_count: usize,
    pub required_text_count: usize,
}

impl RenderRequest {
    pub fn new(template: TemplateSpec) -> Self {
        let (required_photo_count, required_text_count) = template.required_counts();
        Self { template, required_photo_count, required_text_count }
    }

    /// Parses command-style arguments, such as `meme 3 text`, `zsa 666 4 2` or the name of a
    /// custom template.
    pub fn parse<S: AsRef<str>>(
        arguments: &[S],
        registry: &TemplateRegistry,
    ) -> Result<Self, ParseError> {
        let mut arguments = arguments.iter().map(AsRef::as_ref);
        let command = arguments
            .next()
            .map(|command| command.trim_start_matches(['.', '/']).to_lowercase())
            .ok_or(ParseError::MissingCommand)?;

        let template = match command.as_str() {
            "meme" => match (arguments.next(), arguments.next()) {
                (Some("2"), _) => TemplateSpec::TwoButtons,
                (Some("3"), Some("text")) | (Some("4"), _) => {
                    TemplateSpec::ExpandingBrain(BrainMode::Texts)
                }
                (Some("3"), _) => TemplateSpec::ExpandingBrain(BrainMode::Photos),
                _ => TemplateSpec::Drake,
            },
            "zsa" => TemplateSpec::Freeform(parse_freeform(arguments)?),
            name => match registry.get(name) {
                Some(template) => TemplateSpec::Custom(template),
                None => Err(ParseError::UnknownCommand(name.into()))?,
            },
        };

        Ok(Self::new(template))
    }
}

const CUSTOM_LEVEL: u32 = 666;

fn parse_freeform<'a>(
    mut arguments: impl Iterator<Item = &'a str>,
) -> Result<FreeformSpec, ParseError> {
    let level = match arguments.next() {
        // a level that isn't a number falls back to the first preset, like an unknown one does
        Some(level) => level.parse().unwrap_or(1),
        None => 1,
    };

    if level != CUSTOM_LEVEL {
        return Ok(FreeformSpec::level(level));
    }

    let photos = count(arguments.next(), 6, "photo count")?;
    let quotes = count(arguments.next(), 4, "text count")?;

    Ok(FreeformSpec::custom(photos, quotes))
}

fn count(argument: Option<&str>, default: usize, name: &'static str) -> Result<usize, ParseError> {
    argument.map_or(Ok(default), |argument| {
        argument.parse().map_err(|_| ParseError::BadArgument(name))
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingCommand,
    UnknownCommand(String),
    BadArgument(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "no command given, try \"meme\" or \"zsa\""),
            Self::UnknownCommand(name) => write!(f, "unknown command or template: {name}"),
            Self::BadArgument(name) => write!(f, "invalid {name}"),
        }
    }
}

impl std::error::Error for ParseError {}
