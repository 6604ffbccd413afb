use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use image::ImageFormat;

const LOG_FILE: &str = "COLLAGE_LOG";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            _ => Err(()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.variable, self.value)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub struct Config {
    pub library: PathBuf,
    pub font: Option<PathBuf>,
    pub assets: Option<PathBuf>,
    pub templates: Option<PathBuf>,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub sample_timeout: Duration,
    pub photo_cache_capacity: usize,
    pub avatar_cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|variable| env::var(variable).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = |variable: &str| {
            lookup(variable).filter(|value| !value.is_empty()).map(PathBuf::from)
        };

        Ok(Self {
            library: path("COLLAGE_LIBRARY").unwrap_or_else(|| "library.json".into()),
            font: path("COLLAGE_FONT"),
            assets: path("COLLAGE_ASSETS"),
            templates: path("COLLAGE_TEMPLATES"),
            output: path("COLLAGE_OUTPUT").unwrap_or_else(|| "collage.jpg".into()),
            format: parse(&lookup, "COLLAGE_FORMAT", OutputFormat::Jpeg)?,
            sample_timeout: Duration::from_secs(parse(&lookup, "COLLAGE_SAMPLE_TIMEOUT", 20)?),
            photo_cache_capacity: parse(&lookup, "COLLAGE_PHOTO_CACHE", 256)?,
            avatar_cache_capacity: parse(&lookup, "COLLAGE_AVATAR_CACHE", 128)?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    variable: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(variable) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError { variable, value })
        }
        _ => Ok(default),
    }
}

/// the log file has to be known before the rest of the config is parsed and can be reported
pub fn log_file() -> PathBuf {
    env::var(LOG_FILE).map_or_else(|_| ".log".into(), PathBuf::from)
}
