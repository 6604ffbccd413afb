use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::{fmt, fs, io};

use serde::{Deserialize, Serialize};

use super::placement::Rect;
use super::{ContentItem, RenderError};
use crate::sources::ContentKind;

/// Named bounding box in a template that accepts one kind of content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: Cow<'static, str>,
    pub rect: Rect,
    pub kind: ContentKind,
}

impl Slot {
    const fn photo(name: &'static str, rect: Rect) -> Self {
        Self { name: Cow::Borrowed(name), rect, kind: ContentKind::Photo }
    }

    const fn text(name: &'static str, rect: Rect) -> Self {
        Self { name: Cow::Borrowed(name), rect, kind: ContentKind::Text }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub size: f32,
    pub line_height: f32,
    /// texts longer than this are cut off with an ellipsis
    pub max_chars: usize,
    /// horizontal space kept free inside a text slot, split between both sides
    pub padding: u32,
    pub color: [u8; 4],
}

impl TextStyle {
    const DEFAULT: Self =
        Self { size: 16., line_height: 20., max_chars: 50, padding: 0, color: [0, 0, 0, 255] };
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Text that belongs to the template itself, drawn on top of everything else.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedCaption {
    pub text: String,
    pub rect: Rect,
    pub size: f32,
    #[serde(default = "white")]
    pub color: [u8; 4],
}

const fn white() -> [u8; 4] {
    [255, 255, 255, 255]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: Cow<'static, str>,
    #[serde(default = "first_version")]
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub slots: Cow<'static, [Slot]>,
    #[serde(default)]
    pub text_style: TextStyle,
    /// image file under the assets directory used as the base layer
    #[serde(default)]
    pub backdrop: Option<Cow<'static, str>>,
    #[serde(default)]
    pub captions: Cow<'static, [FixedCaption]>,
}

const fn first_version() -> u32 {
    1
}

impl Template {
    pub fn slot_count(&self, kind: ContentKind) -> usize {
        self.slots.iter().filter(|slot| slot.kind == kind).count()
    }

    pub const fn canvas(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn validate(&self) -> Result<(), TemplateError> {
        if self.name.trim().is_empty() {
            Err(TemplateError::Invalid { template: self.name.to_string(), reason: "empty name" })?;
        }

        if RESERVED_NAMES.contains(&&*self.name) {
            Err(TemplateError::Invalid {
                template: self.name.to_string(),
                reason: "name is taken by a built-in command",
            })?;
        }

        let canvas = self.canvas();
        let out_of_bounds = self.slots.iter().any(|slot| !canvas.contains(&slot.rect))
            || self.captions.iter().any(|caption| !canvas.contains(&caption.rect));
        if out_of_bounds {
            Err(TemplateError::Invalid {
                template: self.name.to_string(),
                reason: "a slot or caption is outside of the canvas",
            })?;
        }

        for (i, slot) in self.slots.iter().enumerate() {
            if self.slots[i + 1..].iter().any(|other| other.name == slot.name) {
                Err(TemplateError::Invalid {
                    template: self.name.to_string(),
                    reason: "slot names are not unique",
                })?;
            }
        }

        Ok(())
    }
}

const RESERVED_NAMES: [&str; 2] = ["meme", "zsa"];

static DRAKE_SLOTS: [Slot; 2] = [
    Slot::photo("top", Rect::new(500, 50, 400, 350)),
    Slot::photo("bottom", Rect::new(500, 500, 400, 350)),
];

pub static DRAKE: Template = Template {
    name: Cow::Borrowed("drake"),
    version: 1,
    width: 960,
    height: 960,
    slots: Cow::Borrowed(&DRAKE_SLOTS),
    text_style: TextStyle::DEFAULT,
    backdrop: Some(Cow::Borrowed("meme1.jpeg")),
    captions: Cow::Borrowed(&[]),
};

static TWO_BUTTONS_SLOTS: [Slot; 4] = [
    Slot::photo("left", Rect::new(45, 45, 170, 114)),
    Slot::photo("right", Rect::new(266, 39, 143, 81)),
    Slot::text("left-label", Rect::new(112, 248, 181, 35)),
    Slot::text("right-label", Rect::new(314, 186, 181, 35)),
];

pub static TWO_BUTTONS: Template = Template {
    name: Cow::Borrowed("two-buttons"),
    version: 1,
    width: 500,
    height: 756,
    slots: Cow::Borrowed(&TWO_BUTTONS_SLOTS),
    text_style: TextStyle::DEFAULT,
    backdrop: Some(Cow::Borrowed("meme2.jpeg")),
    captions: Cow::Borrowed(&[]),
};

const BRAIN_LEVELS: [Rect; 6] = [
    Rect::new(13, 11, 100, 40),
    Rect::new(12, 74, 100, 45),
    Rect::new(11, 142, 102, 46),
    Rect::new(13, 211, 106, 42),
    Rect::new(15, 269, 102, 45),
    Rect::new(21, 339, 88, 53),
];

static BRAIN_PHOTO_SLOTS: [Slot; 6] = [
    Slot::photo("level-1", BRAIN_LEVELS[0]),
    Slot::photo("level-2", BRAIN_LEVELS[1]),
    Slot::photo("level-3", BRAIN_LEVELS[2]),
    Slot::photo("level-4", BRAIN_LEVELS[3]),
    Slot::photo("level-5", BRAIN_LEVELS[4]),
    Slot::photo("level-6", BRAIN_LEVELS[5]),
];

static BRAIN_TEXT_SLOTS: [Slot; 6] = [
    Slot::text("level-1", BRAIN_LEVELS[0]),
    Slot::text("level-2", BRAIN_LEVELS[1]),
    Slot::text("level-3", BRAIN_LEVELS[2]),
    Slot::text("level-4", BRAIN_LEVELS[3]),
    Slot::text("level-5", BRAIN_LEVELS[4]),
    Slot::text("level-6", BRAIN_LEVELS[5]),
];

pub static BRAIN_PHOTOS: Template = Template {
    name: Cow::Borrowed("expanding-brain"),
    version: 1,
    width: 260,
    height: 404,
    slots: Cow::Borrowed(&BRAIN_PHOTO_SLOTS),
    text_style: TextStyle::DEFAULT,
    backdrop: Some(Cow::Borrowed("meme3.jpg")),
    captions: Cow::Borrowed(&[]),
};

pub static BRAIN_TEXTS: Template = Template {
    name: Cow::Borrowed("expanding-brain-text"),
    version: 1,
    width: 260,
    height: 404,
    slots: Cow::Borrowed(&BRAIN_TEXT_SLOTS),
    text_style: TextStyle {
        size: 12.,
        line_height: 14.,
        max_chars: 30,
        padding: 10,
        color: [0, 0, 0, 255],
    },
    backdrop: Some(Cow::Borrowed("meme3.jpg")),
    captions: Cow::Borrowed(&[]),
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrainMode {
    Photos,
    Texts,
}

pub const MAX_FREEFORM_ITEMS: usize = 10;

/// Randomized demotivator layout: photos scattered over a picture area, quotes stacked on it and
/// a title with a subtitle underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeformSpec {
    pub photos: usize,
    pub quotes: usize,
    pub area: (u32, u32),
    pub photo_size: u32,
}

impl FreeformSpec {
    pub const DEFAULT_AREA: (u32, u32) = (800, 600);
    pub const DEFAULT_PHOTO_SIZE: u32 = 120;

    /// preset item counts; unknown levels get the first preset
    pub const fn level(level: u32) -> Self {
        let (photos, quotes) = match level {
            2 => (3, 3),
            3 => (5, 5),
            _ => (2, 1),
        };

        Self::new(photos, quotes)
    }

    pub fn custom(photos: usize, quotes: usize) -> Self {
        Self::new(photos.min(MAX_FREEFORM_ITEMS), quotes.min(MAX_FREEFORM_ITEMS))
    }

    const fn new(photos: usize, quotes: usize) -> Self {
        Self { photos, quotes, area: Self::DEFAULT_AREA, photo_size: Self::DEFAULT_PHOTO_SIZE }
    }

    #[cfg(test)]
    pub const fn with_area(mut self, width: u32, height: u32) -> Self {
        self.area = (width, height);
        self
    }

    #[cfg(test)]
    pub const fn with_photo_size(mut self, photo_size: u32) -> Self {
        self.photo_size = photo_size;
        self
    }

    /// one title and one subtitle on top of the quotes
    pub const fn texts(&self) -> usize {
        self.quotes + 2
    }
}

#[derive(Clone, Debug)]
pub enum TemplateSpec {
    Drake,
    TwoButtons,
    ExpandingBrain(BrainMode),
    Custom(Arc<Template>),
    Freeform(FreeformSpec),
}

pub enum Layout<'a> {
    Fixed(&'a Template),
    Freeform(&'a FreeformSpec),
}

impl TemplateSpec {
    pub fn layout(&self) -> Layout<'_> {
        match self {
            Self::Drake => Layout::Fixed(&DRAKE),
            Self::TwoButtons => Layout::Fixed(&TWO_BUTTONS),
            Self::ExpandingBrain(BrainMode::Photos) => Layout::Fixed(&BRAIN_PHOTOS),
            Self::ExpandingBrain(BrainMode::Texts) => Layout::Fixed(&BRAIN_TEXTS),
            Self::Custom(template) => Layout::Fixed(template),
            Self::Freeform(spec) => Layout::Freeform(spec),
        }
    }

    pub fn required_counts(&self) -> (usize, usize) {
        match self.layout() {
            Layout::Fixed(template) => {
                (template.slot_count(ContentKind::Photo), template.slot_count(ContentKind::Text))
            }
            Layout::Freeform(spec) => (spec.photos, spec.texts()),
        }
    }
}

/// Pairs every slot of `template` with an item of its kind, in slot and item order.
///
/// Fails when the number of items of a kind differs from the number of slots of that kind.
pub fn apply(
    template: &Template,
    items: Vec<ContentItem>,
) -> Result<Vec<(Rect, ContentItem)>, RenderError> {
    for kind in [ContentKind::Photo, ContentKind::Text] {
        let slots = template.slot_count(kind);
        let supplied = items.iter().filter(|item| item.kind() == kind).count();
        if slots != supplied {
            Err(RenderError::SlotMismatch { kind, slots, supplied })?;
        }
    }

    let (mut photos, mut texts): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| item.kind() == ContentKind::Photo);
    photos.reverse();
    texts.reverse();

    let mut mapped = Vec::with_capacity(template.slots.len());
    for slot in &*template.slots {
        let queue = match slot.kind {
            ContentKind::Photo => &mut photos,
            ContentKind::Text => &mut texts,
        };
        if let Some(item) = queue.pop() {
            mapped.push((slot.rect, item));
        }
    }

    Ok(mapped)
}

#[derive(Debug)]
pub enum TemplateError {
    Io(io::Error),
    Malformed(serde_json::Error),
    Invalid { template: String, reason: &'static str },
    Duplicate(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read templates: {err}"),
            Self::Malformed(err) => write!(f, "malformed templates: {err}"),
            Self::Invalid { template, reason } => write!(f, "template {template:?}: {reason}"),
            Self::Duplicate(name) => write!(f, "template {name:?} is defined more than once"),
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<io::Error> for TemplateError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Custom templates by name, loaded once and shared read-only.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// parses a JSON array of templates
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let mut templates = HashMap::new();

        for template in serde_json::from_str::<Vec<Template>>(json)? {
            template.validate()?;
            let name = template.name.to_string();
            if templates.insert(name.clone(), Arc::new(template)).is_some() {
                Err(TemplateError::Duplicate(name))?;
            }
        }

        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
