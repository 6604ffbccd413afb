pub mod cache;
pub mod config;
pub mod image_utils;
pub mod logchamp;
pub mod retry;
pub mod text_utils;
pub mod typeface;

#[cfg(test)]
pub mod test_fixtures;
