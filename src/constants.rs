//! Shared constants for the meme pipeline
//!

use std::path::PathBuf;
use std::sync::LazyLock;

/// The default place we put rendered memes
pub static IMAGE_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./images"));

/// Placeholder requester name used when no name is submitted
pub const DEFAULT_REQUESTER_NAME: &str = "Mr. X";

/// File extension of rendered memes
pub const IMAGE_EXTENSION: &str = "jpg";

/// Name of the structured-output function offered to the completion service
pub const CAPTION_FUNCTION_NAME: &str = "generate_meme_captions";

/// Sampling temperature for caption completions
pub const COMPLETION_TEMPERATURE: f32 = 1.0;

/// Token budget for caption completions
pub const COMPLETION_MAX_TOKENS: u32 = 3048;

/// Nucleus sampling setting for caption completions
pub const COMPLETION_TOP_P: f32 = 1.0;

/// Frequency penalty for caption completions
pub const COMPLETION_FREQUENCY_PENALTY: f32 = 0.0;

/// Presence penalty for caption completions
pub const COMPLETION_PRESENCE_PENALTY: f32 = 0.2;

/// Timeout (in seconds) applied to every outbound service call.
pub const OUTBOUND_TIMEOUT_SECONDS: u64 = 60;

/// Max age (in seconds) for meme image cache entries.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Shared cache max age (in seconds) for meme image cache entries.
pub const IMAGE_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24;

/// Stale-while-revalidate window (in seconds) for meme image cache entries.
pub const IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS: u64 = 60 * 60 * 24;

/// Cache-Control value for meme image responses.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
        IMAGE_CACHE_MAX_AGE_SECONDS,
        IMAGE_CACHE_S_MAXAGE_SECONDS,
        IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS
    )
});
