//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MEMESMITH_DEBUG")]
    /// Enable debug logging. Env: MEMESMITH_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "MEMESMITH_PORT")]
    /// http listener, defaults to `3000`.
    /// Env: MEMESMITH_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MEMESMITH_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: MEMESMITH_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(required = true, long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// API key for the completion service.
    /// Env: OPENAI_API_KEY
    pub openai_api_key: String,

    #[clap(
        long,
        default_value = "https://api.openai.com",
        env = "MEMESMITH_OPENAI_URL"
    )]
    /// Completion service base URL.
    /// Env: MEMESMITH_OPENAI_URL
    pub openai_url: Url,

    #[clap(long, short, default_value = "gpt-5.2", env = "MEMESMITH_MODEL")]
    /// Model used for caption generation.
    /// Env: MEMESMITH_MODEL
    pub model: String,

    #[clap(
        long,
        default_value = "https://api.memegen.link",
        env = "MEMESMITH_MEMEGEN_URL"
    )]
    /// Base URL of the template listing + image rendering service.
    /// Env: MEMESMITH_MEMEGEN_URL
    pub memegen_url: Url,

    #[clap(long, env = "MEMESMITH_IMAGE_DIR")]
    /// Directory rendered memes are stored in, eg `./images`.
    /// Env: MEMESMITH_IMAGE_DIR
    pub image_dir: Option<PathBuf>,

    #[clap(long, default_value = "memes.json", env = "MEMESMITH_TEMPLATE_SNAPSHOT")]
    /// Path of the template catalog snapshot file.
    /// Env: MEMESMITH_TEMPLATE_SNAPSHOT
    pub template_snapshot: PathBuf,
}
