use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use memesmith::captions::{CaptionGenerator, OpenAiBackend};
use memesmith::catalog::TemplateCatalog;
use memesmith::config::setup_logging;
use memesmith::constants::{IMAGE_DIR, OUTBOUND_TIMEOUT_SECONDS};
use memesmith::pipeline::MemePipeline;
use memesmith::render::{HttpImageFetcher, ImageAssembler, ImageStore};
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread", worker_threads = 32)]
async fn main() {
    let cli = memesmith::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(OUTBOUND_TIMEOUT_SECONDS))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            error!("HTTP client error: {}", err);
            return;
        }
    };

    let catalog = match TemplateCatalog::load(&cli.template_snapshot, &client, &cli.memegen_url)
        .await
    {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("Template catalog error: {}", err);
            return;
        }
    };
    info!("Loaded {} meme templates", catalog.len());

    let backend = OpenAiBackend::new(
        client.clone(),
        cli.openai_url.clone(),
        cli.openai_api_key.clone(),
    );
    let generator = CaptionGenerator::new(Arc::new(backend), cli.model.clone());

    let image_dir = cli.image_dir.clone().unwrap_or_else(|| IMAGE_DIR.clone());
    let assembler = ImageAssembler::new(
        Arc::new(HttpImageFetcher::new(client)),
        ImageStore::new(image_dir.clone()),
        cli.memegen_url.clone(),
    );

    let pipeline = MemePipeline::new(Arc::new(catalog), generator, assembler);

    if let Err(err) = memesmith::web::setup_server(
        &cli.listen_address,
        cli.port,
        Arc::new(pipeline),
        image_dir,
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
