use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use collage::renderer::{CollageRenderer, Progress, ProgressCallback, RenderSettings};
use collage::request::RenderRequest;
use collage::templates::TemplateRegistry;
use collage::{AuthorCache, PhotoCache};
use sources::local::LocalLibrary;
use utilities::config::{self, Config};
use utilities::logchamp;
use utilities::typeface::Typeface;

mod collage;
mod sources;
mod utilities;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logchamp::init(&config::log_file());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let typeface = match &config.font {
        Some(path) => Typeface::load(path)?,
        None => {
            log::warn!("COLLAGE_FONT is not set, falling back to block glyphs");
            Typeface::Block
        }
    };

    let registry = match &config.templates {
        Some(path) => TemplateRegistry::load(path)?,
        None => TemplateRegistry::default(),
    };
    if !registry.is_empty() {
        log::info!("loaded {} custom templates", registry.len());
    }

    let arguments = env::args().skip(1).collect::<Vec<_>>();
    let request = RenderRequest::parse(&arguments, &registry)?;

    let library = Arc::new(LocalLibrary::open(&config.library).await?);
    let renderer = CollageRenderer::new(
        library.clone(),
        library,
        Arc::new(PhotoCache::new(config.photo_cache_capacity)),
        Arc::new(AuthorCache::new(config.avatar_cache_capacity)),
        Arc::new(typeface),
        RenderSettings {
            format: config.format,
            assets: config.assets,
            seed: None,
            sample_timeout: config.sample_timeout,
        },
    );

    let progress: ProgressCallback<'_> = &|event: Progress| log::info!("{event}");
    let image = renderer.render(&request, Some(progress)).await?;

    tokio::fs::write(&config.output, &image.bytes).await?;
    log::info!(
        "saved {}x{} {:?} collage to {}",
        image.width,
        image.height,
        image.format,
        config.output.display()
    );

    Ok(())
}
