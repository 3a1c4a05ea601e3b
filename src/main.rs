use clap::Parser;
use corner_crop::backend::HttpBackend;
use corner_crop::config::Config;
use corner_crop::CornerCropApp;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "corner-crop", version, about = "Select four corners and send them for processing")]
struct Cli {
    /// Image to open on startup
    image: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Processing endpoint, overrides the config file
    #[arg(long, env = "CORNER_CROP_BACKEND_URL")]
    backend_url: Option<String>,

    /// Corner marker size in points
    #[arg(long)]
    marker_size: Option<f32>,
}

fn load_config(cli: &Cli) -> Result<Config, corner_crop::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.backend_url {
        config = config.with_backend_url(url.clone());
    }
    if let Some(size) = cli.marker_size {
        config = config.with_marker_size(size);
    }
    Ok(config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Critical Error: {e}");
            std::process::exit(1);
        }
    };
    let backend = match HttpBackend::new(&config.backend_url, config.request_timeout()) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{}", e.status_text());
            std::process::exit(1);
        }
    };
    log::info!("Processing endpoint: {}", backend.endpoint());

    let title = match cli.image.as_ref().and_then(|p| p.file_name()) {
        Some(name) => format!("corner-crop — {}", name.to_string_lossy()),
        None => "corner-crop".to_string(),
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let initial = cli.image;
    if let Err(e) = eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            Ok(Box::new(CornerCropApp::new(
                cc,
                config,
                Arc::new(backend),
                initial,
            )?))
        }),
    ) {
        log::error!("Failed to run eframe: {e}");
        std::process::exit(1);
    }
}
