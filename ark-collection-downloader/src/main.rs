use anyhow::{Context, Result};
use ark_collection_downloader::{
    services::{
        downloader::image_client, ipfs::IpfsGateways, marketplace::opensea::OpenSeaClient,
    },
    utils::app_config::AppConfig,
    CollectionDownloader, DownloadOptions, DownloaderError,
};
use clap::{Arg, ArgMatches, Command};
use dotenv::dotenv;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn cli() -> Command<'static> {
    Command::new("ark-collection-downloader")
        .about("Mass download the images (and optionally the metadata) of an NFT collection")
        .arg(
            Arg::new("collection")
                .required(true)
                .takes_value(true)
                .help("Collection name (slug) to download"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .help("YAML configuration file"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .takes_value(true)
                .help("Directory where collections are stored"),
        )
        .arg(
            Arg::new("save-metadata")
                .short('m')
                .long("save-metadata")
                .help("Also save the JSON record of each item"),
        )
        .arg(
            Arg::new("concurrency")
                .short('j')
                .long("concurrency")
                .takes_value(true)
                .help("Maximum number of images downloaded at the same time"),
        )
}

fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(output_dir) = matches.value_of("output-dir") {
        config.output_dir = output_dir.to_string();
    }
    if matches.is_present("save-metadata") {
        config.save_metadata = true;
    }
    if let Some(concurrency) = matches.value_of("concurrency") {
        config.max_concurrent_downloads = concurrency
            .parse()
            .with_context(|| format!("Invalid concurrency: {}", concurrency))?;
    }
    config.validate()?;
    Ok(())
}

async fn run(matches: &ArgMatches, config: &AppConfig) -> Result<()> {
    let collection = matches
        .value_of("collection")
        .context("Missing collection name")?
        .to_lowercase();

    let marketplace = OpenSeaClient::new(
        &config.api_base_url,
        config.api_key.clone(),
        config.user_agents.clone(),
        config.request_timeout(),
    )?;
    let user_agent = config
        .primary_user_agent()
        .context("At least one user agent is required")?;
    let http = image_client(user_agent, config.request_timeout())?;
    let gateways = IpfsGateways::new(&config.ipfs_gateway_uri, &config.ipfs_fallback_gateways)?;

    let downloader =
        CollectionDownloader::new(marketplace, http, gateways, DownloadOptions::from(config));

    let summary = downloader.download_collection(&collection).await?;

    info!("Finished downloading \"{}\": {}", collection, summary);
    println!("Finished downloading collection.");
    println!("{}", summary);
    println!(
        "You can find the images in the {}/{} folder.",
        config.output_dir, collection
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let matches = cli().get_matches();

    let mut config = match AppConfig::load(matches.value_of("config")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.rust_log);

    if let Err(e) = apply_overrides(&mut config, &matches) {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&matches, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<DownloaderError>() {
                Some(DownloaderError::CollectionNotFound(_)) => println!("No collection found."),
                Some(DownloaderError::Throttled(_)) => {
                    println!("Too many requests, try again later.")
                }
                _ => {}
            }
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_directives: &str) {
    // Initialize the LogTracer to convert `log` records to `tracing` events
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Setting log tracer failed: {}", e);
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let fmt_layer = fmt::layer();

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Setting default subscriber failed: {}", e);
    }
}
