use anyhow::{Context, Result};
use darwin::Client;
use std::path::Path;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Usage: DARWIN_API_KEY=... pull_latest_release team/dataset
    env_logger::init();

    let api_key = std::env::var("DARWIN_API_KEY").context("DARWIN_API_KEY is not set")?;
    let identifier = std::env::args()
        .nth(1)
        .context("usage: pull_latest_release <team/dataset>")?;

    let client = Client::from_api_key(&api_key, None)?;
    println!("{client}");

    for dataset in client.list_remote_datasets(None)? {
        println!(
            "{:<40} {:>8} images {:>5.1}% annotated",
            dataset.identifier(),
            dataset.image_count,
            dataset.progress * 100.0
        );
    }

    let dataset = client.get_remote_dataset(identifier.as_str())?;
    let release = dataset.get_release("latest")?;
    let target = dataset
        .local_path()?
        .join("releases")
        .join(format!("{}.zip", release.version()));
    let path = release.download_zip_with_progress(Path::new(&target), true)?;
    println!("{} -> {}", release.identifier(), path.display());
    Ok(())
}
