//! CLI subcommands for the cached reference image.

use std::{path::PathBuf, time::Duration};

use {
    anyhow::{Context, Result},
    chrono::{DateTime, Utc},
    clap::Subcommand,
    tryon_cache::{ImageCache, ReferenceImage, read_reference_image},
    tryon_config::TryonConfig,
};

#[derive(Subcommand)]
pub enum ReferenceAction {
    /// Upload a model image used by `--custom` runs.
    Set {
        /// JPEG, PNG or WebP file.
        path: PathBuf,
    },
    /// Show the cached image, if still valid.
    Show,
    /// Forget the cached image.
    Clear,
}

pub async fn handle_reference(action: ReferenceAction, config: &TryonConfig) -> Result<()> {
    let cache = ImageCache::from_config(&config.cache);
    match action {
        ReferenceAction::Set { path } => {
            let encoded = read_reference_image(&path)
                .await
                .map_err(|e| anyhow::anyhow!("upload error: {e}"))?;
            let image = cache.put(encoded).await.context("store reference image")?;
            println!(
                "Reference image stored ({} bytes encoded).",
                image.encoded_data.len()
            );
            println!("Valid until {}.", format_ms(image.expires_at_ms(cache.ttl())));
        },
        ReferenceAction::Show => match cache.get().await? {
            Some(image) => show(&image, &cache),
            None => println!("No reference image cached."),
        },
        ReferenceAction::Clear => {
            cache.clear().await?;
            println!("Reference image cleared.");
        },
    }
    Ok(())
}

fn show(image: &ReferenceImage, cache: &ImageCache) {
    let now = cache.clock().now_ms();
    let kind = image
        .encoded_data
        .split_once(';')
        .map_or("unknown", |(head, _)| head.trim_start_matches("data:"));
    println!("Type:        {kind}");
    println!("Size:        {} bytes encoded", image.encoded_data.len());
    println!("Stored:      {}", format_ms(image.stored_at_ms));
    println!("Expires:     {}", format_ms(image.expires_at_ms(cache.ttl())));
    println!("Age:         {}", format_age(image.age_at(now)));
}

fn format_ms(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| format!("{ms} ms"), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn format_age(age: Duration) -> String {
    let minutes = age.as_secs() / 60;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m}m"),
    }
}
