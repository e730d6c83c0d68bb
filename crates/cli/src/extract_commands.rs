use std::path::PathBuf;

use {
    anyhow::{Context, Result, bail},
    tryon_config::TryonConfig,
    tryon_extractor::{CandidateImage, PageFetcher, extract_candidates},
    url::Url,
};

pub async fn handle_extract(
    config: &TryonConfig,
    page_url: Option<String>,
    file: Option<PathBuf>,
    base_url: Option<String>,
    json: bool,
) -> Result<()> {
    let candidates = match (page_url, file) {
        (Some(page_url), None) => {
            PageFetcher::from_config(&config.extractor)?
                .extract(&page_url)
                .await?
        },
        (None, Some(file)) => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let base = base_url.context("--file needs --base-url")?;
            let base = Url::parse(&base).with_context(|| format!("invalid --base-url {base}"))?;
            extract_candidates(&html, &base, &config.extractor.locators)
        },
        _ => bail!("give either a page URL or --file"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }
    if candidates.is_empty() {
        eprintln!("No product images found.");
        return Ok(());
    }
    for (index, candidate) in candidates.iter().enumerate() {
        println!("{index:>3}  {}", describe(candidate));
    }
    Ok(())
}

fn describe(candidate: &CandidateImage) -> String {
    let mut line = format!(
        "[{} {}] {}",
        candidate.locator_kind, candidate.locator_value, candidate.source_url
    );
    if !candidate.alt.is_empty() {
        line.push_str(&format!("  \"{}\"", candidate.alt));
    }
    if let (Some(width), Some(height)) = (candidate.width, candidate.height) {
        line.push_str(&format!("  {width}x{height}"));
    }
    line
}
