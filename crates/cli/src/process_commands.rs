//! `tryon run` and `tryon process`: one processing session end to end.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    tokio::sync::mpsc,
    tracing::{debug, info},
    tryon_cache::ImageCache,
    tryon_config::TryonConfig,
    tryon_extractor::PageFetcher,
    tryon_session::{
        ProcessingMode, ProcessingSession, RequestError, SessionError, SessionOptions,
        SessionRequest, WsConnector,
    },
};

use crate::projector::Projector;

pub async fn run(
    config: &TryonConfig,
    page_url: &str,
    custom: bool,
    pick: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let fetcher = PageFetcher::from_config(&config.extractor)?;
    let candidates = fetcher.extract(page_url).await?;
    if candidates.is_empty() {
        bail!("no product image found on {page_url}");
    }
    let Some(candidate) = candidates.get(pick) else {
        bail!(
            "--pick {pick} is out of range; the page has {} candidate(s)",
            candidates.len()
        );
    };
    eprintln!(
        "Using image {} of {} ({} {}): {}",
        pick + 1,
        candidates.len(),
        candidate.locator_kind,
        candidate.locator_value,
        candidate.source_url
    );
    process(config, &candidate.source_url, custom, output).await
}

pub async fn process(
    config: &TryonConfig,
    garment_url: &str,
    custom: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let cache = ImageCache::from_config(&config.cache);
    let mode = if custom {
        ProcessingMode::Custom
    } else {
        ProcessingMode::Quick
    };

    let request = match SessionRequest::for_mode(mode, garment_url, &cache).await {
        Ok(request) => request,
        Err(e) => return Err(request_failed(e)),
    };
    let options = SessionOptions::from_config(config).with_clock(cache.clock());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = ProcessingSession::new(request, &options, Arc::new(WsConnector))
        .map_err(request_failed)?
        .with_events(tx);
    let handle = session.handle();
    info!(session_id = session.id(), %mode, url = %options.service_url, "starting session");
    eprintln!("Sending to {} ({mode} mode)…", options.service_url);

    let task = tokio::spawn(async move { session.start().await });
    let projector = Projector::new(output);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => projector.render(&event)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !handle.is_abandoned() => {
                debug!("interrupt received");
                handle.abandon();
            },
        }
    }

    match task.await.context("session task panicked")? {
        Ok(outcome) if outcome.is_success() => Ok(()),
        Ok(_) => std::process::exit(1),
        Err(SessionError::Abandoned) => {
            eprintln!("Cancelled.");
            std::process::exit(130);
        },
        Err(e) => Err(e.into()),
    }
}

/// Requests fail before any channel exists; name the upload stage when the
/// reference image is the problem.
fn request_failed(err: RequestError) -> anyhow::Error {
    match err {
        RequestError::MissingReference
        | RequestError::ExpiredReference { .. }
        | RequestError::EmptyReference
        | RequestError::Cache(_) => anyhow::anyhow!("upload error: {err}"),
        RequestError::InvalidGarmentUrl { .. } => anyhow::anyhow!("request error: {err}"),
    }
}
