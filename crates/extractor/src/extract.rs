use {
    serde::Serialize,
    tracing::{debug, trace},
    tryon_config::{Locator, LocatorKind},
    url::Url,
};

use crate::html::{ImgTag, img_tags};

/// An image found on a page, with the locator that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateImage {
    /// Absolute URL of the image.
    pub source_url: String,
    pub locator_kind: LocatorKind,
    pub locator_value: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Find product images in `html`.
///
/// Id locators win: when any of them matches, only id matches are returned.
/// Otherwise every class locator is tried in table order; an element is
/// reported once, under the first locator that matched it. Images without a
/// usable `src` are skipped.
pub fn extract_candidates(html: &str, base_url: &Url, locators: &[Locator]) -> Vec<CandidateImage> {
    let tags = img_tags(html);
    trace!(images = tags.len(), "scanned page");

    let by_id = collect(&tags, base_url, locators, LocatorKind::Id);
    if !by_id.is_empty() {
        debug!(count = by_id.len(), "matched by id");
        return by_id;
    }
    let by_class = collect(&tags, base_url, locators, LocatorKind::Class);
    debug!(count = by_class.len(), "matched by class");
    by_class
}

fn collect(
    tags: &[ImgTag],
    base_url: &Url,
    locators: &[Locator],
    kind: LocatorKind,
) -> Vec<CandidateImage> {
    let mut taken = vec![false; tags.len()];
    let mut found = Vec::new();
    for locator in locators.iter().filter(|l| l.kind == kind) {
        for (index, tag) in tags.iter().enumerate() {
            if taken[index] || !matches(tag, locator) {
                continue;
            }
            let Some(source_url) = resolve_src(tag, base_url) else {
                continue;
            };
            taken[index] = true;
            found.push(CandidateImage {
                source_url,
                locator_kind: locator.kind,
                locator_value: locator.value.clone(),
                alt: tag.attr("alt").unwrap_or_default().to_string(),
                width: tag.dimension("width"),
                height: tag.dimension("height"),
            });
        }
    }
    found
}

fn matches(tag: &ImgTag, locator: &Locator) -> bool {
    match locator.kind {
        LocatorKind::Id => tag.id() == Some(locator.value.as_str()),
        LocatorKind::Class => tag.has_all_classes(&locator.value),
    }
}

fn resolve_src(tag: &ImgTag, base_url: &Url) -> Option<String> {
    let src = tag.attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    match base_url.join(src) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            debug!(src, error = %e, "unresolvable image src");
            None
        },
    }
}
