//! Page extractor: locate product images on a shop page.
//!
//! A fixed table of [`Locator`]s names where supported shops put their
//! product image. [`extract_candidates`] scans a page's `<img>` tags against
//! that table; [`PageFetcher`] downloads the page first.

pub mod error;
pub mod extract;
pub mod fetch;
pub mod html;

pub use {
    error::{ExtractError, Result},
    extract::{CandidateImage, extract_candidates},
    fetch::{Page, PageFetcher},
    tryon_config::{Locator, LocatorKind, schema::default_locators},
};
