//! Terminal rendering of session progress and outcomes.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    base64::{Engine, engine::general_purpose::STANDARD},
    tryon_session::{SessionEvent, SessionOutcome},
};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

const DEFAULT_RESULT_STEM: &str = "tryon-result";

/// A success payload, decoded for display.
#[derive(Debug, PartialEq, Eq)]
pub enum ResultImage {
    /// The service hosted the result; nothing to decode.
    Url(String),
    Inline {
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl ResultImage {
    /// Classify a `result_image` as a `data:` URL, an http(s) URL, or bare
    /// base64 image data.
    pub fn classify(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .context("data URL has no payload separator")?;
            let Some(mime) = header.strip_suffix(";base64") else {
                bail!("data URL is not base64-encoded");
            };
            let bytes = STANDARD.decode(payload).context("data URL payload")?;
            return Ok(Self::Inline {
                mime: (!mime.is_empty()).then(|| mime.to_string()),
                bytes,
            });
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Url(raw.to_string()));
        }
        let bytes = STANDARD
            .decode(raw)
            .context("result is neither a URL nor base64 image data")?;
        Ok(Self::Inline { mime: None, bytes })
    }

    /// File extension for inline data, sniffed from the bytes.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Inline { bytes, .. } => image::guess_format(bytes)
                .ok()
                .and_then(|format| format.extensions_str().first().copied())
                .unwrap_or("png"),
        }
    }
}

/// Writes progress to stderr and the final result to stdout or disk.
pub struct Projector {
    output: Option<PathBuf>,
}

impl Projector {
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }

    pub fn render(&self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Progress(message) => {
                eprintln!("{DIM}…{RESET} {message}");
                Ok(())
            },
            SessionEvent::Outcome(outcome) => self.render_outcome(outcome),
        }
    }

    fn render_outcome(&self, outcome: &SessionOutcome) -> Result<()> {
        match outcome {
            SessionOutcome::Success { result_image } => {
                let image = ResultImage::classify(result_image)?;
                match &image {
                    ResultImage::Url(url) => {
                        eprintln!("{BOLD}{GREEN}done{RESET} result hosted by the service");
                        println!("{url}");
                    },
                    ResultImage::Inline { bytes, .. } => {
                        let path = self.output_path(image.extension());
                        write_result(&path, bytes)?;
                        eprintln!("{BOLD}{GREEN}done{RESET} {} bytes", bytes.len());
                        println!("{}", path.display());
                    },
                }
            },
            failure => eprintln!("{BOLD}{RED}failed{RESET} {failure}"),
        }
        Ok(())
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{DEFAULT_RESULT_STEM}.{extension}")))
    }
}

fn write_result(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn bare_base64_is_inline() {
        let image = ResultImage::classify(PNG_B64).unwrap();
        assert!(matches!(image, ResultImage::Inline { mime: None, .. }));
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn data_url_keeps_mime() {
        let image = ResultImage::classify(&format!("data:image/png;base64,{PNG_B64}")).unwrap();
        match image {
            ResultImage::Inline { mime, bytes } => {
                assert_eq!(mime.as_deref(), Some("image/png"));
                assert_eq!(&bytes[1..4], b"PNG");
            },
            other => panic!("expected inline image, got {other:?}"),
        }
    }

    #[test]
    fn http_url_is_left_alone() {
        assert_eq!(
            ResultImage::classify("https://results.example/a.jpg").unwrap(),
            ResultImage::Url("https://results.example/a.jpg".into())
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ResultImage::classify("not base64 at all!").is_err());
        assert!(ResultImage::classify("data:image/png,raw").is_err());
    }

    #[test]
    fn success_is_written_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.png");
        let projector = Projector::new(Some(path.clone()));
        projector
            .render(&SessionEvent::Outcome(SessionOutcome::Success {
                result_image: PNG_B64.into(),
            }))
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), STANDARD.decode(PNG_B64).unwrap());
    }
}
