//! Default configuration template with every option documented.
//!
//! Written by `tryon config init`. Values match `TryonConfig::default()`.

use crate::schema::{ExtractorConfig, LocatorKind};

/// Render the commented default config file.
pub fn default_config_template() -> String {
    let extractor = ExtractorConfig::default();
    let mut locators = String::new();
    for locator in &extractor.locators {
        let kind = match locator.kind {
            LocatorKind::Id => "id",
            LocatorKind::Class => "class",
        };
        locators.push_str(&format!(
            "[[extractor.locators]]\nkind = \"{kind}\"\nvalue = \"{}\"\n\n",
            locator.value
        ));
    }

    format!(
        r##"# tryon configuration
# ===================
# Environment variable substitution is supported: ${{ENV_VAR}} or
# ${{ENV_VAR:-fallback}}.

# ──────────────────────────────────────────────────────────────────────────────
# PROCESSING SERVICE
# ──────────────────────────────────────────────────────────────────────────────

[service]
url = "ws://localhost:8765"        # WebSocket endpoint (env: TRYON_SERVICE_URL)
connect_timeout_secs = 10          # Give up if the channel is not open by then

# ──────────────────────────────────────────────────────────────────────────────
# REFERENCE IMAGE CACHE
# ──────────────────────────────────────────────────────────────────────────────

[cache]
backend = "file"                   # "file" (persists across runs) or "memory"
ttl_hours = 24                     # Uploaded model image expires after this
# path = "/path/to/reference_image.json"   # Defaults to the data directory

# ──────────────────────────────────────────────────────────────────────────────
# PAGE EXTRACTOR
# ──────────────────────────────────────────────────────────────────────────────
# Id locators are tried first; class locators only when no id matched.
# A class locator with several space-separated names requires all of them.

[extractor]
timeout_secs = {timeout}
user_agent = "{user_agent}"

{locators}"##,
        timeout = extractor.timeout_secs,
        user_agent = extractor.user_agent,
    )
}
