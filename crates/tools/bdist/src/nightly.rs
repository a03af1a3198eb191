//! Nightly release archives.

use setup_agda_core::{Os, Platform};

const NIGHTLY_BASE_URL: &str = "https://github.com/agda/agda/releases/download/nightly";

/// Archive URL of the nightly build for a platform.
#[must_use]
pub fn nightly_url(platform: &Platform) -> String {
    let file = match platform.os {
        Os::Linux => "Agda-nightly-linux.tar.xz",
        Os::Darwin => "Agda-nightly-macOS.tar.xz",
        Os::Windows => "Agda-nightly-win64.zip",
    };
    format!("{NIGHTLY_BASE_URL}/{file}")
}
