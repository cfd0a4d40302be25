//! The interrupting surface shown over a blocked package.

use tracing::debug;

/// Shows the interstitial for a blocked package.
pub trait Interstitial {
    fn show(&self, package: &str) -> std::io::Result<()>;
}

/// Opens a deep link back into the controlling app, e.g.
/// `sakina://gate?blocked=com.example.app`.
#[derive(Debug, Clone)]
pub struct DeepLinkInterstitial {
    base_uri: String,
}

impl DeepLinkInterstitial {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    pub fn uri_for(&self, package: &str) -> String {
        let separator = if self.base_uri.contains('?') { '&' } else { '?' };
        format!(
            "{}{}blocked={}",
            self.base_uri,
            separator,
            urlencoding::encode(package)
        )
    }
}

impl Interstitial for DeepLinkInterstitial {
    fn show(&self, package: &str) -> std::io::Result<()> {
        let uri = self.uri_for(package);
        debug!(%uri, "opening interstitial");
        open::that_detached(&uri)
    }
}
