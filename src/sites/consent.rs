use super::Setup;
use crate::browser::{Pacing, Page};
use tracing::{debug, warn};

pub struct ConsentDialog {
    pub banner: &'static str,
    pub clicks: &'static [&'static str],
    pub pause_millis: u64,
    pub pacing: Pacing,
}

#[async_trait::async_trait]
impl Setup for ConsentDialog {
    async fn setup(&self, page: &mut dyn Page, url: &str) -> bool {
        if let Err(e) = page.goto(url).await {
            warn!("Could not open {}: {}", url, e);
            return true;
        }

        match page.exists(self.banner).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("No consent banner on {}", url);
                return true;
            }
            Err(e) => {
                warn!("Could not look for consent banner: {}", e);
                return true;
            }
        }

        for control in self.clicks {
            if let Err(e) = page.click(control).await {
                warn!("Consent dialog click on {} failed: {}", control, e);
                return true;
            }
            self.pacing.settle(self.pause_millis).await;
        }
        true
    }
}
