//! URL validation: probes every candidate application URL concurrently and
//! swaps dead or implausible ones for a per-job search fallback.
//!
//! The batch never fails: a probe that errors, times out or returns non-2xx
//! only changes that job's URL.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, warn};

use crate::jobs::models::JobRecord;
use crate::jobs::urls::{is_plausible_url, job_fallback_url};

/// Existence check for one URL.
#[async_trait]
pub trait LinkProber: Send + Sync {
    /// True only for a 2xx answer after redirects, within the probe budget.
    async fn probe(&self, url: &str) -> bool;
}

/// `HEAD`-request prober with its own short timeout.
#[derive(Clone)]
pub struct HttpLinkProber {
    client: Client,
}

impl HttpLinkProber {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()?,
        })
    }
}

#[async_trait]
impl LinkProber for HttpLinkProber {
    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    debug!("Probe of {url} returned {}", response.status());
                }
                ok
            }
            Err(e) => {
                debug!("Probe of {url} failed: {e}");
                false
            }
        }
    }
}

/// Validates a batch, all probes in flight at once, and waits for every one.
///
/// Implausible URLs are not probed at all.
pub async fn validate_and_fix(prober: &dyn LinkProber, jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    let checks = jobs.into_iter().map(|mut job| async move {
        let live = is_plausible_url(&job.url) && prober.probe(job.url.trim()).await;
        if !live {
            let fallback = job_fallback_url(&job.company, &job.title);
            warn!(
                "Replacing unusable URL for job {} ({:?}) with search fallback",
                job.id, job.url
            );
            job.url = fallback;
        }
        job
    });
    join_all(checks).await
}
