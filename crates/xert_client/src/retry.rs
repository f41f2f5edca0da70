use rand::{RngExt, rng};
use std::time::Duration;

/// Retries a call when the error is classified as transient.
///
/// Defaults to a single immediate retry: upstream failures that survive one
/// more attempt are left for the next scheduled poll cycle.
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub async fn retry_if<F, Fut, T, E, P>(&self, mut f: F, mut transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !transient(&e) {
                        return Err(e);
                    }
                    // short jittered delay between attempts
                    let max_delay = self.base_delay * (1u32 << attempt);
                    let jitter = {
                        let mut rng = rng();
                        rng.random_range(0..max_delay.as_millis() as u64)
                    };
                    tokio::time::sleep(Duration::from_millis(jitter)).await;
                }
            }
        }
    }
}
