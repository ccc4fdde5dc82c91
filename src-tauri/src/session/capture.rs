//! Screen capture acquisition
//!
//! Screen sharing needs a one-time consent grant from the user, obtained
//! through [`CaptureConsent`]. With a grant in hand the connection starts
//! the capturer, and the track is polled until it is published, up to a
//! bounded number of attempts at a fixed interval. On timeout the capturer
//! is released again and the share quietly stays off.

use super::connection::RoomConnection;
use crate::config::CaptureConfig;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// One-time permission to capture the screen
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureGrant {
    token: String,
}

impl CaptureGrant {
    /// Wrap the platform's opaque consent result
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for CaptureGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaptureGrant(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Screen capture permission denied")]
    Denied,

    #[error("Failed to start screen capture: {0}")]
    StartFailed(String),

    #[error("Screen track not available after {attempts} attempts")]
    TrackUnavailable { attempts: u32 },
}

/// Shows the system consent prompt
#[async_trait]
pub trait CaptureConsent: Send + Sync {
    /// Resolve to a grant, or `None` if the user declined
    async fn request_grant(&self) -> Option<CaptureGrant>;
}

/// Consent source for hosts that cannot capture the screen
#[derive(Debug, Default)]
pub struct NoCapture;

#[async_trait]
impl CaptureConsent for NoCapture {
    async fn request_grant(&self) -> Option<CaptureGrant> {
        tracing::info!("Screen capture is not available on this host");
        None
    }
}

/// Start the capturer and wait for its track. Returns the attempt on which
/// the track showed up.
pub async fn acquire_screen_track(
    connection: Arc<dyn RoomConnection>,
    grant: CaptureGrant,
    config: CaptureConfig,
) -> Result<u32, CaptureError> {
    connection.start_screen_share(&grant)?;

    for attempt in 1..=config.max_attempts {
        if connection.screen_track_ready() {
            tracing::info!("Screen track published (attempt {})", attempt);
            return Ok(attempt);
        }
        if attempt == config.max_attempts {
            break;
        }
        tracing::debug!(
            "Screen track not ready (attempt {}/{}), retrying in {}ms",
            attempt,
            config.max_attempts,
            config.retry_interval_ms
        );
        tokio::time::sleep(config.retry_interval()).await;
    }

    tracing::warn!(
        "Screen track never became available after {} attempts",
        config.max_attempts
    );
    connection.stop_screen_share();
    Err(CaptureError::TrackUnavailable {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::connection::ConnectError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capturer {
        ready_after: Option<u32>,
        polls: Mutex<u32>,
        stops: Mutex<u32>,
    }

    impl RoomConnection for Capturer {
        fn local_identity(&self) -> String {
            "me".to_string()
        }
        fn set_microphone_enabled(&self, _enabled: bool) -> Result<(), ConnectError> {
            Ok(())
        }
        fn start_screen_share(&self, grant: &CaptureGrant) -> Result<(), CaptureError> {
            if grant.token().is_empty() {
                return Err(CaptureError::StartFailed("empty grant".to_string()));
            }
            Ok(())
        }
        fn screen_track_ready(&self) -> bool {
            let mut polls = self.polls.lock();
            *polls += 1;
            self.ready_after.is_some_and(|n| *polls >= n)
        }
        fn stop_screen_share(&self) {
            *self.stops.lock() += 1;
        }
        fn send_chat(&self, _text: &str) -> Result<(), ConnectError> {
            Ok(())
        }
        fn disconnect(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_found_after_retries() {
        let capturer = Arc::new(Capturer {
            ready_after: Some(3),
            ..Default::default()
        });
        let start = tokio::time::Instant::now();
        let attempt = acquire_screen_track(
            capturer.clone(),
            CaptureGrant::new("grant"),
            CaptureConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(attempt, 3);
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(1000));
        assert_eq!(*capturer.stops.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_and_releases_capturer() {
        let capturer = Arc::new(Capturer::default());
        let start = tokio::time::Instant::now();
        let result = acquire_screen_track(
            capturer.clone(),
            CaptureGrant::new("grant"),
            CaptureConfig::default(),
        )
        .await;

        assert_eq!(result, Err(CaptureError::TrackUnavailable { attempts: 10 }));
        assert_eq!(*capturer.polls.lock(), 10);
        // No wait after the last poll
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(4500));
        assert_eq!(*capturer.stops.lock(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_propagates() {
        let capturer = Arc::new(Capturer::default());
        let result =
            acquire_screen_track(capturer.clone(), CaptureGrant::new(""), CaptureConfig::default())
                .await;
        assert!(matches!(result, Err(CaptureError::StartFailed(_))));
        assert_eq!(*capturer.polls.lock(), 0);
    }

    #[test]
    fn test_grant_debug_hides_token() {
        assert_eq!(format!("{:?}", CaptureGrant::new("secret")), "CaptureGrant(..)");
    }
}
