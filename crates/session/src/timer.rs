use std::{pin::Pin, time::Duration};

use tokio::time::{Instant, Sleep};

/// Cancellable one-shot deadline for channel establishment.
///
/// Disarming drops the underlying [`Sleep`], so a disarmed timer can never
/// fire. Runs on tokio time, which tests pause and advance.
#[derive(Debug, Default)]
pub struct ConnectTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ConnectTimer {
    pub fn disarmed() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) to fire `after` from now.
    pub fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep(after)));
    }

    pub fn disarm(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// Resolves when the deadline passes; pending forever while disarmed.
    ///
    /// Cancel safe. The timer disarms itself once it has fired.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            },
            None => std::future::pending().await,
        }
    }
}
