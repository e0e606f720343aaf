//! The single reveal timer.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::Sleep;

/// Identifies what an armed timer was armed for.
///
/// `session` changes on every new tracking session and `epoch` whenever the
/// sequencer discards its visible steps, so an expiry carrying an old key is
/// recognisably obsolete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealKey {
    pub session: u64,
    pub epoch: u64,
}

#[derive(Debug)]
struct Armed {
    key: RevealKey,
    sleep: Pin<Box<Sleep>>,
}

/// Holds at most one outstanding reveal timer.
#[derive(Debug, Default)]
pub struct RevealScheduler {
    armed: Option<Armed>,
}

impl RevealScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the timer in line with what the sequencer wants.
    ///
    /// An armed timer with the same key is left running, so repeated calls
    /// never postpone a reveal. A different key re-arms; `None` disarms.
    pub fn sync(&mut self, wanted: Option<(RevealKey, Duration)>) {
        match wanted {
            None => self.armed = None,
            Some((key, delay)) => {
                if self.armed.as_ref().map(|armed| armed.key) != Some(key) {
                    self.armed = Some(Armed {
                        key,
                        sleep: Box::pin(tokio::time::sleep(delay)),
                    });
                }
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Resolves when the armed timer expires, disarming it. Pending forever
    /// while disarmed. Cancel safe: dropping the future keeps the timer.
    pub async fn fired(&mut self) -> RevealKey {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.sleep.as_mut().await;
                let key = armed.key;
                self.armed = None;
                key
            }
            None => std::future::pending().await,
        }
    }
}
