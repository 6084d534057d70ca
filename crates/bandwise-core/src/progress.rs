//! One-way status notifications from the pipeline to whoever started it.
//!
//! Reports are advisory: no acknowledgement, no backpressure, and a listener that
//! has gone away is not an error.

use tokio::sync::mpsc;

pub trait ProgressReporter: Send + Sync {
    fn report(&self, status: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, status: &str) {
        self(status)
    }
}

/// Forwards statuses into a channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelReporter(mpsc::UnboundedSender<String>);

impl ChannelReporter {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self(sender)
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, status: &str) {
        let _ = self.0.send(status.to_string());
    }
}

/// Discards every status.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ProgressReporter for Silent {
    fn report(&self, _status: &str) {}
}
