//! Terminal spinner shown while sampling.
//!
//! Purely cosmetic: it shares nothing with the sampling loop except the
//! stop signal.

use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running spinner task.
pub struct Spinner {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Spinner {
    /// Starts drawing `message` on stderr.
    pub fn start(message: impl Into<String>) -> Self {
        Self::start_with(message, std::io::stderr())
    }

    pub fn start_with<W>(message: impl Into<String>, mut out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let message = message.into();
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_INTERVAL);
            let mut frame = 0;
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        let _ = write!(out, "\r{} {} ", FRAMES[frame], message);
                        let _ = out.flush();
                        frame = (frame + 1) % FRAMES.len();
                    }
                }
            }
            // Clear the spinner line.
            let _ = write!(out, "\r\x1b[K");
            let _ = out.flush();
        });

        Self { stop, handle }
    }

    /// Stops the spinner and waits until its line is cleared.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}
