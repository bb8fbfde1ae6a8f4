//! Stdin/stdout line transport.
//!
//! Stdin reads block, so a background thread owns the read side and feeds
//! complete lines through a bounded channel; `poll_byte` stays non-blocking
//! for the tick loop. The thread exits on EOF or read error and drops its
//! sender, which is how the main side learns the link is gone.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel as xch;

use cartpole_traits::Transport;

use crate::error::HwError;

pub struct StdioTransport {
    rx: xch::Receiver<String>,
    buf: VecDeque<u8>,
    /// Set once the reader thread is gone and everything buffered has been
    /// handed out.
    drained: Arc<AtomicBool>,
    closed: bool,
}

impl StdioTransport {
    pub fn spawn() -> Self {
        let (tx, rx) = xch::bounded::<String>(32);

        std::thread::spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) => {
                        tracing::debug!("stdin reached EOF, reader thread exiting");
                        break;
                    }
                    Ok(_) => {
                        if tx.send(line.clone()).is_err() {
                            tracing::debug!("transport consumer disconnected, reader exiting");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed, reader exiting");
                        break;
                    }
                }
            }
        });

        Self {
            rx,
            buf: VecDeque::new(),
            drained: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    /// Flag that flips once the input side is closed and fully consumed;
    /// lets an embedding loop exit cleanly after piped input.
    pub fn drained_flag(&self) -> Arc<AtomicBool> {
        self.drained.clone()
    }
}

impl Transport for StdioTransport {
    fn poll_byte(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        if self.buf.is_empty() {
            match self.rx.try_recv() {
                Ok(line) => self.buf.extend(line.bytes()),
                Err(xch::TryRecvError::Empty) => {}
                Err(xch::TryRecvError::Disconnected) => self.closed = true,
            }
        }
        let byte = self.buf.pop_front();
        if self.closed && byte.is_none() {
            self.drained.store(true, Ordering::Relaxed);
        }
        Ok(byte)
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(HwError::from)?;
        stdout.flush().map_err(HwError::from)?;
        Ok(())
    }
}
