//! Serial keypad event source.
//!
//! A serial keypad sends one byte per key press. Each byte becomes an
//! [`Event`] whose key is that byte read as a character.

mod line;

use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::AsRawFd,
};

use async_trait::async_trait;
use config::SerialConfig;
use keypad_engine::{Error, Event, EventSource, Result};
use tokio::{fs::File as AsyncFile, io::AsyncReadExt, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use line::{LineSettings, Parity};

/// A keypad attached to a serial port (or any readable byte stream).
#[derive(Debug)]
pub struct SerialKeypad {
    /// Source name.
    name: String,
    /// Device path, for logs.
    port: String,
    /// Open device; taken by `start`.
    file: Option<File>,
    /// The device is a terminal; empty reads are timeouts, not end of input.
    tty: bool,
    /// Stops the reader.
    cancel: CancellationToken,
    /// Reader task.
    task: Option<JoinHandle<()>>,
}

impl SerialKeypad {
    /// Open and configure the device named in `cfg`.
    pub fn open(name: &str, cfg: &SerialConfig) -> Result<Self> {
        if cfg.port.is_empty() {
            return Err(Error::Config(format!(
                "keypad '{name}': no serial port has been configured"
            )));
        }
        let settings = LineSettings::from_config(cfg)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&cfg.port)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", cfg.port)))?;
        let fd = file.as_raw_fd();
        let tty = line::is_tty(fd);
        if tty {
            line::configure(fd, &settings)?;
        }
        debug!(keypad = %name, port = %cfg.port, tty, ?settings, "serial_opened");
        Ok(Self {
            name: name.to_string(),
            port: cfg.port.clone(),
            file: Some(file),
            tty,
            cancel: CancellationToken::new(),
            task: None,
        })
    }
}

#[async_trait]
impl EventSource for SerialKeypad {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, sink: mpsc::Sender<Event>) -> Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| Error::Config(format!("keypad '{}' already started", self.name)))?;
        let reader = Reader {
            name: self.name.clone(),
            port: self.port.clone(),
            tty: self.tty,
            file: AsyncFile::from_std(file),
        };
        self.task = Some(tokio::spawn(reader.run(sink, self.cancel.clone())));
        Ok(())
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        self.file = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(keypad = %self.name, error = %e, "serial_reader_join_failed");
            }
        }
    }
}

/// Background byte reader.
struct Reader {
    /// Source name.
    name: String,
    /// Device path.
    port: String,
    /// See [`SerialKeypad::tty`].
    tty: bool,
    /// Device.
    file: AsyncFile,
}

impl Reader {
    /// Emit one event per byte until cancelled, closed or out of input.
    async fn run(mut self, sink: mpsc::Sender<Event>, cancel: CancellationToken) {
        let mut buf = [0u8; 1];
        loop {
            let n = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.file.read(&mut buf) => match r {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(keypad = %self.name, port = %self.port, error = %e, "serial_read_failed");
                        break;
                    }
                },
            };
            if n == 0 {
                if self.tty {
                    continue;
                }
                info!(keypad = %self.name, port = %self.port, "serial_eof");
                break;
            }
            let event = Event::new(self.name.as_str(), char::from(buf[0]).to_string());
            if sink.send(event).await.is_err() {
                debug!(keypad = %self.name, "serial_sink_closed");
                break;
            }
        }
    }
}
