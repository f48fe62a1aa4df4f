//! # Session Driver
//!
//! Owns one APRS-IS session: login, the heartbeat task and the receive loop
//! that decodes, translates and writes each packet.
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected --connect/login--> Connected --EOF/error--> Disconnected
//! ```
//!
//! There is no reconnection; a lost feed ends the session with an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::aprs::decoder::decode;
use crate::aprs::encoder::encode_heartbeat;
use crate::aprs::protocol::SERVER_COMMENT_PREFIX;
use crate::config::AprsIsConfig;
use crate::error::{BridgeError, Result};
use crate::feed::{self, LoginStatus};
use crate::influx::LineWriter;
use crate::translate::Translator;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Counters kept by the receive loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Lines received from the feed, server comments included
    pub received: u64,
    /// Server comment lines
    pub comments: u64,
    /// Lines that could not be decoded
    pub undecodable: u64,
    /// Lines written to the database
    pub written: u64,
    /// Failed database writes
    pub write_errors: u64,
}

/// One APRS-IS to InfluxDB session
pub struct Session<W: LineWriter> {
    aprsis: AprsIsConfig,
    translator: Translator,
    writer: W,
    state: SessionState,
    stats: SessionStats,
    heartbeat: Option<AbortHandle>,
}

impl<W: LineWriter> Session<W> {
    /// Create a disconnected session
    ///
    /// # Arguments
    ///
    /// * `aprsis` - Feed settings (callsign, server, heartbeat interval)
    /// * `translator` - Packet translator, with its scaling store
    /// * `writer` - Database writer
    pub fn new(aprsis: AprsIsConfig, translator: Translator, writer: W) -> Self {
        Self {
            aprsis,
            translator,
            writer,
            state: SessionState::Disconnected,
            stats: SessionStats::default(),
            heartbeat: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Connect to the configured server and log in
    ///
    /// # Errors
    ///
    /// Returns a connection or login error; the session stays disconnected.
    pub async fn connect(&mut self) -> Result<BufReader<TcpStream>> {
        info!(
            "Logging into APRS-IS as {} on {}:{}",
            self.aprsis.callsign, self.aprsis.host, self.aprsis.port
        );

        let mut stream = feed::connect(&self.aprsis.host, self.aprsis.port).await?;
        self.login(&mut stream).await?;
        Ok(stream)
    }

    /// Log in over an already open connection
    ///
    /// # Errors
    ///
    /// Returns a login error if the server rejects the login.
    pub async fn login<S>(&mut self, stream: &mut BufReader<S>) -> Result<LoginStatus>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let status = feed::login(
            stream,
            &self.aprsis.callsign,
            self.aprsis.login_passcode(),
            self.aprsis.filter.as_deref(),
        )
        .await?;

        self.state = SessionState::Connected;
        Ok(status)
    }

    /// Run the heartbeat and receive loops until the feed ends
    ///
    /// # Arguments
    ///
    /// * `stream` - Logged-in feed connection
    ///
    /// # Returns
    ///
    /// Always an error: the feed closing, a read failure, or a failed
    /// heartbeat send. The session is disconnected afterwards.
    pub async fn run<S>(&mut self, stream: BufReader<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.state = SessionState::Connected;

        let (read_half, write_half) = tokio::io::split(stream);
        let feed_writer = Arc::new(Mutex::new(write_half));

        let mut heartbeat = tokio::spawn(heartbeat_loop(
            feed_writer,
            self.aprsis.callsign.clone(),
            Duration::from_secs(self.aprsis.interval * 60),
        ));
        self.heartbeat = Some(heartbeat.abort_handle());

        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();

        let result = loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break Err(BridgeError::Connection("feed closed by server".to_string())),
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        buf.clear();
                        self.handle_line(&line).await;
                    }
                    Err(e) => break Err(BridgeError::Connection(format!("feed read failed: {}", e))),
                },
                sent = &mut heartbeat => break match sent {
                    Ok(result) => result,
                    Err(e) => Err(BridgeError::Connection(format!("heartbeat task failed: {}", e))),
                },
            }
        };

        self.shutdown();
        info!(
            "Session ended: {} received, {} written, {} write errors, {} undecodable",
            self.stats.received, self.stats.written, self.stats.write_errors, self.stats.undecodable
        );

        result
    }

    /// Stop the heartbeat task and mark the session disconnected
    ///
    /// A `run` future dropped mid-session leaves the task running until this
    /// is called or the session is dropped.
    pub fn shutdown(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
            debug!("Stopped heartbeat");
        }
        self.state = SessionState::Disconnected;
    }

    /// Process one feed line
    ///
    /// Server comments are skipped. Decode failures are logged at debug
    /// level and write failures at error level; neither stops the session.
    pub async fn handle_line(&mut self, raw: &str) {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return;
        }
        self.stats.received += 1;

        if line.starts_with(SERVER_COMMENT_PREFIX) {
            debug!("Server: {}", line);
            self.stats.comments += 1;
            return;
        }

        let packet = match decode(line) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Could not decode {:?}: {}", line, e);
                self.stats.undecodable += 1;
                return;
            }
        };

        let Some(output) = self.translator.translate(&packet) else {
            return;
        };

        match self.writer.write_line(&output).await {
            Ok(()) => self.stats.written += 1,
            Err(e) => {
                error!("Failed to write packet: {}", e);
                error!("Line protocol: {}", output);
                self.stats.write_errors += 1;
            }
        }
    }
}

impl<W: LineWriter> Drop for Session<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Send a heartbeat now and then every `interval`
///
/// Only returns on a failed send.
async fn heartbeat_loop<S>(
    writer: Arc<Mutex<WriteHalf<S>>>,
    callsign: String,
    interval: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    debug!("Starting heartbeat every {:?}", interval);
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let heartbeat = encode_heartbeat(&callsign, Utc::now().timestamp());
        if let Err(e) = feed::send_line(&writer, &heartbeat).await {
            warn!("Heartbeat failed: {}", e);
            return Err(e);
        }
        debug!("Sent heartbeat");
    }
}
