//! # APRS-IS Feed Module
//!
//! Handles the TCP connection to an APRS-IS server.
//!
//! This module handles:
//! - Opening the feed connection
//! - The login handshake (banner, login line, `logresp`)
//! - Serialized writes to the shared feed handle

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aprs::encoder::encode_login;
use crate::aprs::protocol::{RECEIVE_ONLY_PASSCODE, SERVER_COMMENT_PREFIX};
use crate::error::{BridgeError, Result};

/// How long to wait for the TCP connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for each handshake line
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Server comments tolerated between the login line and `logresp`
const MAX_LOGIN_COMMENTS: usize = 5;

/// Outcome of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStatus {
    /// Callsign the server logged us in as
    pub callsign: String,
    /// Whether the passcode was accepted
    pub verified: bool,
    /// Name of the server we landed on
    pub server: Option<String>,
}

/// Open a TCP connection to an APRS-IS server
///
/// # Arguments
///
/// * `host` - Server host name or address
/// * `port` - Server port
///
/// # Returns
///
/// * `Result<BufReader<TcpStream>>` - Buffered connection, ready for login
///
/// # Errors
///
/// Returns a connection error if the host cannot be reached in time.
///
/// # Examples
///
/// ```no_run
/// use aprs2influxdb::feed::{connect, login};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut stream = connect("rotate.aprs.net", 10152).await?;
///     let status = login(&mut stream, "N0CALL", -1, None).await?;
///     println!("Logged in via {:?}", status.server);
///     Ok(())
/// }
/// ```
pub async fn connect(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    debug!("Connecting to {}:{}", host, port);

    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| BridgeError::Connection(format!("timed out connecting to {}:{}", host, port)))?
        .map_err(|e| BridgeError::Connection(format!("failed to connect to {}:{}: {}", host, port, e)))?;

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let peer: Option<SocketAddr> = stream.peer_addr().ok();
    info!("Connected to {}:{} ({:?})", host, port, peer);

    Ok(BufReader::new(stream))
}

/// Perform the APRS-IS login handshake
///
/// Reads the server banner, sends the login line and checks the `logresp`
/// answer.
///
/// # Arguments
///
/// * `stream` - Freshly opened, buffered feed connection
/// * `callsign` - Login callsign
/// * `passcode` - Passcode, or `-1` for receive-only
/// * `filter` - Optional server-side filter
///
/// # Errors
///
/// Returns a login error if the banner is not a server comment, the server
/// logs us in under another callsign, or a real passcode is not verified.
/// Returns a connection error if the server closes the connection.
pub async fn login<S>(
    stream: &mut S,
    callsign: &str,
    passcode: i32,
    filter: Option<&str>,
) -> Result<LoginStatus>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let banner = read_handshake_line(stream).await?;
    if !banner.starts_with(SERVER_COMMENT_PREFIX) {
        return Err(BridgeError::Login(format!("unexpected banner {:?}", banner)));
    }
    debug!("Server banner: {}", banner);

    let login_line = encode_login(callsign, passcode, filter);
    stream.write_all(login_line.as_bytes()).await?;
    stream.flush().await?;

    for _ in 0..MAX_LOGIN_COMMENTS {
        let response = read_handshake_line(stream).await?;
        if !response.starts_with(SERVER_COMMENT_PREFIX) {
            return Err(BridgeError::Login(format!("unexpected login response {:?}", response)));
        }
        if !response.contains("logresp") {
            debug!("Server: {}", response);
            continue;
        }

        let status = parse_logresp(&response)?;
        if !status.callsign.eq_ignore_ascii_case(callsign) {
            return Err(BridgeError::Login(format!("server: {}", response)));
        }
        if !status.verified && passcode != RECEIVE_ONLY_PASSCODE {
            return Err(BridgeError::Login(format!("passcode {} for {} is incorrect", passcode, callsign)));
        }

        info!(
            "Logged in as {} ({})",
            status.callsign,
            if status.verified { "verified" } else { "unverified" }
        );
        return Ok(status);
    }

    Err(BridgeError::Login("no logresp from server".to_string()))
}

async fn read_handshake_line<S: AsyncBufRead + Unpin>(stream: &mut S) -> Result<String> {
    let mut buf = Vec::new();
    let read = tokio::time::timeout(LOGIN_TIMEOUT, stream.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| BridgeError::Connection("timed out waiting for server".to_string()))??;

    if read == 0 {
        return Err(BridgeError::Connection("server closed the connection during login".to_string()));
    }

    Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
}

/// Parse `# logresp CALL verified, server T2TEST`
///
/// # Errors
///
/// Returns a login error if the line is not a logresp or names no callsign.
pub fn parse_logresp(line: &str) -> Result<LoginStatus> {
    let mut words = line.split_whitespace();

    if words.next() != Some("#") || words.next() != Some("logresp") {
        return Err(BridgeError::Login(format!("not a logresp: {:?}", line)));
    }

    let callsign = words
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| BridgeError::Login("server responded with empty callsign".to_string()))?;

    let verified = match words.next().map(|s| s.trim_end_matches(',')) {
        Some("verified") => true,
        Some("unverified") => false,
        other => {
            return Err(BridgeError::Login(format!("unknown login status {:?}", other)));
        }
    };

    let server = match words.next() {
        Some("server") => words.next().map(str::to_string),
        _ => None,
    };

    Ok(LoginStatus {
        callsign: callsign.to_string(),
        verified,
        server,
    })
}

/// Write one line to a shared feed handle
///
/// The lock is held until the whole line is written and flushed, so lines
/// from concurrent writers never interleave.
pub async fn send_line<W>(writer: &Mutex<W>, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| BridgeError::Connection(format!("failed to write to feed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| BridgeError::Connection(format!("failed to flush feed: {}", e)))?;
    Ok(())
}
