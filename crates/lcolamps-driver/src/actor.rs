// ── Delegated-actor client ──
//
// Some lamps are not wired to the M2 rack; they belong to another
// device actor. Commanding them means sending that actor its configured
// command verb through the hub and reading a single reply line:
// `OK [detail]` on success, `ERR <reason>` on refusal.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tracing::{debug, trace};

use crate::error::DriverError;
use crate::{LampAddress, LampDriver, PowerReading};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for lamps delegated to a third-party actor.
///
/// The command verbs themselves are per-lamp configuration carried in
/// [`LampAddress::Actor`]; this client only moves them over the wire.
pub struct ActorClient {
    host: String,
    port: u16,
    /// Serialize hub commands -- replies carry no correlation id.
    lock: Mutex<()>,
}

impl ActorClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            lock: Mutex::new(()),
        }
    }

    /// Send one command line and read one reply line.
    async fn roundtrip(&self, verb: &str) -> Result<String, DriverError> {
        let _guard = self.lock.lock().await;

        let stream = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            what: "connection to actor hub".into(),
            secs: CONNECT_TIMEOUT.as_secs(),
        })?
        .map_err(|e| DriverError::Communication {
            message: format!("cannot connect to actor hub: {e}"),
        })?;

        let (read_half, mut write_half) = stream.into_split();

        write_half
            .write_all(format!("{verb}\n").as_bytes())
            .await
            .map_err(|e| DriverError::Communication {
                message: format!("failed sending {verb:?}: {e}"),
            })?;
        trace!(verb, "sent actor command");

        let mut lines = BufReader::new(read_half).lines();
        let reply = timeout(REPLY_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| DriverError::Timeout {
                what: format!("reply to {verb:?}"),
                secs: REPLY_TIMEOUT.as_secs(),
            })?
            .map_err(|e| DriverError::Communication {
                message: format!("failed reading reply to {verb:?}: {e}"),
            })?
            .ok_or_else(|| DriverError::Communication {
                message: format!("connection closed before reply to {verb:?}"),
            })?;

        let reply = reply.trim().to_string();
        trace!(verb, reply, "actor reply");

        if let Some(reason) = reply.strip_prefix("ERR") {
            return Err(DriverError::Rejected {
                message: reason.trim().to_string(),
            });
        }
        Ok(reply)
    }

    fn verbs(address: &LampAddress) -> Result<(&str, &str, &str), DriverError> {
        match address {
            LampAddress::Actor {
                on_verb,
                off_verb,
                status_verb,
            } => Ok((on_verb, off_verb, status_verb)),
            LampAddress::M2 { .. } => Err(DriverError::Rejected {
                message: "M2-backed lamp handed to the actor driver".into(),
            }),
        }
    }
}

#[async_trait]
impl LampDriver for ActorClient {
    async fn send(&self, address: &LampAddress, on: bool) -> Result<(), DriverError> {
        let (on_verb, off_verb, _) = Self::verbs(address)?;
        let verb = if on { on_verb } else { off_verb };

        self.roundtrip(verb).await?;
        debug!(verb, on, "actor switch accepted");
        Ok(())
    }

    async fn query(&self, addresses: &[LampAddress]) -> Result<Vec<PowerReading>, DriverError> {
        // The hub has no batch query; ask lamp by lamp.
        let mut readings = Vec::with_capacity(addresses.len());
        for address in addresses {
            let (_, _, status_verb) = Self::verbs(address)?;
            let reply = self.roundtrip(status_verb).await?;
            readings.push(parse_status(&reply));
        }
        Ok(readings)
    }
}

fn parse_status(reply: &str) -> PowerReading {
    let lowered = reply.to_ascii_lowercase();
    let has = |word: &str| lowered.split_whitespace().any(|t| t == word);
    if has("on") {
        PowerReading::On
    } else if has("off") {
        PowerReading::Off
    } else {
        PowerReading::Unknown
    }
}
