// ── M2 TCP client ──
//
// The M2 GUI server speaks a bare line protocol: write a command, read
// one reply line. It drops connections that linger, so every command
// opens a fresh connection and closes it after the reply. An internal
// mutex serializes commands -- the server handles one client at a time.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tracing::{debug, trace};

use crate::error::DriverError;
use crate::{LampAddress, LampDriver, PowerReading};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for the M2 lamp rack.
///
/// Commands:
/// - `lamp <relay> <0|1>` switches a relay. The reply lists the M2
///   names of every lamp that is now on; the commanded lamp must appear
///   when switching on and be absent when switching off.
/// - `getlamps` reports `name=0|1` pairs for every relay in rack order.
pub struct M2Client {
    host: String,
    port: u16,
    /// The M2 server services one client at a time.
    lock: Mutex<()>,
}

impl M2Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            lock: Mutex::new(()),
        }
    }

    /// Open a connection, send one command, read one reply line, close.
    async fn roundtrip(&self, command: &str) -> Result<String, DriverError> {
        let _guard = self.lock.lock().await;

        let stream = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            what: "connection to M2 controller".into(),
            secs: CONNECT_TIMEOUT.as_secs(),
        })?
        .map_err(|e| DriverError::Communication {
            message: format!("cannot connect to M2 controller: {e}"),
        })?;

        let (read_half, mut write_half) = stream.into_split();

        write_half
            .write_all(command.as_bytes())
            .await
            .map_err(|e| DriverError::Communication {
                message: format!("failed sending {command:?}: {e}"),
            })?;
        trace!(command, "sent M2 command");

        let mut lines = BufReader::new(read_half).lines();
        let reply = timeout(REPLY_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| DriverError::Timeout {
                what: format!("reply to {command:?}"),
                secs: REPLY_TIMEOUT.as_secs(),
            })?
            .map_err(|e| DriverError::Communication {
                message: format!("failed reading reply to {command:?}: {e}"),
            })?
            .ok_or_else(|| DriverError::Communication {
                message: format!("connection closed before reply to {command:?}"),
            })?;

        trace!(command, reply, "M2 reply");
        Ok(reply.trim().to_string())
    }

    fn m2_fields(address: &LampAddress) -> Result<(&str, u8), DriverError> {
        match address {
            LampAddress::M2 { m2_name, relay } => Ok((m2_name, *relay)),
            LampAddress::Actor { .. } => Err(DriverError::Rejected {
                message: "actor-backed lamp handed to the M2 driver".into(),
            }),
        }
    }
}

#[async_trait]
impl LampDriver for M2Client {
    async fn send(&self, address: &LampAddress, on: bool) -> Result<(), DriverError> {
        let (m2_name, relay) = Self::m2_fields(address)?;

        let value = if on { "1" } else { "0" };
        let reply = self.roundtrip(&format!("lamp {relay} {value}")).await?;

        // The reply lists the lamps now on. Cross-check it against the
        // commanded state before trusting the switch happened.
        let listed = reply.contains(m2_name);
        if on != listed {
            return Err(DriverError::Rejected {
                message: format!("unexpected reply {reply:?} switching {m2_name} to {value}"),
            });
        }

        debug!(lamp = m2_name, relay, on, "M2 switch accepted");
        Ok(())
    }

    async fn query(&self, addresses: &[LampAddress]) -> Result<Vec<PowerReading>, DriverError> {
        let reply = self.roundtrip("getlamps").await?;
        let states = parse_lamp_states(&reply);

        let readings = addresses
            .iter()
            .map(|address| {
                let (m2_name, _) = Self::m2_fields(address)?;
                let reading = states
                    .iter()
                    .find(|(name, _)| name == m2_name)
                    .map_or(PowerReading::Unknown, |(_, reading)| *reading);
                Ok(reading)
            })
            .collect::<Result<Vec<_>, DriverError>>()?;

        Ok(readings)
    }
}

/// Parse a `getlamps` reply into `(m2_name, reading)` pairs.
///
/// Relays named `t<digits>` are unassigned and skipped, as are tokens
/// that are not `name=digit` shaped. A digit other than `0`/`1` reads
/// as [`PowerReading::Unknown`].
fn parse_lamp_states(reply: &str) -> Vec<(String, PowerReading)> {
    reply
        .split_whitespace()
        .filter_map(|token| {
            let (name, value) = token.split_once('=')?;
            if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
                return None;
            }
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            if is_unassigned(name) {
                return None;
            }
            let reading = match value {
                "0" => PowerReading::Off,
                "1" => PowerReading::On,
                _ => PowerReading::Unknown,
            };
            Some((name.to_string(), reading))
        })
        .collect()
}

/// Unassigned relays report as `t1`, `t2`, ...
fn is_unassigned(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('t') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_getlamps_reply() {
        let states = parse_lamp_states("TCS=0 HgAr=1 Ne=0");
        assert_eq!(
            states,
            vec![
                ("TCS".into(), PowerReading::Off),
                ("HgAr".into(), PowerReading::On),
                ("Ne".into(), PowerReading::Off),
            ]
        );
    }

    #[test]
    fn unassigned_relays_are_skipped() {
        let states = parse_lamp_states("TCS=1 t3=0 t12=1");
        assert_eq!(states, vec![("TCS".into(), PowerReading::On)]);
    }

    #[test]
    fn lamp_named_with_t_prefix_is_kept() {
        // "t" followed by anything but digits is a real lamp name.
        let states = parse_lamp_states("tArc=1");
        assert_eq!(states, vec![("tArc".into(), PowerReading::On)]);
    }

    #[test]
    fn bad_digit_reads_unknown() {
        let states = parse_lamp_states("TCS=9");
        assert_eq!(states, vec![("TCS".into(), PowerReading::Unknown)]);
    }

    #[test]
    fn garbage_tokens_are_ignored() {
        let states = parse_lamp_states("ok lamp=on= HgAr=x TCS=1");
        assert_eq!(states, vec![("TCS".into(), PowerReading::On)]);
    }
}
