use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedMutexGuard;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};

use super::protocol::{self, Command, PASSWORD_ACCEPTED};
use super::{ModuleInfo, RelayState, RelayStates, UnlockStatus};

/// One connect → identify → unlock → commands → log out exchange with a module.
///
/// Holds the per-device guard for its whole lifetime so that two sessions
/// never talk to the same module at once.
pub(crate) struct Session {
    stream: TcpStream,
    addr: String,
    timeout: Duration,
    info: ModuleInfo,
    /// Set when this session entered the password and must log out again
    logged_in: bool,
    _device: OwnedMutexGuard<()>,
}

impl Session {
    pub async fn open(config: &RelayConfig, device: OwnedMutexGuard<()>) -> RelayResult<Self> {
        let addr = config.address();
        debug!(addr = %addr, "Connecting to relay module");

        let stream = match timeout(config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(RelayError::Connection(format!(
                    "Failed to connect to {addr}: {e}"
                )));
            }
            Err(_) => return Err(RelayError::Timeout(config.timeout)),
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", addr, e);
        }

        let mut stream = stream;
        let reply = exchange(&mut stream, &addr, config.timeout, &Command::ModuleInfo).await?;
        let info = protocol::decode_module_info(&reply)?;
        debug!(
            model = info.model.name,
            hw = info.hardware_version,
            fw = info.firmware_version,
            "Identified module at {}",
            addr
        );

        let mut session = Self {
            stream,
            addr,
            timeout: config.timeout,
            info,
            logged_in: false,
            _device: device,
        };
        session.unlock(config.password.as_deref()).await?;
        Ok(session)
    }

    async fn unlock(&mut self, password: Option<&str>) -> RelayResult<()> {
        let status = UnlockStatus::from(self.request_byte(&Command::UnlockTime).await?);
        match status {
            UnlockStatus::PasswordDisabled => Ok(()),
            UnlockStatus::Unlocked { seconds } => {
                debug!("Module already unlocked for another {}s", seconds);
                Ok(())
            }
            UnlockStatus::Locked => {
                let Some(password) = password else {
                    return Err(RelayError::Authentication(format!(
                        "{} requires a password and none is configured",
                        self.addr
                    )));
                };
                let reply = self
                    .request_byte(&Command::Password(password.to_string()))
                    .await?;
                if reply != PASSWORD_ACCEPTED {
                    return Err(RelayError::Authentication(format!(
                        "password rejected by {}",
                        self.addr
                    )));
                }
                self.logged_in = true;
                Ok(())
            }
        }
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub async fn request(&mut self, command: &Command) -> RelayResult<Vec<u8>> {
        exchange(&mut self.stream, &self.addr, self.timeout, command).await
    }

    async fn request_byte(&mut self, command: &Command) -> RelayResult<u8> {
        let reply = self.request(command).await?;
        reply
            .first()
            .copied()
            .ok_or_else(|| RelayError::Protocol(format!("empty reply to {command:?}")))
    }

    pub async fn read_outputs(&mut self) -> RelayResult<RelayStates> {
        let reply = self.request(&Command::GetOutputs).await?;
        let bytes: [u8; 3] = reply
            .as_slice()
            .try_into()
            .map_err(|_| RelayError::Protocol("output reply must be 3 bytes".into()))?;
        Ok(RelayStates::from_wire(bytes, self.info.model.relays))
    }

    pub async fn write_outputs(&mut self, states: &RelayStates) -> RelayResult<()> {
        let command = Command::SetOutputs(states.to_wire());
        let reply = self.request_byte(&command).await?;
        protocol::check_ack(&command, reply)
    }

    /// Switch one relay; `pulse` of 0 makes the change permanent.
    pub async fn switch(&mut self, relay: u8, state: RelayState, pulse: u8) -> RelayResult<()> {
        self.info.model.check_relay(relay)?;
        let command = if state {
            Command::DigitalActive { relay, pulse }
        } else {
            Command::DigitalInactive { relay, pulse }
        };
        let reply = self.request_byte(&command).await?;
        protocol::check_ack(&command, reply)
    }

    /// Log out if we logged in, then close the socket. Hands `result` back unchanged.
    pub async fn finish<T>(mut self, result: RelayResult<T>) -> RelayResult<T> {
        if self.logged_in {
            if let Err(e) = self.request(&Command::LogOut).await {
                warn!("Failed to log out of {}: {}", self.addr, e);
            }
        }
        if let Err(e) = self.stream.shutdown().await {
            trace!("Socket shutdown for {}: {}", self.addr, e);
        }
        debug!("Disconnected from {}", self.addr);
        result
    }
}

async fn exchange(
    stream: &mut TcpStream,
    addr: &str,
    limit: Duration,
    command: &Command,
) -> RelayResult<Vec<u8>> {
    trace!(?command, "Sending to {}", addr);

    match timeout(limit, stream.write_all(&command.encode())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(RelayError::Connection(format!(
                "Failed to send {command:?} to {addr}: {e}"
            )));
        }
        Err(_) => return Err(RelayError::Timeout(limit)),
    }

    let mut reply = vec![0u8; command.response_len()];
    match timeout(limit, stream.read_exact(&mut reply)).await {
        Ok(Ok(_)) => {
            trace!("Reply from {}: {:02x?}", addr, reply);
            Ok(reply)
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(RelayError::Connection(
            format!("{addr} closed the connection before replying to {command:?}"),
        )),
        Ok(Err(e)) => Err(RelayError::Io(e)),
        Err(_) => Err(RelayError::Timeout(limit)),
    }
}
