use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};

use super::protocol::{self, Command};
use super::session::Session;
use super::{ModuleInfo, RelayState, RelayStates};

/// Client for one Devantech ETH relay module.
///
/// Each operation is a complete exchange on a fresh TCP connection. Clones
/// share a lock, so operations issued through any clone reach the module
/// one at a time.
#[derive(Debug, Clone)]
pub struct RelayClient {
    config: RelayConfig,
    device: Arc<Mutex<()>>,
}

impl RelayClient {
    /// Client on the default port and timeout. An empty password means the
    /// module has password protection disabled.
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_config(RelayConfig::new(host, password))
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            config,
            device: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    async fn open(&self) -> RelayResult<Session> {
        let guard = self.device.clone().lock_owned().await;
        Session::open(&self.config, guard).await
    }

    /// Close (`true`) or open (`false`) a single relay. Other relays keep their state.
    pub async fn set_relay_state(&self, index: u8, state: RelayState) -> RelayResult<()> {
        let mut session = self.open().await?;
        let result = session.switch(index, state, 0).await;
        if result.is_ok() {
            info!(
                host = %self.config.host,
                relay = index,
                state,
                "Relay switched"
            );
        }
        session.finish(result).await
    }

    pub async fn get_relay_state(&self, index: u8) -> RelayResult<RelayState> {
        let mut session = self.open().await?;
        let result = match session.info().model.check_relay(index) {
            Ok(()) => session.read_outputs().await.and_then(|states| {
                states
                    .get(index)
                    .ok_or(RelayError::InvalidRelay {
                        index,
                        count: states.count(),
                    })
            }),
            Err(e) => Err(e),
        };
        session.finish(result).await
    }

    pub async fn relay_states(&self) -> RelayResult<RelayStates> {
        let mut session = self.open().await?;
        let result = session.read_outputs().await;
        session.finish(result).await
    }

    /// Write every relay at once. `states` must not cover more relays than the module has.
    pub async fn set_relay_states(&self, states: &RelayStates) -> RelayResult<()> {
        let mut session = self.open().await?;
        let relays = session.info().model.relays;
        let result = if states.count() > relays {
            Err(RelayError::InvalidRelay {
                index: states.count(),
                count: relays,
            })
        } else {
            session.write_outputs(states).await
        };
        if result.is_ok() {
            info!(host = %self.config.host, states = ?states.to_wire(), "Relay outputs written");
        }
        session.finish(result).await
    }

    /// Drive a relay to `state` for `duration`, after which the module reverts it.
    pub async fn pulse_relay(
        &self,
        index: u8,
        state: RelayState,
        duration: Duration,
    ) -> RelayResult<()> {
        let ticks = protocol::pulse_ticks(duration)?;
        let mut session = self.open().await?;
        let result = session.switch(index, state, ticks).await;
        if result.is_ok() {
            info!(
                host = %self.config.host,
                relay = index,
                state,
                ?duration,
                "Relay pulsed"
            );
        }
        session.finish(result).await
    }

    pub async fn module_info(&self) -> RelayResult<ModuleInfo> {
        let session = self.open().await?;
        let info = *session.info();
        session.finish(Ok(info)).await
    }

    pub async fn digital_inputs(&self) -> RelayResult<Vec<bool>> {
        let mut session = self.open().await?;
        let model = session.info().model;
        let result = if model.digital_io == 0 {
            Err(RelayError::Unsupported {
                model: model.name,
                feature: "digital inputs",
            })
        } else {
            match session.request(&Command::GetInputs).await {
                Ok(reply) => protocol::decode_inputs(&reply, model.digital_io),
                Err(e) => Err(e),
            }
        };
        session.finish(result).await
    }

    /// Raw 16-bit reading of an analogue channel (1-based).
    pub async fn analogue_input(&self, channel: u8) -> RelayResult<u16> {
        let mut session = self.open().await?;
        let model = session.info().model;
        let result = if model.analogue_inputs == 0 {
            Err(RelayError::Unsupported {
                model: model.name,
                feature: "analogue inputs",
            })
        } else if channel == 0 || channel > model.analogue_inputs {
            Err(RelayError::InvalidChannel {
                channel,
                count: model.analogue_inputs,
            })
        } else {
            session
                .request(&Command::AnalogueVoltage { channel })
                .await
                .and_then(|reply| protocol::decode_analogue(&reply))
        };
        session.finish(result).await
    }

    /// MAC address, which the module also reports as its serial number.
    pub async fn mac_address(&self) -> RelayResult<[u8; 6]> {
        let mut session = self.open().await?;
        let result = session
            .request(&Command::SerialNumber)
            .await
            .and_then(|reply| {
                <[u8; 6]>::try_from(reply.as_slice())
                    .map_err(|_| RelayError::Protocol("serial number reply must be 6 bytes".into()))
            });
        session.finish(result).await
    }

    /// Relay supply voltage in volts.
    pub async fn supply_voltage(&self) -> RelayResult<f32> {
        let mut session = self.open().await?;
        let result = session
            .request(&Command::Volts)
            .await
            .and_then(|reply| protocol::decode_volts(&reply));
        if let Ok(volts) = &result {
            debug!("Supply voltage at {}: {:.1}V", self.config.host, volts);
        }
        session.finish(result).await
    }
}
