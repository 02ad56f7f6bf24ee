//! Client for Devantech ETH-series network relay modules (ETH002, ETH008,
//! ETH484, ETH8020, ETH044) over their binary TCP protocol.
//!
//! ```no_run
//! # async fn demo() -> devantech_relays::RelayResult<()> {
//! let client = devantech_relays::RelayClient::new("10.10.10.10", "password");
//! client.set_relay_state(1, true).await?;
//! assert!(client.get_relay_state(1).await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod eth;

pub use config::RelayConfig;
pub use error::{ErrorKind, RelayError, RelayResult};
pub use eth::client::RelayClient;
pub use eth::{MAX_RELAYS, Model, ModuleInfo, RelayState, RelayStates, UnlockStatus};
