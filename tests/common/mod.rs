//! In-process stand-in for an ETH relay module.
//!
//! Listens on a loopback port and answers the binary command set the same way
//! the hardware does. Each command arrives as a single write from the client,
//! so one read is treated as one frame.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devantech_relays::eth::protocol::{
    DIGITAL_ACTIVE, DIGITAL_GET_INPUTS, DIGITAL_GET_OUTPUTS, DIGITAL_INACTIVE, DIGITAL_SET_OUTPUTS,
    GET_ANALOGUE_VOLTAGE, GET_MODULE_INFO, GET_SERIAL_NUMBER, GET_UNLOCK_TIME, GET_VOLTS, LOG_OUT,
    PASSWORD_ACCEPTED, PASSWORD_ENTRY,
};
use devantech_relays::{Model, RelayClient, RelayConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the simulated module misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Read commands but never answer
    Silent,
    /// Answer output-changing commands with a failure byte
    RejectWrites,
    /// Send one byte of the output reply, then close the socket
    HangUpMidReply,
    /// Close the socket instead of answering a log-out
    HangUpOnLogOut,
}

#[derive(Debug)]
pub struct ModuleState {
    pub model_id: u8,
    pub password: Option<String>,
    pub outputs: [u8; 3],
    pub inputs: u8,
    pub analogue: [u16; 8],
    pub volts: u8,
    pub mac: [u8; 6],
    pub behavior: Behavior,
    /// Opcodes in the order they were received, across all connections
    pub received: Vec<u8>,
    pub last_pulse: Option<u8>,
}

impl ModuleState {
    pub fn new(model_id: u8) -> Self {
        Self {
            model_id,
            password: None,
            outputs: [0; 3],
            inputs: 0,
            analogue: [0; 8],
            volts: 121,
            mac: [0x00, 0x04, 0xa3, 0x12, 0x34, 0x56],
            behavior: Behavior::Normal,
            received: Vec::new(),
            last_pulse: None,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn relay_count(&self) -> u8 {
        Model::from_id(self.model_id).map(|m| m.relays).unwrap_or(8)
    }

    fn handle(&mut self, frame: &[u8], unlocked: &mut bool) -> Reply {
        let Some(&opcode) = frame.first() else {
            return Reply::Close;
        };
        self.received.push(opcode);

        if self.behavior == Behavior::Silent {
            return Reply::Nothing;
        }

        let locked = self.password.is_some() && !*unlocked;
        let write_ack = if self.behavior == Behavior::RejectWrites { 1 } else { 0 };

        match opcode {
            GET_MODULE_INFO => Reply::Send(vec![self.model_id, 2, 7]),
            GET_UNLOCK_TIME => {
                let byte = match (&self.password, *unlocked) {
                    (None, _) => 255,
                    (Some(_), true) => 30,
                    (Some(_), false) => 0,
                };
                Reply::Send(vec![byte])
            }
            PASSWORD_ENTRY => {
                let attempt = String::from_utf8_lossy(&frame[1..]);
                if self.password.as_deref() == Some(attempt.as_ref()) {
                    *unlocked = true;
                    Reply::Send(vec![PASSWORD_ACCEPTED])
                } else {
                    Reply::Send(vec![2])
                }
            }
            _ if locked => Reply::Close,
            DIGITAL_ACTIVE | DIGITAL_INACTIVE if frame.len() == 3 => {
                let relay = frame[1];
                if relay == 0 || relay > self.relay_count() {
                    return Reply::Send(vec![1]);
                }
                if write_ack == 0 {
                    let bit = (relay - 1) as usize;
                    if opcode == DIGITAL_ACTIVE {
                        self.outputs[bit / 8] |= 1 << (bit % 8);
                    } else {
                        self.outputs[bit / 8] &= !(1 << (bit % 8));
                    }
                    self.last_pulse = Some(frame[2]);
                }
                Reply::Send(vec![write_ack])
            }
            DIGITAL_SET_OUTPUTS if frame.len() == 4 => {
                if write_ack == 0 {
                    self.outputs.copy_from_slice(&frame[1..4]);
                }
                Reply::Send(vec![write_ack])
            }
            DIGITAL_GET_OUTPUTS => {
                if self.behavior == Behavior::HangUpMidReply {
                    return Reply::SendThenClose(vec![self.outputs[0]]);
                }
                Reply::Send(self.outputs.to_vec())
            }
            DIGITAL_GET_INPUTS => Reply::Send(vec![0, 0, 0, self.inputs]),
            GET_ANALOGUE_VOLTAGE if frame.len() == 2 => {
                let channel = frame[1].saturating_sub(1) as usize;
                let value = self.analogue.get(channel).copied().unwrap_or(0);
                Reply::Send(value.to_be_bytes().to_vec())
            }
            GET_SERIAL_NUMBER => Reply::Send(self.mac.to_vec()),
            GET_VOLTS => Reply::Send(vec![self.volts]),
            LOG_OUT => {
                if self.behavior == Behavior::HangUpOnLogOut {
                    return Reply::Close;
                }
                *unlocked = false;
                Reply::Send(vec![0])
            }
            _ => Reply::Close,
        }
    }
}

enum Reply {
    Send(Vec<u8>),
    SendThenClose(Vec<u8>),
    Nothing,
    Close,
}

pub struct SimulatedModule {
    addr: SocketAddr,
    state: Arc<Mutex<ModuleState>>,
    handle: JoinHandle<()>,
}

impl SimulatedModule {
    pub async fn start(state: ModuleState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));

        let shared = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = shared.clone();
                tokio::spawn(serve(stream, state));
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn config(&self, password: &str) -> RelayConfig {
        RelayConfig::new(self.addr.ip().to_string(), password)
            .with_port(self.addr.port())
            .with_timeout(Duration::from_secs(2))
    }

    pub fn client(&self, password: &str) -> RelayClient {
        RelayClient::with_config(self.config(password))
    }

    pub fn outputs(&self) -> [u8; 3] {
        self.state.lock().unwrap().outputs
    }

    pub fn set_outputs(&self, outputs: [u8; 3]) {
        self.state.lock().unwrap().outputs = outputs;
    }

    pub fn received(&self) -> Vec<u8> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn clear_received(&self) {
        self.state.lock().unwrap().received.clear();
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut ModuleState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

impl Drop for SimulatedModule {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<ModuleState>>) {
    let mut unlocked = false;
    let mut buf = [0u8; 64];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let reply = {
            let mut module = state.lock().unwrap();
            module.handle(&buf[..n], &mut unlocked)
        };
        match reply {
            Reply::Send(bytes) => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }
            Reply::SendThenClose(bytes) => {
                let _ = stream.write_all(&bytes).await;
                return;
            }
            Reply::Nothing => {}
            Reply::Close => return,
        }
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
