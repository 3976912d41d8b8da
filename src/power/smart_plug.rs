//! Smart plug over the legacy local TCP protocol.
//!
//! Requests and replies are JSON, obfuscated with an autokey XOR cipher
//! (initial key 171) and framed with a 4-byte big-endian length.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{PowerController, PowerError};

/// Default plug port
pub const DEFAULT_PORT: u16 = 9999;

/// Initial cipher key
const CIPHER_KEY: u8 = 171;

/// Largest reply we accept
const MAX_REPLY_BYTES: u32 = 64 * 1024;

/// Encrypt `plain` and prepend the length header
pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plain.len() + 4);
    out.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    let mut key = CIPHER_KEY;
    for &byte in plain {
        key ^= byte;
        out.push(key);
    }
    out
}

/// Decrypt a reply body (without its length header)
pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = CIPHER_KEY;
    cipher
        .iter()
        .map(|&byte| {
            let plain = key ^ byte;
            key = byte;
            plain
        })
        .collect()
}

/// Smart plug relay
#[derive(Debug, Clone)]
pub struct SmartPlug {
    address: String,
    off_duration: Duration,
    io_timeout: Duration,
}

impl SmartPlug {
    /// Plug at `host` or `host:port`
    pub fn new(address: &str) -> Self {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:{}", address, DEFAULT_PORT)
        };
        Self {
            address,
            off_duration: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
        }
    }

    /// How long the relay stays open during a power cycle
    pub fn with_off_duration(mut self, duration: Duration) -> Self {
        self.off_duration = duration;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Switch the relay on or off
    pub async fn set_relay(&self, on: bool) -> Result<(), PowerError> {
        let request = json!({ "system": { "set_relay_state": { "state": u8::from(on) } } });
        let reply = self.query(&request).await?;

        let code = reply
            .pointer("/system/set_relay_state/err_code")
            .and_then(Value::as_i64)
            .ok_or_else(|| PowerError::Protocol(format!("unexpected reply: {}", reply)))?;
        if code != 0 {
            return Err(PowerError::Rejected(code));
        }
        Ok(())
    }

    async fn query(&self, request: &Value) -> Result<Value, PowerError> {
        let frame = encrypt(&serde_json::to_vec(request)?);

        let exchange = async {
            let mut stream = TcpStream::connect(&self.address).await?;
            stream.write_all(&frame).await?;

            let len = stream.read_u32().await?;
            if len > MAX_REPLY_BYTES {
                return Err(PowerError::Protocol(format!("reply too large: {} bytes", len)));
            }
            let mut body = vec![0u8; len as usize];
            stream.read_exact(&mut body).await?;
            let reply: Value = serde_json::from_slice(&decrypt(&body))?;
            Ok::<Value, PowerError>(reply)
        };

        tokio::time::timeout(self.io_timeout, exchange)
            .await
            .map_err(|_| PowerError::Timeout(self.address.clone()))?
    }
}

#[async_trait]
impl PowerController for SmartPlug {
    fn describe(&self) -> String {
        format!("smart plug {}", self.address)
    }

    async fn power_cycle(&self) -> Result<(), PowerError> {
        info!("Power cycling {}", self.address);
        self.set_relay(false).await?;
        tokio::time::sleep(self.off_duration).await;
        self.set_relay(true).await?;
        info!("Power restored on {}", self.address);
        Ok(())
    }
}
