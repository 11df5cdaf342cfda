// src/serial.rs - Serial link to the downstream device
use crate::codec::Payload;
use crate::config::SerialConfig;
use async_trait::async_trait;
use serial2_tokio::SerialPort;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("serial write failed: {0}")]
    Write(#[from] io::Error),
    #[error("serial write timed out after {0:?}")]
    Timeout(Duration),
}

/// Destination for encoded time updates.
#[async_trait]
pub trait TimeSink: Send {
    async fn send(&mut self, payload: &Payload) -> Result<(), ConnectionError>;
}

/// Exclusively-owned serial port, opened once and released on drop.
///
/// Write-only: nothing is ever read back from the device.
pub struct SerialLink {
    port: SerialPort,
    name: String,
    timeout: Duration,
}

impl SerialLink {
    pub fn open(config: &SerialConfig) -> Result<Self, ConnectionError> {
        tracing::info!("Opening serial port {} at {} baud", config.port, config.baud);
        let port = SerialPort::open(&config.port, config.baud).map_err(|source| {
            ConnectionError::Open {
                port: config.port.clone(),
                source,
            }
        })?;
        Ok(Self {
            port,
            name: config.port.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn write_payload(&self, payload: &Payload) -> io::Result<()> {
        let mut written = 0;
        while written < payload.len() {
            let n = self.port.write(&payload[written..]).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "serial port accepted no bytes"));
            }
            written += n;
        }
        Ok(())
    }
}

#[async_trait]
impl TimeSink for SerialLink {
    async fn send(&mut self, payload: &Payload) -> Result<(), ConnectionError> {
        tracing::debug!("Serial TX {:02X?} on {}", payload, self.name);
        match timeout(self.timeout, self.write_payload(payload)).await {
            Ok(result) => result.map_err(ConnectionError::Write),
            Err(_) => Err(ConnectionError::Timeout(self.timeout)),
        }
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> io::Result<Vec<String>> {
    let paths = SerialPort::available_ports()?;
    Ok(paths.iter().map(|p| p.display().to_string()).collect())
}
