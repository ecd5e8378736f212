use pw_protocol::{DeviceFrame, ErrorNotice};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A scripted device: connects to the ingest gateway and sends frames on
/// demand, so tests control exactly what goes over the wire.
pub struct MockDevice {
    stream: TcpStream,
}

impl MockDevice {
    pub async fn connect(addr: SocketAddr) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    /// Send one frame, newline-terminated.
    pub async fn send_frame(&mut self, frame: &DeviceFrame) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_string(frame)?;
        json.push('\n');
        self.stream.write_all(json.as_bytes()).await?;
        Ok(())
    }

    /// Send raw bytes, exactly as given — for malformed and partial frames.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Read until the server closes the connection and parse the final
    /// error notice it wrote.
    pub async fn recv_notice(&mut self) -> Result<ErrorNotice, Box<dyn std::error::Error>> {
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf).await?;
        if buf.is_empty() {
            return Err("connection closed without a notice".into());
        }
        Ok(serde_json::from_slice(&buf)?)
    }

    /// Wait for the server to close the connection; returns whatever bytes
    /// it wrote first (possibly none).
    pub async fn wait_closed(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
