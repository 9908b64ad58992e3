//! Client configuration: defaults, optional JSON file, CLI overrides.

use serde::{Deserialize, Serialize};
use shared::FPS;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket address of the server, without path.
    pub server: String,
    /// Use bincode frames instead of JSON.
    pub binary: bool,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// How far behind the server clock remote players are rendered.
    pub client_server_offset_ms: f64,
    /// Per-frame smoothing towards the interpolated position.
    pub client_smoothing: f32,
    pub buffer_length_s: f64,
    pub fps: usize,
    /// Simulated round-trip latency added to every frame in both directions.
    pub fake_ping_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "ws://127.0.0.1:8080".to_string(),
            binary: true,
            name: String::new(),
            width: 1280,
            height: 720,
            client_server_offset_ms: 100.0,
            client_smoothing: 0.1,
            buffer_length_s: 2.0,
            fps: FPS,
            fake_ping_ms: 0,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Number of snapshots kept for interpolation.
    pub fn snapshot_capacity(&self) -> usize {
        ((self.fps as f64 * self.buffer_length_s).round() as usize).max(2)
    }

    /// Full connection URL including the path that selects the wire format.
    pub fn url(&self) -> String {
        let path = if self.binary { "/bin" } else { "/" };
        format!("{}{}", self.server.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_capacity() {
        assert_eq!(ClientConfig::default().snapshot_capacity(), 120);

        let config = ClientConfig {
            fps: 30,
            buffer_length_s: 0.01,
            ..ClientConfig::default()
        };
        assert_eq!(config.snapshot_capacity(), 2);
    }

    #[test]
    fn test_url_selects_format() {
        let mut config = ClientConfig::default();
        assert_eq!(config.url(), "ws://127.0.0.1:8080/bin");

        config.binary = false;
        config.server = "ws://example.com:9000/".into();
        assert_eq!(config.url(), "ws://example.com:9000/");
    }

    #[test]
    fn test_partial_json() {
        let config: ClientConfig = serde_json::from_str(r#"{"name": "ada"}"#).unwrap();
        assert_eq!(config.name, "ada");
        assert_eq!(config.client_server_offset_ms, 100.0);
    }
}
