//! Hyprland IPC interface
//!
//! Talks to Hyprland over its request socket. The only thing the daemon
//! needs from it is the cursor position, polled to detect user activity.

use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Cursor position in global layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CursorPos {
    pub x: i32,
    pub y: i32,
}

/// Request socket of the running Hyprland instance
pub fn socket_path() -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| "HYPRLAND_INSTANCE_SIGNATURE is not set (not running under Hyprland?)")?;
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| "XDG_RUNTIME_DIR is not set")?;
    Ok(PathBuf::from(runtime_dir)
        .join("hypr")
        .join(signature)
        .join(".socket.sock"))
}

/// Send a JSON request (`j/<command>`) and read the whole reply
async fn request(command: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let mut stream = UnixStream::connect(socket_path()?).await?;
    stream.write_all(format!("j/{}", command).as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply)
}

/// Get current cursor position
pub async fn get_cursor_pos() -> Result<CursorPos, Box<dyn std::error::Error + Send + Sync>> {
    let reply = request("cursorpos").await?;
    let pos = parse_cursor_pos(&reply)?;
    debug!("Cursor at ({}, {})", pos.x, pos.y);
    Ok(pos)
}

fn parse_cursor_pos(reply: &str) -> Result<CursorPos, serde_json::Error> {
    serde_json::from_str(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cursorpos_reply() {
        let pos = parse_cursor_pos(r#"{"x": 1280, "y": -12}"#).unwrap();
        assert_eq!(pos, CursorPos { x: 1280, y: -12 });
    }

    #[test]
    fn rejects_error_reply() {
        assert!(parse_cursor_pos("unknown request").is_err());
    }
}
