//! Process-wide configuration for the demos and sample hosts.
//!
//! Defaults can be overridden by `DEMUXIO_*` environment variables and a
//! local `demuxio.toml` (a flat `key = "value"` file; no TOML tables).

use lazy_static::lazy_static;
use log::warn;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;
use url::Url;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Runtime configuration values.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master playlist URL the demos play
    pub playlist_url: String,
    /// Host-supplied video buffer size in bytes
    pub video_buffer_size: usize,
    /// Host-supplied audio buffer size in bytes
    pub audio_buffer_size: usize,
    /// Ring slots per stream type
    pub stream_buffer_count: usize,
}

impl Config {
    fn new() -> Self {
        // Default values (not containing sensitive information)
        let mut config = Config {
            playlist_url: String::from("http://example.com/stream/prog_index.m3u8"),
            video_buffer_size: 8 << 20,
            audio_buffer_size: 1 << 20,
            stream_buffer_count: 2,
        };

        // Try loading from environment variables first
        if let Ok(url) = env::var("DEMUXIO_PLAYLIST_URL") {
            config.playlist_url = url;
        }
        if let Ok(size) = env::var("DEMUXIO_VIDEO_BUFFER_SIZE") {
            if let Ok(size) = size.parse() {
                config.video_buffer_size = size;
            }
        }
        if let Ok(size) = env::var("DEMUXIO_AUDIO_BUFFER_SIZE") {
            if let Ok(size) = size.parse() {
                config.audio_buffer_size = size;
            }
        }
        if let Ok(count) = env::var("DEMUXIO_BUFFER_COUNT") {
            if let Ok(count) = count.parse() {
                config.stream_buffer_count = count;
            }
        }

        // Then try loading from config file
        let config_paths = ["./demuxio.toml", "./demuxio_config.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    if let Some(url) = scan_value(&content, "playlist_url") {
                        config.playlist_url = url;
                    }
                    if let Some(size) = scan_value(&content, "video_buffer_size") {
                        if let Ok(size) = size.parse() {
                            config.video_buffer_size = size;
                        }
                    }
                    if let Some(size) = scan_value(&content, "audio_buffer_size") {
                        if let Ok(size) = size.parse() {
                            config.audio_buffer_size = size;
                        }
                    }
                    if let Some(count) = scan_value(&content, "stream_buffer_count") {
                        if let Ok(count) = count.parse() {
                            config.stream_buffer_count = count;
                        }
                    }
                }
            }
        }

        if Url::parse(&config.playlist_url).is_err() {
            warn!("configured playlist url is not a valid url; demos will likely fail to open it");
        }

        config
    }

    /// Re-reads environment variables and config files.
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

fn scan_value(content: &str, key: &str) -> Option<String> {
    let line = content
        .lines()
        .find(|line| line.trim_start().starts_with(key))?;
    let value = line.split('=').nth(1)?;
    let value = value.trim().trim_matches('"').trim_matches('\'');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Returns the current configuration snapshot.
pub fn current() -> Config {
    CONFIG.read().expect("config lock poisoned").clone()
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# demuxio Configuration
# This is a template. Replace the values with your actual configuration.

# HLS master playlist URL for the demos
playlist_url = "http://example.com/stream/prog_index.m3u8"

# Host-supplied buffer geometry
video_buffer_size = 8388608
audio_buffer_size = 1048576
stream_buffer_count = 2
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
