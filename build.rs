use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../demuxio.template.toml");

    let template = r#"# demuxio Configuration Template
# Copy this file to 'demuxio.toml' and fill in your actual values

# HLS master playlist URL for the demos
playlist_url = "http://example.com/stream/prog_index.m3u8"

# Host-supplied buffer geometry (bytes / slots)
video_buffer_size = 8388608
audio_buffer_size = 1048576
stream_buffer_count = 2
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
