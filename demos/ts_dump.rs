//! Reads a single transport stream file and writes each elementary
//! stream's payload to `stream<index>.out`.
//!
//! Usage: `cargo run --example ts_dump [segment.ts]`

use demuxio::av::{ElementaryStream, StreamType};
use demuxio::buffer::Buffer;
use demuxio::format::ts::{types, StreamSink, TSDemuxer};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader};

const STREAM_CAPACITY: usize = 32 << 20;

/// Collects every announced stream into its own owned buffer.
struct DumpSink {
    streams: Vec<ElementaryStream>,
    next_index: u8,
}

impl DumpSink {
    fn new() -> Self {
        Self {
            streams: Vec::new(),
            next_index: 1,
        }
    }
}

impl StreamSink for DumpSink {
    fn create_stream(
        &mut self,
        stream_type: StreamType,
        program_id: u16,
    ) -> Option<&mut ElementaryStream> {
        let index = self.next_index;
        self.next_index += 1;
        let region = Buffer::with_capacity(STREAM_CAPACITY);
        self.streams.push(ElementaryStream::new(
            region.sub_buffer(0, STREAM_CAPACITY),
            stream_type,
            program_id,
            index,
        ));
        self.streams.last_mut()
    }

    fn get_stream(&mut self, _program_id: u16, index: u8) -> Option<&mut ElementaryStream> {
        self.streams.iter_mut().find(|s| s.index() == index)
    }

    fn finalize_stream(&mut self, program_id: u16, index: u8) {
        if let Some(stream) = self.get_stream(program_id, index) {
            stream.finish();
            println!(
                "finalized stream {index} of program {program_id}: {} bytes, {} access units",
                stream.payload_len(),
                stream.access_unit_count()
            );
        }
    }

    fn overflow_stream(
        &mut self,
        _program_id: u16,
        index: u8,
        needed: usize,
    ) -> Option<&mut ElementaryStream> {
        eprintln!("stream {index} overflowed by {needed} bytes");
        None
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "fileSequence0.ts".to_string());

    let file = File::open(&path).await?;
    let mut reader = BufReader::new(file);

    let mut sink = DumpSink::new();
    let mut demuxer = TSDemuxer::new();
    let stats = demuxer.read_stream(&mut reader, &mut sink).await?;
    println!(
        "{path}: {} packets parsed, {} dropped",
        stats.sync_count, stats.skip_count
    );

    for program in demuxer.programs() {
        println!("program {} (pmt pid 0x{:04x}):", program.program_id, program.pmt_pid);
        for &index in &program.stream_indices {
            let Some(stream) = sink.streams.iter().find(|s| s.index() == index) else {
                continue;
            };
            let out_name = format!("stream{index}.out");
            let mut output = File::create(&out_name).await?;
            output.write_all(&stream.payload()).await?;
            output.flush().await?;

            if stream.stream_type() == StreamType::VideoH264 {
                for i in 0..stream.access_unit_count() {
                    if let Some(unit) = stream.access_unit(i) {
                        println!(
                            "  au {i}: {} bytes @ pts {:?}",
                            unit.len,
                            types::pts_to_time(unit.pts)
                        );
                    }
                }
            }
            println!(
                "  wrote {out_name} ({} bytes, stream id 0x{:02x})",
                stream.payload_len(),
                stream.stream_id(),
            );
        }
    }

    Ok(())
}
