//! Incremental draining of a running command's output.

use std::io::{self, Write};

use super::channel::{Channel, Stream};

/// Largest single read from a channel.
pub const CHUNK_SIZE: usize = 1024;

/// Where drained text goes.
pub trait OutputSink {
    fn emit(&mut self, stream: Stream, text: &str);
}

/// Forwards remote stdout to our stdout and remote stderr to our stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Stream::Stderr => {
                let mut err = io::stderr().lock();
                let _ = err.write_all(text.as_bytes());
                let _ = err.flush();
            }
        }
    }
}

/// Keeps everything in memory, per stream and in arrival order.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    pub stdout: String,
    pub stderr: String,
    pub events: Vec<(Stream, String)>,
}

impl OutputSink for CaptureSink {
    fn emit(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => self.stdout.push_str(text),
            Stream::Stderr => self.stderr.push_str(text),
        }
        self.events.push((stream, text.to_string()));
    }
}

/// UTF-8 decoding across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let checked = std::str::from_utf8(&self.carry)
                .map(|_| ())
                .map_err(|e| (e.valid_up_to(), e.error_len()));

            match checked {
                Ok(()) => {
                    out.push_str(&String::from_utf8_lossy(&self.carry));
                    self.carry.clear();
                    return out;
                }
                Err((valid, invalid_len)) => {
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match invalid_len {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + len);
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            self.carry.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        rest
    }
}

/// Moves whatever output is ready from a channel to a sink.
///
/// Each call drains stderr first, then stdout, reading at most
/// [`CHUNK_SIZE`] bytes at a time and never waiting on an empty stream.
#[derive(Debug, Default)]
pub struct Drainer {
    stdout: Utf8Decoder,
    stderr: Utf8Decoder,
    stdout_bytes: u64,
    stderr_bytes: u64,
}

impl Drainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain both streams once. Returns whether any bytes were moved.
    pub fn drain<C: Channel + ?Sized>(
        &mut self,
        channel: &mut C,
        sink: &mut dyn OutputSink,
    ) -> io::Result<bool> {
        let mut moved = false;
        let mut buf = [0u8; CHUNK_SIZE];

        for stream in [Stream::Stderr, Stream::Stdout] {
            while channel.ready(stream) {
                let n = channel.recv(stream, &mut buf)?;
                if n == 0 {
                    break;
                }
                moved = true;

                let text = match stream {
                    Stream::Stdout => {
                        self.stdout_bytes += n as u64;
                        self.stdout.decode(&buf[..n])
                    }
                    Stream::Stderr => {
                        self.stderr_bytes += n as u64;
                        self.stderr.decode(&buf[..n])
                    }
                };
                if !text.is_empty() {
                    sink.emit(stream, &text);
                }
            }
        }

        Ok(moved)
    }

    /// Emit any bytes still held back as an incomplete UTF-8 sequence.
    pub fn finish(&mut self, sink: &mut dyn OutputSink) {
        let stderr = self.stderr.finish();
        if !stderr.is_empty() {
            sink.emit(Stream::Stderr, &stderr);
        }
        let stdout = self.stdout.finish();
        if !stdout.is_empty() {
            sink.emit(Stream::Stdout, &stdout);
        }
    }

    /// Total raw bytes moved from `stream` so far.
    pub fn bytes_moved(&self, stream: Stream) -> u64 {
        match stream {
            Stream::Stdout => self.stdout_bytes,
            Stream::Stderr => self.stderr_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Channel whose streams deliver scripted chunks, one per readiness.
    #[derive(Default)]
    struct ScriptedChannel {
        stdout: VecDeque<Vec<u8>>,
        stderr: VecDeque<Vec<u8>>,
    }

    impl ScriptedChannel {
        fn queue(&mut self, stream: Stream) -> &mut VecDeque<Vec<u8>> {
            match stream {
                Stream::Stdout => &mut self.stdout,
                Stream::Stderr => &mut self.stderr,
            }
        }
    }

    impl Channel for ScriptedChannel {
        fn ready(&mut self, stream: Stream) -> bool {
            !self.queue(stream).is_empty()
        }

        fn recv(&mut self, stream: Stream, buf: &mut [u8]) -> io::Result<usize> {
            let queue = self.queue(stream);
            let Some(mut chunk) = queue.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                queue.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn at_eof(&mut self, stream: Stream) -> bool {
            self.queue(stream).is_empty()
        }

        fn exit_status_ready(&mut self) -> io::Result<bool> {
            Ok(true)
        }

        fn exit_status(&mut self) -> io::Result<Option<i32>> {
            Ok(Some(0))
        }
    }

    #[test]
    fn test_drain_reports_movement() {
        let mut channel = ScriptedChannel::default();
        channel.stdout.push_back(b"hello\n".to_vec());
        channel.stderr.push_back(b"warning\n".to_vec());

        let mut drainer = Drainer::new();
        let mut sink = CaptureSink::default();

        assert!(drainer.drain(&mut channel, &mut sink).unwrap());
        assert!(!drainer.drain(&mut channel, &mut sink).unwrap());
        assert_eq!(sink.stdout, "hello\n");
        assert_eq!(sink.stderr, "warning\n");
        // stderr is drained before stdout within one pass
        assert_eq!(sink.events[0].0, Stream::Stderr);
    }

    #[test]
    fn test_large_chunks_are_read_in_bounded_pieces() {
        let mut channel = ScriptedChannel::default();
        channel.stdout.push_back(vec![b'a'; CHUNK_SIZE * 2 + 10]);

        let mut drainer = Drainer::new();
        let mut sink = CaptureSink::default();
        drainer.drain(&mut channel, &mut sink).unwrap();

        assert_eq!(sink.events.len(), 3);
        assert_eq!(sink.stdout.len(), CHUNK_SIZE * 2 + 10);
        assert_eq!(drainer.bytes_moved(Stream::Stdout), (CHUNK_SIZE * 2 + 10) as u64);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "build ✓ done";
        let bytes = text.as_bytes();
        let split = text.find('✓').unwrap() + 1;

        let mut channel = ScriptedChannel::default();
        channel.stdout.push_back(bytes[..split].to_vec());
        channel.stdout.push_back(bytes[split..].to_vec());

        let mut drainer = Drainer::new();
        let mut sink = CaptureSink::default();
        drainer.drain(&mut channel, &mut sink).unwrap();
        drainer.finish(&mut sink);

        assert_eq!(sink.stdout, text);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut channel = ScriptedChannel::default();
        channel.stderr.push_back(vec![b'o', b'k', 0xff, b'!']);

        let mut drainer = Drainer::new();
        let mut sink = CaptureSink::default();
        drainer.drain(&mut channel, &mut sink).unwrap();

        assert_eq!(sink.stderr, "ok\u{fffd}!");
    }

    #[test]
    fn test_dangling_partial_sequence_is_flushed_on_finish() {
        let mut channel = ScriptedChannel::default();
        channel.stdout.push_back(vec![b'x', 0xe2, 0x9c]);

        let mut drainer = Drainer::new();
        let mut sink = CaptureSink::default();
        drainer.drain(&mut channel, &mut sink).unwrap();
        assert_eq!(sink.stdout, "x");

        drainer.finish(&mut sink);
        assert_eq!(sink.stdout, "x\u{fffd}");
    }
}
