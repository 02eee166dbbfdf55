//! Line reader: single-byte, non-blocking reads off a raw descriptor
//! with an idle-sleep timeout, so a wedged child's pipe doesn't hang the
//! harness forever.

use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::read;

/// Default idle-timeout budget, in seconds, before a stalled descriptor is
/// treated as exhausted.
pub const DEFAULT_BLOCKING_TIME: u64 = 20;

/// Upper bound on a single buffered line; a line longer than this is handed
/// back unterminated rather than grown without bound.
pub const DEFAULT_BUFFER_LEN: usize = 512;

/// What one `read_line` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A line, with its trailing `\n` if one was seen (absent at EOF or when
    /// the buffer filled before a newline arrived).
    Line(String),
    /// EOF, a hard read error, or idle-exhausted with nothing buffered.
    EndOfInput,
}

/// Reads logical lines off a raw fd, switching it to non-blocking mode on
/// construction so idle waits are ours to control rather than the kernel's.
pub struct LineReader {
    fd: RawFd,
    blocking_time: u64,
    buffer_len: usize,
}

/// Decodes a complete raw line as UTF-8, replacing any ill-formed sequence
/// with U+FFFD rather than failing the whole read on one bad line.
fn decode(raw: Vec<u8>) -> String {
    match String::from_utf8(raw) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl LineReader {
    pub fn new(fd: RawFd) -> Result<Self> {
        Self::with_limits(fd, DEFAULT_BLOCKING_TIME, DEFAULT_BUFFER_LEN)
    }

    pub fn with_limits(fd: RawFd, blocking_time: u64, buffer_len: usize) -> Result<Self> {
        let flags = fcntl(fd, FcntlArg::F_GETFL).context("fcntl F_GETFL on reader fd")?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags)).context("fcntl F_SETFL O_NONBLOCK on reader fd")?;
        Ok(Self {
            fd,
            blocking_time,
            buffer_len,
        })
    }

    /// Reads one line, blocking this thread (via idle sleeps, not a kernel
    /// blocking read) for up to `blocking_time` cumulative idle seconds.
    /// Bytes are buffered raw and only decoded as UTF-8 once a full line (or
    /// the buffer cap, or EOF) is reached, so multi-byte sequences split
    /// across reads are never corrupted.
    pub fn read_line(&mut self) -> Result<LineOutcome> {
        let mut buf: Vec<u8> = Vec::new();
        let mut idle_seconds = 0u64;
        let mut byte = [0u8; 1];

        loop {
            if buf.len() + 1 >= self.buffer_len {
                return Ok(LineOutcome::Line(decode(buf)));
            }

            match read(self.fd, &mut byte) {
                Ok(0) => {
                    return Ok(if buf.is_empty() {
                        LineOutcome::EndOfInput
                    } else {
                        LineOutcome::Line(decode(buf))
                    });
                }
                Ok(_) => {
                    idle_seconds = 0;
                    buf.push(byte[0]);
                    if byte[0] == b'\n' {
                        return Ok(LineOutcome::Line(decode(buf)));
                    }
                }
                Err(Errno::EWOULDBLOCK) => {
                    if idle_seconds >= self.blocking_time {
                        return Ok(if buf.is_empty() {
                            LineOutcome::EndOfInput
                        } else {
                            LineOutcome::Line(decode(buf))
                        });
                    }
                    thread::sleep(Duration::from_secs(1));
                    idle_seconds += 1;
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(anyhow::anyhow!("read failed: {e}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{close, pipe, write};

    #[test]
    fn reads_a_complete_line() {
        let (read_fd, write_fd) = pipe().unwrap();
        write(write_fd, b"ok 1\n").unwrap();
        close(write_fd).unwrap();

        let mut reader = LineReader::new(read_fd).unwrap();
        let outcome = reader.read_line().unwrap();
        assert_eq!(outcome, LineOutcome::Line("ok 1\n".to_string()));

        close(read_fd).ok();
    }

    #[test]
    fn eof_with_no_data_is_end_of_input() {
        let (read_fd, write_fd) = pipe().unwrap();
        close(write_fd).unwrap();

        let mut reader = LineReader::new(read_fd).unwrap();
        assert_eq!(reader.read_line().unwrap(), LineOutcome::EndOfInput);

        close(read_fd).ok();
    }

    #[test]
    fn eof_after_partial_line_returns_the_partial_content() {
        let (read_fd, write_fd) = pipe().unwrap();
        write(write_fd, b"ok 1").unwrap();
        close(write_fd).unwrap();

        let mut reader = LineReader::new(read_fd).unwrap();
        let outcome = reader.read_line().unwrap();
        assert_eq!(outcome, LineOutcome::Line("ok 1".to_string()));

        close(read_fd).ok();
    }

    #[test]
    fn multi_byte_utf8_description_decodes_correctly() {
        let (read_fd, write_fd) = pipe().unwrap();
        write(write_fd, "ok 1 - caf\u{e9}\n".as_bytes()).unwrap();
        close(write_fd).unwrap();

        let mut reader = LineReader::new(read_fd).unwrap();
        let outcome = reader.read_line().unwrap();
        assert_eq!(outcome, LineOutcome::Line("ok 1 - caf\u{e9}\n".to_string()));

        close(read_fd).ok();
    }

    #[test]
    fn buffer_cap_returns_partial_line_without_terminator() {
        let (read_fd, write_fd) = pipe().unwrap();
        let long = "x".repeat(20);
        write(write_fd, long.as_bytes()).unwrap();
        close(write_fd).unwrap();

        let mut reader = LineReader::with_limits(read_fd, DEFAULT_BLOCKING_TIME, 8).unwrap();
        let outcome = reader.read_line().unwrap();
        match outcome {
            LineOutcome::Line(s) => assert_eq!(s.len(), 7),
            other => panic!("expected Line, got {:?}", other),
        }

        close(read_fd).ok();
    }
}
