use std::{
    io::{self, BufRead, BufReader, Read},
    thread::{self, JoinHandle},
};

use crate::MAX_FORWARDED_LINE_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Drains one of the backend's pipes on a dedicated thread until EOF.
pub fn spawn_output_drain<R>(reader: R, stream: OutputStream, pid: u32) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("backend-{}", stream.as_str()))
        .spawn(move || {
            let result = drain_lines(reader, MAX_FORWARDED_LINE_BYTES, |line| {
                forward_line(stream, pid, line)
            });
            match result {
                Ok(()) => tracing::debug!(target: "backend", pid, stream = stream.as_str(), "output stream closed"),
                Err(error) => tracing::warn!(
                    target: "backend",
                    pid,
                    stream = stream.as_str(),
                    "failed to read backend output: {error}"
                ),
            }
        })
}

fn forward_line(stream: OutputStream, pid: u32, line: &str) {
    match stream {
        OutputStream::Stdout => tracing::info!(target: "backend", pid, stream = "stdout", "{line}"),
        OutputStream::Stderr => tracing::warn!(target: "backend", pid, stream = "stderr", "{line}"),
    }
}

/// Splits `reader` into lines and hands each non-blank one to `emit`.
///
/// At most `max_line_bytes` are held at once; longer lines are emitted in pieces.
/// Invalid UTF-8 is replaced rather than ending the drain.
pub fn drain_lines<R, F>(reader: R, max_line_bytes: usize, mut emit: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(&str),
{
    let max_line_bytes = max_line_bytes.max(1);
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::with_capacity(max_line_bytes.min(1024));

    loop {
        let consumed = {
            let available = match reader.fill_buf() {
                Ok(buffer) => buffer,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    flush_pending(&mut pending, &mut emit);
                    return Err(error);
                }
            };
            if available.is_empty() {
                flush_pending(&mut pending, &mut emit);
                return Ok(());
            }

            for &byte in available {
                if byte == b'\n' {
                    flush_pending(&mut pending, &mut emit);
                    continue;
                }
                pending.push(byte);
                if pending.len() >= max_line_bytes {
                    let tail = pending.split_off(char_boundary_cut(&pending));
                    flush_pending(&mut pending, &mut emit);
                    pending = tail;
                }
            }
            available.len()
        };
        reader.consume(consumed);
    }
}

/// Where to cut a full buffer so a trailing, still incomplete UTF-8
/// sequence moves on to the next piece instead of being split.
fn char_boundary_cut(bytes: &[u8]) -> usize {
    let tail_start = bytes.len().saturating_sub(3);
    for start in (tail_start..bytes.len()).rev() {
        if bytes[start] & 0xC0 == 0x80 {
            continue;
        }
        return match std::str::from_utf8(&bytes[start..]) {
            Err(error) if error.error_len().is_none() && start > 0 => start,
            _ => bytes.len(),
        };
    }
    bytes.len()
}

fn flush_pending<F>(pending: &mut Vec<u8>, emit: &mut F)
where
    F: FnMut(&str),
{
    if pending.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(pending);
    let line = text.trim_end_matches(['\r', '\n']);
    if !line.trim().is_empty() {
        emit(line);
    }
    pending.clear();
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn collect(input: &[u8], max_line_bytes: usize) -> Vec<String> {
        let mut lines = Vec::new();
        drain_lines(Cursor::new(input.to_vec()), max_line_bytes, |line| {
            lines.push(line.to_string())
        })
        .unwrap();
        lines
    }

    #[test]
    fn splits_lines_and_drops_blank_ones() {
        assert_eq!(
            collect(b"You can now view your Streamlit app\r\n\n  \nURL: http://localhost:8501\npartial", 1024),
            vec![
                "You can now view your Streamlit app",
                "URL: http://localhost:8501",
                "partial"
            ]
        );
    }

    #[test]
    fn long_lines_are_forwarded_in_bounded_pieces() {
        assert_eq!(collect(b"abcdefghij\nxy\n", 4), vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn long_lines_are_not_cut_inside_a_character() {
        assert_eq!(collect("abcé\n".as_bytes(), 4), vec!["abc", "é"]);
        assert_eq!(collect("ab€cd\n".as_bytes(), 3), vec!["ab", "€", "cd"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(collect(b"ok\xff\n", 1024), vec!["ok\u{FFFD}"]);
    }

    #[test]
    fn empty_input_emits_nothing() {
        assert!(collect(b"", 16).is_empty());
    }

    #[test]
    fn spawned_drain_finishes_at_end_of_stream() {
        let handle = spawn_output_drain(
            Cursor::new(b"line one\nline two\n".to_vec()),
            OutputStream::Stdout,
            42,
        )
        .unwrap();
        handle.join().unwrap();
    }
}
