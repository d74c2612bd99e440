//! Read-only access to a log file: tail, search, stats and live follow.

use crate::types::{is_severity_line, LogStats};
use chrono::{DateTime, Local, NaiveDateTime};
use daq_common::{parse_log_timestamp, Error, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Chunk size used when scanning a file backwards for its last lines.
const TAIL_CHUNK: u64 = 8 * 1024;

/// A log file on disk.
///
/// All operations open the file fresh, so a stream can be kept around while
/// the writer appends to (or someone truncates) the file.
#[derive(Debug, Clone)]
pub struct LogStream {
    path: PathBuf,
}

impl LogStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(self.path.display().to_string()),
            _ => Error::from(e).context(format!("Failed to open {}", self.path.display())),
        })
    }

    /// The last `n` lines of the file, oldest first.
    pub fn recent_lines(&self, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.open()?;
        let len = file.metadata()?.len();

        // Read backwards until the buffer holds more than n newlines
        let mut buffer: Vec<u8> = Vec::new();
        let mut pos = len;
        while pos > 0 {
            let step = TAIL_CHUNK.min(pos);
            pos -= step;
            file.seek(SeekFrom::Start(pos))?;
            let mut chunk = vec![0u8; step as usize];
            file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&buffer);
            buffer = chunk;

            if buffer.iter().filter(|b| **b == b'\n').count() > n {
                break;
            }
        }

        let text = String::from_utf8_lossy(&buffer);
        let lines: Vec<&str> = text.lines().collect();
        let skip = lines.len().saturating_sub(n);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }

    /// The most recent `limit` lines that look like errors or warnings,
    /// oldest first.
    pub fn search(&self, limit: usize) -> Result<Vec<String>> {
        let mut matches = VecDeque::with_capacity(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        for line in self.lossy_lines()? {
            let line = line?;
            if is_severity_line(&line) {
                if matches.len() == limit {
                    matches.pop_front();
                }
                matches.push_back(line);
            }
        }

        Ok(matches.into_iter().collect())
    }

    /// Size, line count, severity hits and last timestamp.
    pub fn stats(&self) -> Result<LogStats> {
        let file = self.open()?;
        let meta = file.metadata()?;
        let modified = meta.modified().ok().map(DateTime::<Local>::from);

        let mut line_count = 0u64;
        let mut severity_lines = 0u64;
        let mut last_entry: Option<NaiveDateTime> = None;

        for line in self.lossy_lines()? {
            let line = line?;
            line_count += 1;
            if is_severity_line(&line) {
                severity_lines += 1;
            }
            if let Some(ts) = parse_log_timestamp(&line) {
                last_entry = Some(ts);
            }
        }

        Ok(LogStats {
            path: self.path.clone(),
            size_bytes: meta.len(),
            line_count,
            severity_lines,
            last_entry,
            modified,
        })
    }

    /// Lines decoded lossily, so a stray invalid byte never aborts a read.
    fn lossy_lines(&self) -> Result<impl Iterator<Item = Result<String>>> {
        let reader = BufReader::new(self.open()?);
        Ok(reader.split(b'\n').map(|chunk| {
            let mut bytes = chunk?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }))
    }

    /// Print the last `backlog` lines, then every newly appended complete
    /// line until `cancel` fires. A truncated file is followed from its new
    /// start.
    pub async fn follow<W: Write>(
        &self,
        backlog: usize,
        out: &mut W,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        for line in self.recent_lines(backlog)? {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        let mut position = tokio::fs::metadata(&self.path).await?.len();
        let mut pending: Vec<u8> = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }

            let len = match tokio::fs::metadata(&self.path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    debug!("Log file {} unavailable: {}", self.path.display(), e);
                    continue;
                }
            };

            if len < position {
                debug!("Log file {} was truncated, following from start", self.path.display());
                position = 0;
                pending.clear();
            }
            if len == position {
                continue;
            }

            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(position)).await?;
            let mut fresh = Vec::with_capacity((len - position) as usize);
            let read = file.read_to_end(&mut fresh).await?;
            position += read as u64;
            pending.extend_from_slice(&fresh);

            // Only complete lines are emitted; a partial tail waits for its newline
            if let Some(last_newline) = pending.iter().rposition(|b| *b == b'\n') {
                let complete: Vec<u8> = pending.drain(..=last_newline).collect();
                for line in String::from_utf8_lossy(&complete).lines() {
                    writeln!(out, "{}", line)?;
                }
                out.flush()?;
            }
        }

        Ok(())
    }
}
