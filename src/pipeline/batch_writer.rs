// Write each ingested batch to its own ND-JSON file named
// `<prefix>_<YYYY-MM-DD>_<sequence>.log`. The sequence restarts at 1 when the
// UTC date moves forward and always skips names that already exist on disk, so
// concurrent flushes and leftovers from a previous run never collide. Names
// already taken in object storage are handled by `relocate`.

use crate::domain::{Batch, LogEntry};
use crate::error::IngestError;
use chrono::{NaiveDate, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_FILE_PREFIX: &str = "logaggregator";

/// A batch file that has been fully written to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub name: String,
    pub date: NaiveDate,
    pub sequence: u64,
    pub entries: usize,
}

/// Last observed UTC date and the next suffix to try for it.
struct Sequence {
    date: Option<NaiveDate>,
    next: u64,
}

impl Sequence {
    /// Move to `date` and return the date names are issued under. The
    /// remembered date never moves backwards, so a late caller holding an
    /// older date cannot restart a day that already handed out names.
    fn roll_to(&mut self, date: NaiveDate) -> NaiveDate {
        match self.date {
            Some(current) if current >= date => current,
            _ => {
                self.date = Some(date);
                self.next = 1;
                date
            }
        }
    }
}

pub struct BatchWriter {
    directory: PathBuf,
    prefix: String,
    sequence: Mutex<Sequence>,
}

impl BatchWriter {
    /// Create the writer, creating `directory` if it does not exist yet.
    pub async fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| IngestError::io(&directory, e))?;

        Ok(Self {
            directory,
            prefix: prefix.into(),
            sequence: Mutex::new(Sequence { date: None, next: 1 }),
        })
    }

    pub fn file_name(&self, date: NaiveDate, sequence: u64) -> String {
        format!("{}_{}_{}.log", self.prefix, date.format("%Y-%m-%d"), sequence)
    }

    /// Write `entries` to the next free file name for the current UTC date.
    /// The date is read after the lock is taken.
    pub async fn flush(&self, entries: &[LogEntry]) -> Result<BatchFile, IngestError> {
        let batch = self.render(entries)?;
        let mut sequence = self.sequence.lock().await;
        let today = sequence.roll_to(Utc::now().date_naive());
        self.write_next(&mut sequence, today, &batch).await
    }

    /// Same as [`flush`](Self::flush) with an explicit date.
    pub async fn flush_on(
        &self,
        today: NaiveDate,
        entries: &[LogEntry],
    ) -> Result<BatchFile, IngestError> {
        let batch = self.render(entries)?;
        let mut sequence = self.sequence.lock().await;
        let today = sequence.roll_to(today);
        self.write_next(&mut sequence, today, &batch).await
    }

    /// Move `file` to the next free name of its date after that name turned
    /// out to be taken in object storage. Later flushes of the same date
    /// continue past the new name.
    pub async fn relocate(&self, file: &BatchFile) -> Result<BatchFile, IngestError> {
        let mut sequence = self.sequence.lock().await;
        let mut number = file.sequence + 1;
        if sequence.date == Some(file.date) {
            number = number.max(sequence.next);
        }

        loop {
            let name = self.file_name(file.date, number);
            let path = self.directory.join(&name);

            // hard_link refuses an existing target, unlike rename.
            match tokio::fs::hard_link(&file.path, &path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    number += 1;
                    continue;
                }
                Err(e) => return Err(IngestError::io(path, e)),
            }

            if sequence.date == Some(file.date) {
                sequence.next = number + 1;
            }
            if let Err(e) = tokio::fs::remove_file(&file.path).await {
                warn!(file = %file.name, "Failed to remove relocated batch file: {e}");
            }

            debug!(from = %file.name, to = %name, "Batch file renamed");
            return Ok(BatchFile {
                path,
                name,
                date: file.date,
                sequence: number,
                entries: file.entries,
            });
        }
    }

    fn render(&self, entries: &[LogEntry]) -> Result<Batch, IngestError> {
        Batch::render(entries).map_err(|e| IngestError::io(&self.directory, e.into()))
    }

    // Caller holds the sequence lock for name selection and the write.
    async fn write_next(
        &self,
        sequence: &mut Sequence,
        today: NaiveDate,
        batch: &Batch,
    ) -> Result<BatchFile, IngestError> {
        loop {
            let number = sequence.next;
            let name = self.file_name(today, number);
            let path = self.directory.join(&name);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(file = %name, "Batch file name taken, advancing sequence");
                    sequence.next += 1;
                    continue;
                }
                Err(e) => return Err(IngestError::io(path, e)),
            };

            sequence.next += 1;

            if let Err(e) = write_batch(&mut file, batch).await {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    warn!(file = %name, "Failed to remove partially written batch file: {remove_err}");
                }
                return Err(IngestError::io(path, e));
            }

            debug!(file = %name, entries = batch.entry_count(), "Batch file written");
            return Ok(BatchFile {
                path,
                name,
                date: today,
                sequence: number,
                entries: batch.entry_count(),
            });
        }
    }
}

async fn write_batch(file: &mut File, batch: &Batch) -> std::io::Result<()> {
    file.write_all(batch.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewLogEntry;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(message: &str) -> LogEntry {
        LogEntry::try_from(NewLogEntry {
            origin_ip: "127.0.0.1".into(),
            application_id: "4109".into(),
            date: "2025-03-15".into(),
            time: "01:56:59".into(),
            client_ip: "127.0.0.1".into(),
            level: "INFO".into(),
            method: "get_dns".into(),
            component: "server.py".into(),
            message: message.into(),
        })
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_nth_flush_of_the_day_gets_suffix_n() {
        let temp_dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "logaggregator").await.unwrap();

        for expected in 1..=3u64 {
            let file = writer.flush_on(day(15), &[entry("x")]).await.unwrap();
            assert_eq!(file.sequence, expected);
            assert_eq!(file.name, format!("logaggregator_2025-03-15_{expected}.log"));
            assert!(file.path.exists());
        }
    }

    #[tokio::test]
    async fn test_file_contains_ndjson_body() {
        let temp_dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();

        let file = writer
            .flush_on(day(15), &[entry("one"), entry("two")])
            .await
            .unwrap();

        let content = std::fs::read_to_string(&file.path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(file.entries, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "one");
        assert_eq!(lines[1]["message"], "two");
    }

    #[tokio::test]
    async fn test_existing_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("logs_2025-03-15_1.log"), "stale").unwrap();
        std::fs::write(temp_dir.path().join("logs_2025-03-15_2.log"), "stale").unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();

        let file = writer.flush_on(day(15), &[entry("fresh")]).await.unwrap();

        assert_eq!(file.sequence, 3);
        let stale = std::fs::read_to_string(temp_dir.path().join("logs_2025-03-15_1.log")).unwrap();
        assert_eq!(stale, "stale");
    }

    #[tokio::test]
    async fn test_date_rollover_resets_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();

        assert_eq!(writer.flush_on(day(15), &[entry("a")]).await.unwrap().sequence, 1);
        assert_eq!(writer.flush_on(day(15), &[entry("b")]).await.unwrap().sequence, 2);

        let next_day = writer.flush_on(day(16), &[entry("c")]).await.unwrap();
        assert_eq!(next_day.sequence, 1);
        assert_eq!(next_day.name, "logs_2025-03-16_1.log");
    }

    #[tokio::test]
    async fn test_late_flush_with_older_date_does_not_restart_the_day() {
        let temp_dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "p").await.unwrap();

        let a = writer.flush_on(day(16), &[entry("a")]).await.unwrap();
        // Forwarded and cleaned up, so the name is free on disk again.
        std::fs::remove_file(&a.path).unwrap();
        let b = writer.flush_on(day(15), &[entry("b")]).await.unwrap();
        let c = writer.flush_on(day(16), &[entry("c")]).await.unwrap();

        assert_eq!(a.name, "p_2025-03-16_1.log");
        assert_eq!(b.name, "p_2025-03-16_2.log");
        assert_eq!(c.name, "p_2025-03-16_3.log");
    }

    #[tokio::test]
    async fn test_relocate_moves_file_past_taken_names() {
        let temp_dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();
        let file = writer.flush_on(day(15), &[entry("moved")]).await.unwrap();
        std::fs::write(temp_dir.path().join("logs_2025-03-15_2.log"), "stale").unwrap();

        let moved = writer.relocate(&file).await.unwrap();

        assert_eq!(moved.name, "logs_2025-03-15_3.log");
        assert_eq!(moved.sequence, 3);
        assert!(!file.path.exists());
        assert!(std::fs::read_to_string(&moved.path).unwrap().contains("moved"));
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("logs_2025-03-15_2.log")).unwrap(),
            "stale"
        );

        let next = writer.flush_on(day(15), &[entry("next")]).await.unwrap();
        assert_eq!(next.sequence, 4);
    }

    #[tokio::test]
    async fn test_concurrent_flushes_never_share_a_name() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Arc::new(BatchWriter::new(temp_dir.path(), "logs").await.unwrap());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let writer = writer.clone();
                tokio::spawn(async move {
                    writer
                        .flush_on(day(15), &[entry(&format!("msg {i}"))])
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut names = HashSet::new();
        let mut sequences = Vec::new();
        for handle in handles {
            let file = handle.await.unwrap();
            sequences.push(file.sequence);
            assert!(names.insert(file.name));
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=32).collect::<Vec<u64>>());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 32);
    }

    #[tokio::test]
    async fn test_two_writers_sharing_a_directory_do_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let first = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();
        let second = BatchWriter::new(temp_dir.path(), "logs").await.unwrap();

        let a = first.flush_on(day(15), &[entry("a")]).await.unwrap();
        let b = second.flush_on(day(15), &[entry("b")]).await.unwrap();

        assert_ne!(a.name, b.name);
        assert_eq!(b.sequence, 2);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = BatchWriter::new(blocker.join("logs"), "logs").await;

        assert!(matches!(result, Err(IngestError::Io { .. })));
    }
}
