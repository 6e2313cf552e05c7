//! Size-rotated raw log archival
//!
//! Every raw line of a session lands in
//! `log_<device>_<YYYYmmdd_HHMMSS>_part<N>.txt`, where the timestamp is the
//! session start and `N` grows as parts fill up. Concatenating the parts in
//! order reproduces the stream losslessly.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use ivimon_core::prelude::*;

/// Default rotation threshold in megabytes
pub const DEFAULT_ROTATE_MB: u64 = 50;

/// Rotation notice returned by [`ArchiveWriter::append`] when a new part
/// was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    pub path: PathBuf,
    pub part_index: u32,
}

pub struct ArchiveWriter {
    directory: PathBuf,
    /// `log_<device>_<stamp>`; the per-part suffix is appended to this
    stem: String,
    rotate_bytes: u64,
    part_index: u32,
    current_path: PathBuf,
    file: BufWriter<File>,
    /// Bytes written to the current part
    written: u64,
}

impl ArchiveWriter {
    /// Open part 1 for a new session
    ///
    /// The archive directory is created if missing. The filename timestamp is
    /// fixed at `started_at`; rotations only bump the part number.
    pub fn create(
        directory: &Path,
        device_id: &str,
        started_at: DateTime<Local>,
        rotate_bytes: u64,
    ) -> Result<Self> {
        std::fs::create_dir_all(directory)
            .map_err(|e| Error::archive(directory.to_path_buf(), e))?;

        let stamp = started_at.format("%Y%m%d_%H%M%S");
        let stem = format!("log_{}_{}", sanitize_device_id(device_id), stamp);

        let part_index = 1;
        let current_path = directory.join(format!("{}_part{}.txt", stem, part_index));
        let file = open_part(&current_path)?;

        info!("Archiving to {:?}", current_path);

        Ok(Self {
            directory: directory.to_path_buf(),
            stem,
            rotate_bytes,
            part_index,
            current_path,
            file,
            written: 0,
        })
    }

    /// Append one raw line (newline added here)
    ///
    /// Returns rotation info when the write pushed the part over the
    /// threshold and a new part was opened. Errors are recoverable: the
    /// writer keeps its state and the next append tries again.
    pub fn append(&mut self, line: &str) -> Result<Option<Rotation>> {
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .map_err(|e| Error::archive(self.current_path.clone(), e))?;
        self.written += line.len() as u64 + 1;

        if self.written >= self.rotate_bytes {
            return self.rotate().map(Some);
        }
        Ok(None)
    }

    fn rotate(&mut self) -> Result<Rotation> {
        self.file
            .flush()
            .map_err(|e| Error::archive(self.current_path.clone(), e))?;

        self.part_index += 1;
        self.current_path = self
            .directory
            .join(format!("{}_part{}.txt", self.stem, self.part_index));
        self.file = open_part(&self.current_path)?;
        self.written = 0;

        info!("Rotated archive to {:?}", self.current_path);
        Ok(Rotation {
            path: self.current_path.clone(),
            part_index: self.part_index,
        })
    }

    /// Flush and close the current part, returning its path
    pub fn finalize(mut self) -> Result<PathBuf> {
        self.file
            .flush()
            .map_err(|e| Error::archive(self.current_path.clone(), e))?;
        Ok(self.current_path)
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn part_index(&self) -> u32 {
        self.part_index
    }
}

fn open_part(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::archive(path.to_path_buf(), e))?;
    Ok(BufWriter::new(file))
}

/// Keep serials filename-safe; network serials carry a `:` port separator
fn sanitize_device_id(device_id: &str) -> String {
    device_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn started_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_part1_created_on_open() {
        let temp = tempdir().unwrap();
        let writer = ArchiveWriter::create(temp.path(), "R58M123ABC", started_at(), 1024).unwrap();

        let expected = temp.path().join("log_R58M123ABC_20250314_092653_part1.txt");
        assert_eq!(writer.current_path(), expected);
        assert_eq!(writer.part_index(), 1);
        assert!(expected.exists());
    }

    #[test]
    fn test_network_serial_is_sanitized() {
        let temp = tempdir().unwrap();
        let writer =
            ArchiveWriter::create(temp.path(), "192.168.1.50:5555", started_at(), 1024).unwrap();

        let name = writer.current_path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, "log_192.168.1.50-5555_20250314_092653_part1.txt");
    }

    #[test]
    fn test_rotation_at_threshold() {
        let temp = tempdir().unwrap();
        // 10-byte lines (9 chars + newline); threshold after 3 of them.
        let mut writer = ArchiveWriter::create(temp.path(), "serial1", started_at(), 30).unwrap();

        assert_eq!(writer.append("aaaaaaaaa").unwrap(), None);
        assert_eq!(writer.append("bbbbbbbbb").unwrap(), None);

        let rotation = writer.append("ccccccccc").unwrap().expect("should rotate");
        assert_eq!(rotation.part_index, 2);
        assert_eq!(
            rotation.path,
            temp.path().join("log_serial1_20250314_092653_part2.txt")
        );
        assert_eq!(writer.part_index(), 2);

        // The next append lands in part 2 without rotating again.
        assert_eq!(writer.append("ddddddddd").unwrap(), None);
    }

    #[test]
    fn test_parts_concatenate_losslessly() {
        let temp = tempdir().unwrap();
        let mut writer = ArchiveWriter::create(temp.path(), "serial1", started_at(), 40).unwrap();

        let lines: Vec<String> = (0..10).map(|i| format!("line number {}", i)).collect();
        for line in &lines {
            writer.append(line).unwrap();
        }
        let final_part = writer.finalize().unwrap();
        assert!(final_part.exists());

        let mut parts: Vec<PathBuf> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        parts.sort();
        assert!(parts.len() > 1, "expected the threshold to force rotation");

        let mut combined = String::new();
        for part in parts {
            combined.push_str(&std::fs::read_to_string(part).unwrap());
        }
        let expected: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        assert_eq!(combined, expected);
    }

    #[test]
    fn test_finalize_flushes_buffered_lines() {
        let temp = tempdir().unwrap();
        let mut writer =
            ArchiveWriter::create(temp.path(), "serial1", started_at(), 1024 * 1024).unwrap();

        writer.append("buffered line").unwrap();
        let path = writer.finalize().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "buffered line\n");
    }

    #[test]
    fn test_create_makes_missing_directory() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("archives").join("2025");

        let writer = ArchiveWriter::create(&nested, "serial1", started_at(), 1024).unwrap();
        assert!(writer.current_path().exists());
    }
}
