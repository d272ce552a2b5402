//! Line-based interactive prompts
//!
//! Generic over the reader and writer so the menus can be driven from
//! in-memory buffers in tests.

use std::io::{BufRead, Write};

use crate::config::SizePreset;
use crate::models::VolumeInfo;
use crate::util::units::format_bytes;
use crate::{DiskSpeedError, Result};

pub struct Prompter<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read one trimmed line; `None` on end of input
    fn read_answer(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask for a 1-based choice among `count` options until a valid one is given
    fn choose(&mut self, question: &str, count: usize) -> Result<usize> {
        loop {
            write!(self.writer, "{} [1-{}]: ", question, count)?;
            self.writer.flush()?;

            let Some(answer) = self.read_answer()? else {
                return Err(DiskSpeedError::Cancelled);
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.writer, "Please enter a number between 1 and {}", count)?,
            }
        }
    }

    /// Show the volume menu and return the chosen index
    pub fn select_volume(&mut self, volumes: &[VolumeInfo]) -> Result<usize> {
        if volumes.is_empty() {
            return Err(DiskSpeedError::ConfigError(
                "No volumes available to benchmark".to_string(),
            ));
        }

        writeln!(self.writer, "\nAvailable volumes:")?;
        for (i, volume) in volumes.iter().enumerate() {
            writeln!(
                self.writer,
                "  {}) {}  [{}, {}, {}]  {} free of {}",
                i + 1,
                volume.mount_path.display(),
                volume.device,
                volume.media_type,
                volume.filesystem,
                format_bytes(volume.available),
                format_bytes(volume.capacity)
            )?;
        }

        self.choose("Select a volume", volumes.len())
    }

    pub fn select_size(&mut self) -> Result<SizePreset> {
        writeln!(self.writer, "\nTest size:")?;
        for (i, preset) in SizePreset::ALL.iter().enumerate() {
            writeln!(self.writer, "  {}) {}", i + 1, preset.label())?;
        }

        let index = self.choose("Select a size", SizePreset::ALL.len())?;
        Ok(SizePreset::ALL[index])
    }

    /// Yes/no question; empty input or end of input takes `default`
    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.writer, "{} [{}]: ", question, hint)?;
            self.writer.flush()?;

            let Some(answer) = self.read_answer()? else {
                return Ok(default);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.writer, "Please answer y or n")?,
            }
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn volumes() -> Vec<VolumeInfo> {
        ["/", "/Volumes/External"]
            .iter()
            .map(|mount| VolumeInfo {
                mount_path: PathBuf::from(mount),
                capacity: 1024 * 1024 * 1024 * 1024,
                available: 512 * 1024 * 1024 * 1024,
                device: "/dev/disk1".to_string(),
                media_type: "SSD".to_string(),
                filesystem: "apfs".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_select_volume_reprompts_on_invalid_input() {
        let mut p = prompter("abc\n0\n3\n2\n");
        assert_eq!(p.select_volume(&volumes()).unwrap(), 1);

        let output = String::from_utf8(p.into_writer()).unwrap();
        assert!(output.contains("1) /  [/dev/disk1, SSD, apfs]"));
        assert_eq!(output.matches("Please enter a number").count(), 3);
    }

    #[test]
    fn test_select_volume_end_of_input_cancels() {
        let mut p = prompter("");
        assert!(matches!(p.select_volume(&volumes()), Err(DiskSpeedError::Cancelled)));
        assert!(matches!(p.select_volume(&[]), Err(DiskSpeedError::ConfigError(_))));
    }

    #[test]
    fn test_select_size() {
        let mut p = prompter("3\n");
        assert_eq!(p.select_size().unwrap(), SizePreset::TenGiB);
    }

    #[test]
    fn test_confirm_defaults_and_answers() {
        let mut p = prompter("\nn\nmaybe\nYES\n");
        assert!(p.confirm("Start?", true).unwrap());
        assert!(!p.confirm("Start?", true).unwrap());
        assert!(p.confirm("Again?", false).unwrap());
        // End of input falls back to the default
        assert!(!p.confirm("Again?", false).unwrap());

        let output = String::from_utf8(p.into_writer()).unwrap();
        assert!(output.contains("Start? [Y/n]: "));
        assert!(output.contains("Again? [y/N]: "));
        assert!(output.contains("Please answer y or n"));
    }
}
