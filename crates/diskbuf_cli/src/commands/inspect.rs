//! Inspect command implementation.

use super::{format_age, format_size, now_millis, signal_folders};
use diskbuf_storage::{scan_folder, summarize, BufferFileEntry};
use serde::Serialize;
use std::path::Path;

/// Age thresholds used to classify files.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Milliseconds a file accepts appends.
    pub write_age_millis: u64,
    /// Milliseconds before a file may be read.
    pub min_read_age_millis: u64,
    /// Milliseconds after which a file is discarded unread.
    pub max_read_age_millis: u64,
}

impl Thresholds {
    /// Builds thresholds from whole seconds.
    pub fn from_secs(write: u64, min_read: u64, max_read: u64) -> Self {
        Self {
            write_age_millis: write * 1000,
            min_read_age_millis: min_read * 1000,
            max_read_age_millis: max_read * 1000,
        }
    }
}

/// Where a file stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Probably still accepting appends.
    Writing,
    /// Closed but too young to read.
    Waiting,
    /// Inside the read window.
    Eligible,
    /// Past the max read age; will be evicted.
    Expired,
}

impl ReadStatus {
    fn classify(age_millis: u64, thresholds: &Thresholds) -> Self {
        if age_millis > thresholds.max_read_age_millis {
            Self::Expired
        } else if age_millis >= thresholds.min_read_age_millis {
            Self::Eligible
        } else if age_millis < thresholds.write_age_millis {
            Self::Writing
        } else {
            Self::Waiting
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Writing => "writing",
            Self::Waiting => "waiting",
            Self::Eligible => "eligible",
            Self::Expired => "expired",
        }
    }
}

/// One buffer file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// File name.
    pub name: String,
    /// Creation time in ms since the epoch.
    pub created_at_millis: u64,
    /// Age in ms.
    pub age_millis: u64,
    /// Size in bytes.
    pub size: u64,
    /// Complete records.
    pub records: usize,
    /// Whether the file ends in a torn record.
    pub truncated: bool,
    /// Read status under the given thresholds.
    pub status: ReadStatus,
}

/// One signal folder.
#[derive(Debug, Serialize)]
pub struct FolderReport {
    /// Signal name.
    pub signal: String,
    /// Total bytes.
    pub total_size: u64,
    /// Total complete records.
    pub total_records: usize,
    /// Files, oldest first.
    pub files: Vec<FileReport>,
}

/// Inspects every signal folder under `root`.
pub fn inspect(
    root: &Path,
    thresholds: &Thresholds,
    now_millis: u64,
) -> Result<Vec<FolderReport>, Box<dyn std::error::Error>> {
    let mut reports = Vec::new();
    for (kind, path) in signal_folders(root)? {
        let mut files = Vec::new();
        for entry in scan_folder(&path)? {
            files.push(file_report(&entry, thresholds, now_millis)?);
        }
        reports.push(FolderReport {
            signal: kind.to_string(),
            total_size: files.iter().map(|f| f.size).sum(),
            total_records: files.iter().map(|f| f.records).sum(),
            files,
        });
    }
    Ok(reports)
}

fn file_report(
    entry: &BufferFileEntry,
    thresholds: &Thresholds,
    now_millis: u64,
) -> Result<FileReport, Box<dyn std::error::Error>> {
    let summary = summarize(&entry.path)?;
    let age_millis = entry.age_millis(now_millis);
    Ok(FileReport {
        name: entry.created_at_millis.to_string(),
        created_at_millis: entry.created_at_millis,
        age_millis,
        size: summary.file_len,
        records: summary.records,
        truncated: summary.truncated,
        status: ReadStatus::classify(age_millis, thresholds),
    })
}

/// Runs the inspect command.
pub fn run(root: &Path, thresholds: Thresholds, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let reports = inspect(root, &thresholds, now_millis())?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        _ => {
            print_text_output(root, &reports);
        }
    }

    Ok(())
}

fn print_text_output(root: &Path, reports: &[FolderReport]) {
    println!("diskbuf Buffer Inspection");
    println!("=========================");
    println!();
    println!("Root: {}", root.display());

    if reports.is_empty() {
        println!();
        println!("No signal folders found");
        return;
    }

    for report in reports {
        println!();
        println!(
            "{}: {} files, {} records, {}",
            report.signal,
            report.files.len(),
            report.total_records,
            format_size(report.total_size)
        );
        for file in &report.files {
            println!(
                "  {:<15} {:>10} {:>9} {:>6} rec  {}{}",
                file.name,
                format_age(file.age_millis),
                format_size(file.size),
                file.records,
                file.status.as_str(),
                if file.truncated { "  (torn tail)" } else { "" }
            );
        }
    }
}
