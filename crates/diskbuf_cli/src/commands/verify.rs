//! Verify command implementation.

use super::signal_folders;
use diskbuf_storage::{parse_file_name, summarize, LOCK_FILE};
use std::fs;
use std::path::Path;

/// Verification result for one signal folder.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of buffer files checked.
    pub files_checked: usize,
    /// Number of complete records found.
    pub records: usize,
    /// Number of files ending in a torn record.
    pub torn_files: usize,
    /// List of problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.torn_files == 0 && self.errors.is_empty()
    }
}

/// Checks every entry of one signal folder.
///
/// Torn tails are recoverable (readers stop at the last whole record) but
/// are still reported. Entries that are neither buffer files nor the lock
/// file, such as a `.partial` left by an interrupted write-back, are errors.
pub fn verify_folder(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    let mut names: Vec<_> = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;
    names.sort();

    for name in names {
        let display = name.to_string_lossy().into_owned();
        if display == LOCK_FILE {
            continue;
        }
        if name.to_str().and_then(parse_file_name).is_none() {
            result.errors.push(format!("Unexpected entry: {}", display));
            continue;
        }

        let file_path = path.join(&name);
        if !file_path.is_file() {
            result.errors.push(format!("Not a regular file: {}", display));
            continue;
        }

        result.files_checked += 1;
        match summarize(&file_path) {
            Ok(summary) => {
                result.records += summary.records;
                if summary.truncated {
                    result.torn_files += 1;
                    result.errors.push(format!(
                        "{}: torn record after byte {} of {}",
                        display, summary.valid_len, summary.file_len
                    ));
                }
            }
            Err(e) => {
                result
                    .errors
                    .push(format!("{}: failed to read: {}", display, e));
            }
        }
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying buffers at {:?}", root);
    println!();

    let mut all_ok = true;
    for (kind, path) in signal_folders(root)? {
        println!("Checking {}...", kind);
        let result = verify_folder(&path)?;
        print_result(&kind.to_string(), &result);
        all_ok &= result.is_ok();
    }

    println!();
    if all_ok {
        println!("✓ Buffer verification passed");
        Ok(())
    } else {
        println!("✗ Buffer verification failed");
        Err("Verification failed".into())
    }
}

fn print_result(name: &str, result: &VerifyResult) {
    println!("  {} results:", name);
    println!("    Files checked: {}", result.files_checked);
    println!("    Records: {}", result.records);
    println!("    Torn files: {}", result.torn_files);

    if !result.errors.is_empty() {
        println!("    Errors:");
        for error in &result.errors {
            println!("      - {}", error);
        }
    }
}
