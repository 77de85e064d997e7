use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Extension given to written transcripts.
pub const TRANSCRIPT_EXTENSION: &str = "txt";

/// One unit of work: an audio file and the transcript path it will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Scan `input_dir` and build the work queue for one run.
///
/// Entries are visited in sorted order, filtered to the recognized audio
/// `extensions` (case-insensitive), and mapped to `output_dir/<stem>.txt`
/// targets. Files whose transcript already exists are skipped without
/// counting against `batch`, so re-running over the same directories picks
/// up exactly the files that still need work. The scan stops as soon as
/// `batch` items are collected.
///
/// An unreadable input directory is an error; an empty queue is not.
pub fn build_queue(
    input_dir: &Path,
    output_dir: &Path,
    extensions: &[&str],
    batch: usize,
) -> Result<Vec<WorkItem>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    let mut queue = Vec::new();
    for path in entries {
        if queue.len() >= batch {
            break;
        }
        if !has_audio_extension(&path, extensions) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = output_dir
            .join(file_name)
            .with_extension(TRANSCRIPT_EXTENSION);
        if target.exists() {
            debug!(path = %path.display(), "transcript exists, skipping");
            continue;
        }
        queue.push(WorkItem {
            source: path,
            target,
        });
    }
    Ok(queue)
}

fn has_audio_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
