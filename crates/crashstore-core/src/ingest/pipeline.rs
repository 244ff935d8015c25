//! Ingestion driver: header, body frames and dump text for one stream, plus
//! Rayon-based parallel ingestion of a directory of dump files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{FrameRouting, IngestOptions};
use crate::errors::CrashStoreResult;
use crate::ingest::aggregate::ReportBuilder;
use crate::ingest::frame::decode_frame_line;
use crate::ingest::header::strip_terminator;
use crate::models::{Frame, Report};

/// Decides which body frames reach the builder.
///
/// Under [`FrameRouting::CrashedThread`] frames of the crashed thread go
/// straight through. Frames of the first thread seen are held back and only
/// used when the crashed thread contributes none (or the header named no
/// crashed thread).
struct FrameRouter {
    routing: FrameRouting,
    crashed_thread: Option<String>,
    first_thread: Option<Option<String>>,
    held: Vec<Frame>,
    kept: usize,
    filtered: usize,
}

impl FrameRouter {
    fn new(routing: FrameRouting, crashed_thread: Option<String>) -> Self {
        Self {
            routing,
            crashed_thread,
            first_thread: None,
            held: Vec::new(),
            kept: 0,
            filtered: 0,
        }
    }

    fn route(&mut self, builder: &mut ReportBuilder, frame: Frame) -> CrashStoreResult<()> {
        if self.routing == FrameRouting::AllThreads {
            self.kept += 1;
            return builder.add_frame(frame);
        }
        if self.crashed_thread.is_some() && frame.thread_num == self.crashed_thread {
            self.kept += 1;
            return builder.add_frame(frame);
        }
        let first = self.first_thread.get_or_insert_with(|| frame.thread_num.clone());
        if *first == frame.thread_num {
            self.held.push(frame);
        } else {
            self.filtered += 1;
        }
        Ok(())
    }

    fn finish(self, builder: &mut ReportBuilder) -> CrashStoreResult<usize> {
        if self.kept > 0 {
            return Ok(self.filtered + self.held.len());
        }
        if !self.held.is_empty() {
            debug!(
                crashed_thread = ?self.crashed_thread,
                thread = ?self.first_thread.as_ref().and_then(|t| t.as_deref()),
                "crashed thread has no frames, using first thread"
            );
        }
        for frame in self.held {
            builder.add_frame(frame)?;
        }
        Ok(self.filtered)
    }
}

/// Feed a whole dump stream into `builder` and finish it.
///
/// Any error leaves the builder unfinished; the partial report is simply
/// dropped with it.
pub fn ingest_into<R: BufRead>(
    builder: &mut ReportBuilder,
    reader: &mut R,
    options: &IngestOptions,
) -> CrashStoreResult<Report> {
    let crashed_thread = builder.read_header(reader)?;

    let mut line = String::new();
    let mut skipped = 0usize;
    let mut router = FrameRouter::new(options.routing, crashed_thread);
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        builder.append_dump_text(&line)?;
        let stripped = strip_terminator(&line);
        if stripped.is_empty() {
            continue;
        }
        let Some(frame) = decode_frame_line(stripped) else {
            warn!(line = stripped, "skipping body line without a frame number");
            skipped += 1;
            continue;
        };
        router.route(builder, frame)?;
    }
    let filtered = router.finish(builder)?;

    let report = builder.finish()?;
    debug!(
        uuid = %report.uuid,
        frames = report.frames.len(),
        skipped,
        filtered,
        dump_bytes = report.dump.as_ref().map_or(0, |d| d.data.len()),
        "ingested crash report"
    );
    Ok(report)
}

/// Ingest one dump stream as the report `uuid`.
pub fn ingest_stream<R: BufRead>(
    uuid: &str,
    reader: &mut R,
    options: &IngestOptions,
) -> CrashStoreResult<Report> {
    let mut builder = ReportBuilder::new(uuid);
    ingest_into(&mut builder, reader, options)
}

/// Ingest a dump file; its file stem is the report uuid.
pub fn ingest_file(path: &Path, options: &IngestOptions) -> CrashStoreResult<Report> {
    let uuid = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut reader = BufReader::new(File::open(path)?);
    ingest_stream(&uuid, &mut reader, options)
}

/// Result of ingesting one file of a directory.
#[derive(Debug)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub result: CrashStoreResult<Report>,
}

/// Collect dump files under `dir` carrying the configured extension, sorted
/// by path.
pub fn scan_dump_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to read directory entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Ingest every dump file under `dir` in parallel. Reports are independent, so
/// one bad file never affects the others; outcomes come back in path order.
pub fn ingest_dir(dir: &Path, options: &IngestOptions) -> Vec<IngestOutcome> {
    let started = Instant::now();
    let files = scan_dump_files(dir, &options.extension);
    if files.is_empty() {
        return vec![];
    }

    let ingest_one = |path: &PathBuf| IngestOutcome {
        path: path.clone(),
        result: ingest_file(path, options),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build();

    let outcomes: Vec<IngestOutcome> = match pool {
        Ok(pool) => pool.install(|| files.par_iter().map(ingest_one).collect()),
        Err(e) => {
            warn!("Failed to build ingestion pool, ingesting sequentially: {e}");
            files.iter().map(ingest_one).collect()
        }
    };

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        dir = %dir.display(),
        files = outcomes.len(),
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "directory ingestion finished"
    );
    outcomes
}
