//! Report aggregate under construction.
//!
//! A [`ReportBuilder`] owns everything ingested for one crash submission until
//! [`ReportBuilder::finish`] hands out the completed [`Report`]. After that
//! every mutating call fails with [`CrashStoreError::AlreadyFinished`].

use std::io::BufRead;

use chrono::{DateTime, Utc};

use crate::errors::{CrashStoreError, CrashStoreResult};
use crate::ingest::dump::DumpText;
use crate::ingest::header::{read_header, ReportHeader};
use crate::models::{Frame, Report};

/// Submission metadata supplied alongside the dump.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionMetadata {
    pub product: Option<String>,
    pub version: Option<String>,
    pub build: Option<String>,
    pub url: Option<String>,
    pub install_age: Option<i64>,
    pub last_crash: Option<i64>,
    pub comments: Option<String>,
}

#[derive(Debug)]
pub struct ReportBuilder {
    draft: Option<Report>,
    dump: DumpText,
    crashed_thread: Option<String>,
}

impl ReportBuilder {
    /// Start a report for `uuid`, dated now.
    pub fn new(uuid: impl Into<String>) -> Self {
        Self::with_date(uuid, Utc::now())
    }

    pub fn with_date(uuid: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            draft: Some(Report::empty(uuid.into(), date)),
            dump: DumpText::new(),
            crashed_thread: None,
        }
    }

    fn draft_mut(&mut self) -> CrashStoreResult<&mut Report> {
        self.draft.as_mut().ok_or(CrashStoreError::AlreadyFinished)
    }

    pub fn is_finished(&self) -> bool {
        self.draft.is_none()
    }

    /// Crashed thread id named by the header, once it has been read.
    pub fn crashed_thread(&self) -> Option<&str> {
        self.crashed_thread.as_deref()
    }

    pub fn with_metadata(&mut self, metadata: SubmissionMetadata) -> CrashStoreResult<()> {
        let report = self.draft_mut()?;
        report.product = metadata.product;
        report.version = metadata.version;
        report.build = metadata.build;
        report.url = metadata.url;
        report.install_age = metadata.install_age;
        report.last_crash = metadata.last_crash;
        report.comments = metadata.comments;
        Ok(())
    }

    /// Set the report signature explicitly instead of deriving it on finish.
    pub fn with_signature(&mut self, signature: impl Into<String>) -> CrashStoreResult<()> {
        self.draft_mut()?.signature = Some(signature.into());
        Ok(())
    }

    /// Read the header section from `reader` into the report and return the
    /// crashed thread id, which callers use to route the body lines.
    pub fn read_header<R: BufRead>(&mut self, reader: &mut R) -> CrashStoreResult<Option<String>> {
        if self.is_finished() {
            return Err(CrashStoreError::AlreadyFinished);
        }
        let header = read_header(reader, &mut self.dump)?;
        self.apply_header(header)
    }

    fn apply_header(&mut self, header: ReportHeader) -> CrashStoreResult<Option<String>> {
        let report = self.draft_mut()?;
        report.os_name = header.os_name;
        report.os_version = header.os_version;
        report.cpu_name = header.cpu_name;
        report.cpu_info = header.cpu_info;
        report.reason = header.reason;
        report.address = header.address;
        self.crashed_thread = header.crashed_thread;
        Ok(self.crashed_thread.clone())
    }

    /// Append raw dump text (a body line including its terminator).
    pub fn append_dump_text(&mut self, text: &str) -> CrashStoreResult<()> {
        if self.is_finished() {
            return Err(CrashStoreError::AlreadyFinished);
        }
        self.dump.append(text)
    }

    /// Insert `frame` in `frame_num` order. A frame number may appear only
    /// once per report.
    pub fn add_frame(&mut self, frame: Frame) -> CrashStoreResult<()> {
        let frames = &mut self.draft_mut()?.frames;
        match frames.binary_search_by_key(&frame.frame_num, |f| f.frame_num) {
            Ok(_) => Err(CrashStoreError::DuplicateFrame {
                frame_num: frame.frame_num,
            }),
            Err(idx) => {
                frames.insert(idx, frame);
                Ok(())
            }
        }
    }

    /// Finalize the dump and hand out the completed report.
    ///
    /// Without an explicit signature, the report takes the signature of the
    /// lowest-numbered frame of the crashed thread, or of the lowest-numbered
    /// frame overall when the crashed thread contributed none.
    pub fn finish(&mut self) -> CrashStoreResult<Report> {
        let mut report = self.draft.take().ok_or(CrashStoreError::AlreadyFinished)?;
        report.dump = Some(self.dump.finalize(report.id)?);
        if report.signature.is_none() {
            let crashed = self.crashed_thread.as_deref();
            let top = report
                .frames
                .iter()
                .find(|f| crashed.is_some() && f.thread_num.as_deref() == crashed)
                .or_else(|| report.frames.first());
            report.signature = top.map(Frame::signature);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::frame::decode_frame_line;
    use std::io::Cursor;

    fn frame(line: &str) -> Frame {
        decode_frame_line(line).unwrap()
    }

    #[test]
    fn new_builder_is_dated_at_construction() {
        let before = Utc::now();
        let mut builder = ReportBuilder::new("uuid-1");
        let report = builder.finish().unwrap();
        assert!(report.date >= before);
        assert!(report.date <= Utc::now());
        assert_eq!(report.uuid, "uuid-1");
    }

    #[test]
    fn frames_are_kept_in_ascending_order() {
        let mut builder = ReportBuilder::new("u");
        for n in [5, 0, 3, 1, 4, 2] {
            builder.add_frame(frame(&format!("0|{n}|m|f{n}"))).unwrap();
        }
        let report = builder.finish().unwrap();
        let nums: Vec<u32> = report.frames.iter().map(|f| f.frame_num).collect();
        assert_eq!(nums, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn duplicate_frame_number_is_rejected() {
        let mut builder = ReportBuilder::new("u");
        builder.add_frame(frame("0|1|m|first")).unwrap();
        let err = builder.add_frame(frame("1|1|m|second")).unwrap_err();
        assert!(matches!(err, CrashStoreError::DuplicateFrame { frame_num: 1 }));
        assert!(err.is_validation());
        let report = builder.finish().unwrap();
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0].function.as_deref(), Some("first"));
    }

    #[test]
    fn finish_twice_is_a_state_error() {
        let mut builder = ReportBuilder::new("u");
        builder.finish().unwrap();
        assert!(matches!(builder.finish(), Err(CrashStoreError::AlreadyFinished)));
    }

    #[test]
    fn mutation_after_finish_fails() {
        let mut builder = ReportBuilder::new("u");
        builder.finish().unwrap();
        assert!(builder.is_finished());
        assert!(matches!(
            builder.add_frame(frame("0|0")),
            Err(CrashStoreError::AlreadyFinished)
        ));
        assert!(matches!(
            builder.append_dump_text("x"),
            Err(CrashStoreError::AlreadyFinished)
        ));
        assert!(matches!(
            builder.with_signature("sig"),
            Err(CrashStoreError::AlreadyFinished)
        ));
        assert!(matches!(
            builder.with_metadata(SubmissionMetadata::default()),
            Err(CrashStoreError::AlreadyFinished)
        ));
        let mut reader = Cursor::new(b"OS|Linux|5.10\n\n".to_vec());
        assert!(matches!(
            builder.read_header(&mut reader),
            Err(CrashStoreError::AlreadyFinished)
        ));
    }

    #[test]
    fn header_and_body_text_form_the_dump() {
        let mut builder = ReportBuilder::new("u");
        let mut reader = Cursor::new(b"Crash|SIGSEGV|0xdead|0\n\n".to_vec());
        let crashed = builder.read_header(&mut reader).unwrap();
        assert_eq!(crashed.as_deref(), Some("0"));
        assert_eq!(builder.crashed_thread(), Some("0"));
        builder.append_dump_text("0|0|m|f|s|1|0x1\n").unwrap();
        let report = builder.finish().unwrap();
        assert_eq!(report.reason.as_deref(), Some("SIGSEGV"));
        assert_eq!(report.address.as_deref(), Some("0xdead"));
        assert_eq!(
            report.dump.map(|d| d.data).as_deref(),
            Some("Crash|SIGSEGV|0xdead|0\n\n0|0|m|f|s|1|0x1\n")
        );
    }

    #[test]
    fn signature_comes_from_crashed_thread_top_frame() {
        let mut builder = ReportBuilder::new("u");
        builder
            .read_header(&mut Cursor::new(b"Crash|SIGSEGV|0x0|1\n\n".to_vec()))
            .unwrap();
        builder.add_frame(frame("0|0|m|idle_loop")).unwrap();
        builder.add_frame(frame("1|2|m|caller")).unwrap();
        builder.add_frame(frame("1|1|m|crasher")).unwrap();
        let report = builder.finish().unwrap();
        assert_eq!(report.signature.as_deref(), Some("crasher"));
    }

    #[test]
    fn signature_falls_back_to_first_frame() {
        let mut builder = ReportBuilder::new("u");
        builder.add_frame(frame("0|3|libc.so|||||")).unwrap();
        builder.add_frame(frame("0|1|libxul.so||||0x10")).unwrap();
        let report = builder.finish().unwrap();
        assert_eq!(report.signature.as_deref(), Some("libxul.so@0x10"));
    }

    #[test]
    fn explicit_signature_wins_and_empty_report_has_none() {
        let mut builder = ReportBuilder::new("u");
        builder.with_signature("custom").unwrap();
        builder.add_frame(frame("0|0|m|f")).unwrap();
        assert_eq!(builder.finish().unwrap().signature.as_deref(), Some("custom"));

        let mut empty = ReportBuilder::new("v");
        assert_eq!(empty.finish().unwrap().signature, None);
    }

    #[test]
    fn metadata_is_copied_onto_the_report() {
        let mut builder = ReportBuilder::new("u");
        builder
            .with_metadata(SubmissionMetadata {
                product: Some("Firefox".to_string()),
                version: Some("3.0".to_string()),
                install_age: Some(120),
                ..SubmissionMetadata::default()
            })
            .unwrap();
        let report = builder.finish().unwrap();
        assert_eq!(report.product.as_deref(), Some("Firefox"));
        assert_eq!(report.version.as_deref(), Some("3.0"));
        assert_eq!(report.install_age, Some(120));
        assert_eq!(report.build, None);
    }
}
