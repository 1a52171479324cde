use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, StoreError};
use crate::parser::{self, ParsedPage};
use crate::pdf::DocumentReader;
use crate::record::{build_record, RecordKey, RunContext};
use crate::store::{CollectionStore, KeySet, RecoveryPolicy};

/// Outcome of one `process_document` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pages: usize,
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Drives reader → parser → record builder → store for each document.
pub struct Pipeline<R, S> {
    reader: R,
    primary: S,
    snapshot: S,
    policy: RecoveryPolicy,
    // Held across each whole read-modify-write of the primary collection.
    writer: Mutex<()>,
}

impl<R: DocumentReader, S: CollectionStore> Pipeline<R, S> {
    pub fn new(reader: R, primary: S, snapshot: S) -> Self {
        Pipeline {
            reader,
            primary,
            snapshot,
            policy: RecoveryPolicy::default(),
            writer: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[cfg(test)]
    pub fn primary(&self) -> &S {
        &self.primary
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    pub fn process_document(&self, path: &Path, ctx: &RunContext) -> Result<ProcessSummary, PipelineError> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        info!(
            path = ?path,
            batch_code = %ctx.batch_code,
            semester = %ctx.semester,
            session = %ctx.session,
            "Processing document"
        );

        let mut records = self
            .primary
            .load()
            .resolve(self.policy, &self.primary.location())?;
        let mut known = KeySet::from_records(&records);
        debug!(records = records.len(), keys = known.len(), "Loaded collection");

        // Nothing is built if the document cannot be opened.
        let pages = self.reader.read_pages(path)?;
        let doc_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let parsed: Vec<ParsedPage> = pages
            .par_iter()
            .map(|text| parser::parse_page(text))
            .collect();

        let mut summary = ProcessSummary {
            pages: pages.len(),
            ..Default::default()
        };
        for (idx, (page, text)) in parsed.into_iter().zip(&pages).enumerate() {
            let Ok(page_no) = u32::try_from(idx + 1) else {
                warn!(document = %doc_name, pages = pages.len(), "Page count exceeds u32, ignoring the rest");
                break;
            };
            if text.trim().is_empty() {
                debug!(page = page_no, "No text found on page");
            } else {
                debug!(page = page_no, averages = page.averages.len(), text = %text, "Page text");
            }

            let key = RecordKey::new(&doc_name, page_no, page.header.course.as_deref());
            if known.is_duplicate(&key) {
                info!(?key, "Skipping duplicate");
                summary.skipped += 1;
                continue;
            }

            known.insert(key);
            records.push(build_record(&doc_name, page_no, ctx, page));
            summary.added += 1;
        }

        self.primary.save(&records)?;
        summary.total = records.len();
        info!(
            document = %doc_name,
            added = summary.added,
            skipped = summary.skipped,
            total = summary.total,
            "Collection updated"
        );
        Ok(summary)
    }

    /// Copy the primary collection byte for byte to the snapshot location,
    /// or write an empty array if nothing has been stored yet.
    ///
    /// Failures are logged and reported as `None`; they never affect the
    /// primary collection.
    pub fn export_snapshot(&self) -> Option<usize> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        match self.copy_primary() {
            Ok(written) => {
                info!(location = %self.snapshot.location(), bytes = written, "Snapshot exported");
                Some(written)
            }
            Err(e) => {
                error!(location = %self.snapshot.location(), "Snapshot export failed: {}", e);
                None
            }
        }
    }

    fn copy_primary(&self) -> Result<usize, StoreError> {
        let bytes = self.primary.read_raw()?.unwrap_or_else(|| b"[]".to_vec());
        self.snapshot.write_raw(&bytes)?;
        Ok(bytes.len())
    }
}
