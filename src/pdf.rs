use std::path::Path;

use tracing::debug;

use crate::error::PipelineError;

/// Turns a document on disk into its pages' raw text, in page order.
pub trait DocumentReader: Send + Sync {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>, PipelineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>, PipelineError> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = lopdf::Document::load_mem(&bytes).map_err(|source| PipelineError::DocumentParse {
            path: path.to_path_buf(),
            source,
        })?;

        // get_pages is keyed by page number, so iteration is already in order.
        let pages: Vec<String> = doc
            .get_pages()
            .keys()
            .map(|n| doc.extract_text(&[*n]).unwrap_or_default())
            .collect();

        debug!(
            path = ?path,
            pages = pages.len(),
            chars = pages.iter().map(String::len).sum::<usize>(),
            "Extracted document text"
        );
        Ok(pages)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::build_pdf;
    use super::*;

    #[test]
    fn reads_every_page_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.pdf");
        std::fs::write(&path, build_pdf(&["Course: First", "Course: Second", "Course: Third"])).unwrap();

        let pages = PdfReader.read_pages(&path).unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("First"), "page 1 text: {:?}", pages[0]);
        assert!(pages[2].contains("Third"), "page 3 text: {:?}", pages[2]);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PdfReader.read_pages(Path::new("/nonexistent/eval.pdf")).unwrap_err();
        assert!(matches!(err, PipelineError::DocumentRead { .. }));
    }

    #[test]
    fn garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"this is not a valid pdf file").unwrap();
        let err = PdfReader.read_pages(&path).unwrap_err();
        assert!(matches!(err, PipelineError::DocumentParse { .. }));
    }
}
