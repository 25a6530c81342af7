//! Text-density sampling used to pick between the text and image presets.

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::engine::SourceDocument;
use crate::types::ContentProfile;

pub const SAMPLE_PAGES: usize = 3;
pub const TEXT_HEAVY_THRESHOLD: f64 = 20.0;

/// Classify a document from its first few pages.
///
/// Never fails: extraction errors are logged and the default profile is
/// returned, leaving the caller to count pages on its own.
pub fn analyze<D: SourceDocument + ?Sized>(doc: &D) -> ContentProfile {
    match sample(doc) {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Content analysis failed, assuming image-heavy: {:#}", e);
            ContentProfile::default()
        }
    }
}

fn sample<D: SourceDocument + ?Sized>(doc: &D) -> Result<ContentProfile> {
    let page_count = doc.page_count().context("page count")?;
    let sampled = page_count.min(SAMPLE_PAGES);
    if sampled == 0 {
        return Ok(ContentProfile::default());
    }

    let mut fragments = 0usize;
    for index in 0..sampled {
        let count = doc
            .page_text_fragments(index)
            .with_context(|| format!("text extraction on page {}", index))?
            .len();
        debug!("page {}: {} text fragments", index, count);
        fragments += count;
    }

    let average = fragments as f64 / sampled as f64;
    Ok(ContentProfile {
        is_text_heavy: average > TEXT_HEAVY_THRESHOLD,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PageSize, RenderedPage};
    use anyhow::bail;
    use std::cell::Cell;

    struct Pages {
        fragments: Vec<usize>,
        fail_on: Option<usize>,
        calls: Cell<usize>,
    }

    impl SourceDocument for Pages {
        fn page_count(&self) -> Result<usize> {
            Ok(self.fragments.len())
        }

        fn original_bytes(&self) -> &[u8] {
            &[]
        }

        fn page_text_fragments(&self, index: usize) -> Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_on == Some(index) {
                bail!("broken content stream");
            }
            Ok(vec!["word".to_string(); self.fragments[index]])
        }

        fn page_size(&self, _index: usize) -> Result<PageSize> {
            Ok(PageSize::LETTER)
        }

        fn render_page(&self, _index: usize, _scale: f32) -> Result<RenderedPage> {
            bail!("not rendered in analysis")
        }
    }

    fn pages(fragments: &[usize]) -> Pages {
        Pages {
            fragments: fragments.to_vec(),
            fail_on: None,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn samples_at_most_three_pages() {
        let doc = pages(&[30, 30, 30, 0, 0, 0, 0]);
        let profile = analyze(&doc);
        assert_eq!(doc.calls.get(), 3);
        assert!(profile.is_text_heavy);
        assert_eq!(profile.page_count, 7);
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!analyze(&pages(&[20, 20, 20])).is_text_heavy);
        assert!(analyze(&pages(&[21, 20, 20])).is_text_heavy);
    }

    #[test]
    fn short_documents_average_over_their_pages() {
        let profile = analyze(&pages(&[45]));
        assert!(profile.is_text_heavy);
        assert_eq!(profile.page_count, 1);

        assert!(!analyze(&pages(&[2, 5])).is_text_heavy);
    }

    #[test]
    fn empty_document_gets_default_profile() {
        assert_eq!(analyze(&pages(&[])), ContentProfile::default());
    }

    #[test]
    fn extraction_failure_falls_back_to_default() {
        let mut doc = pages(&[50, 50, 50]);
        doc.fail_on = Some(1);
        assert_eq!(analyze(&doc), ContentProfile::default());
    }
}
