use thiserror::Error;

/// Failures surfaced by the compression core.
///
/// Adapter failures arrive as `anyhow::Error` and are carried along so the
/// full context chain reaches the caller.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Failed to read page count: {reason:#}")]
    PageCount { reason: anyhow::Error },

    #[error("Failed to render page {page}: {reason:#}")]
    Render { page: usize, reason: anyhow::Error },

    #[error("Failed to encode page {page}: {reason:#}")]
    Encode { page: usize, reason: anyhow::Error },

    #[error("Failed to assemble output ({stage}): {reason:#}")]
    Assembly {
        stage: &'static str,
        reason: anyhow::Error,
    },

    #[error("Failed to build preview: {reason:#}")]
    Preview { reason: anyhow::Error },

    #[error("Projected {projected_dpi} DPI is below the {floor_dpi} DPI legibility floor")]
    Blocked { projected_dpi: u32, floor_dpi: u32 },
}

impl CompressError {
    pub(crate) fn assembly(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |reason| CompressError::Assembly { stage, reason }
    }
}
