use std::sync::Arc;

use tracing::trace;
use zani_core::config::ZaniConfig;

use crate::draft::Draft;
use crate::error::RenderError;
use crate::resolver::AttachmentResolver;
use crate::stages::{
    AssistantMentionStage, AttachmentStage, EmphasisStage, ImageStage, LinkStage, MentionStage,
};
use crate::store::AttachmentStore;
use crate::types::FormattedContent;

/// One rewrite step of the rendering pipeline.
///
/// Stages are applied in sequence to the same [`Draft`]; each one sees the
/// text exactly as the previous one left it.
pub trait Stage: Send + Sync {
    /// Stable identifier, used in logs and to assert ordering in tests.
    fn name(&self) -> &'static str;

    fn apply(&self, draft: &mut Draft);
}

/// An ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The standard message pipeline. Order matters:
    ///
    /// 1. attachments (file names must not reach any other stage)
    /// 2. images (before links, or the image url would become a link)
    /// 3. links
    /// 4. assistant mention (before mentions, which would claim it otherwise)
    /// 5. mentions and channel references
    /// 6. emphasis
    pub fn standard(
        assistant_name: &str,
        attachment_marker: &str,
        resolver: AttachmentResolver,
    ) -> Result<Self, RenderError> {
        Ok(Self::new(vec![
            Box::new(AttachmentStage::new(attachment_marker, resolver)?),
            Box::new(ImageStage),
            Box::new(LinkStage),
            Box::new(AssistantMentionStage::new(assistant_name)),
            Box::new(MentionStage::new(assistant_name)),
            Box::new(EmphasisStage),
        ]))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, content: &str) -> FormattedContent {
        let mut draft = Draft::new(content);
        for stage in &self.stages {
            stage.apply(&mut draft);
            trace!(stage = stage.name(), fragments = draft.fragments().len(), "stage applied");
        }
        draft.finish()
    }
}

/// Turns raw message text into renderable markup and its attachments.
///
/// Pure given the attachment store's contents: the same content always
/// renders the same way, and rendering never fails.
pub struct ContentTransformer {
    pipeline: Pipeline,
}

impl ContentTransformer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Build the standard pipeline from config.
    pub fn from_config(
        config: &ZaniConfig,
        store: Arc<dyn AttachmentStore>,
    ) -> Result<Self, RenderError> {
        let resolver = AttachmentResolver::new(store, config.render.placeholder_image_url.clone());
        let pipeline = Pipeline::standard(
            &config.assistant.name,
            &config.render.attachment_marker,
            resolver,
        )?;
        Ok(Self::new(pipeline))
    }

    pub fn transform(&self, content: &str) -> FormattedContent {
        self.pipeline.run(content)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
