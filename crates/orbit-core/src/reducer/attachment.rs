//! Attachment reference state transitions.

use crate::event::{AttachmentIngestData, Event};
use crate::model::AttachmentReference;

/// Register an attachment. Re-ingesting a known attachment is a no-op.
pub(super) fn ingest(
    existing: Option<&AttachmentReference>,
    event: &Event,
    data: &AttachmentIngestData,
) -> AttachmentReference {
    existing.cloned().unwrap_or_else(|| AttachmentReference {
        id: event.entity_id.clone(),
        created_at_timestamp_millis: event.timestamp_millis,
        mime_type: data.mime_type,
    })
}
