// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session scan buffer.
//
// Documents are kept in capture order for the life of the session. Nothing is
// ever removed; the uploader reads snapshots and marks records uploaded one at
// a time. Clones share the same buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocId, ImageData, ScannedDocInfo};
use tracing::{debug, instrument};

/// Append-only, insertion-ordered collection of the session's documents.
#[derive(Debug, Clone, Default)]
pub struct ScanBuffer {
    docs: Arc<Mutex<Vec<ScannedDocInfo>>>,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScannedDocInfo>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a captured document. Refuses records without a front image or
    /// already marked uploaded.
    #[instrument(skip(self, doc), fields(doc = %doc.id))]
    pub fn append(&self, doc: ScannedDocInfo) -> Result<DocId> {
        if doc.front_image.is_empty() {
            return Err(CheckscanError::Buffer("document has no front image".into()));
        }
        if doc.uploaded {
            return Err(CheckscanError::Buffer("document is already uploaded".into()));
        }
        let id = doc.id;
        let mut docs = self.lock();
        docs.push(doc);
        debug!(len = docs.len(), "document buffered");
        Ok(id)
    }

    /// Copies of every record not yet uploaded, in capture order. Documents
    /// appended afterwards are picked up by the next snapshot.
    pub fn snapshot_unuploaded(&self) -> Vec<ScannedDocInfo> {
        self.lock().iter().filter(|d| !d.uploaded).cloned().collect()
    }

    /// Copies of every record, in capture order.
    pub fn snapshot(&self) -> Vec<ScannedDocInfo> {
        self.lock().clone()
    }

    /// Record that `id` has been fully committed to the ledger.
    pub fn mark_uploaded(&self, id: DocId) -> Result<()> {
        let mut docs = self.lock();
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| CheckscanError::Buffer(format!("document {id} is not in the buffer")))?;
        if doc.uploaded {
            return Err(CheckscanError::Buffer(format!("document {id} is already uploaded")));
        }
        doc.uploaded = true;
        Ok(())
    }

    /// Attach a back image to the most recent record (serial back scan).
    pub fn attach_back_to_last(&self, image: ImageData) -> Result<DocId> {
        if image.is_empty() {
            return Err(CheckscanError::Buffer("back image is empty".into()));
        }
        let mut docs = self.lock();
        let last = docs
            .last_mut()
            .ok_or_else(|| CheckscanError::Buffer("no document to attach a back image to".into()))?;
        if last.uploaded {
            return Err(CheckscanError::Buffer(format!("document {} is already uploaded", last.id)));
        }
        if last.back_image.is_some() {
            return Err(CheckscanError::Buffer(format!("document {} already has a back image", last.id)));
        }
        last.back_image = Some(image);
        debug!(doc = %last.id, "back image attached");
        Ok(last.id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn unuploaded_count(&self) -> usize {
        self.lock().iter().filter(|d| !d.uploaded).count()
    }

    pub fn has_unuploaded(&self) -> bool {
        self.lock().iter().any(|d| !d.uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkscan_core::DefinedValue;
    use uuid::Uuid;

    fn doc(front: &[u8]) -> ScannedDocInfo {
        let value = DefinedValue {
            id: 1,
            guid: Uuid::new_v4(),
            value: "Check".into(),
            description: None,
        };
        ScannedDocInfo::new(Arc::from(front), value.clone(), value).expect("doc")
    }

    #[test]
    fn snapshot_keeps_capture_order_and_skips_uploaded() {
        let buffer = ScanBuffer::new();
        let a = buffer.append(doc(&[1])).expect("a");
        let b = buffer.append(doc(&[2])).expect("b");
        let c = buffer.append(doc(&[3])).expect("c");

        buffer.mark_uploaded(a).expect("mark");
        let ids: Vec<DocId> = buffer.snapshot_unuploaded().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.unuploaded_count(), 2);
    }

    #[test]
    fn mark_uploaded_happens_once() {
        let buffer = ScanBuffer::new();
        let id = buffer.append(doc(&[1])).expect("append");
        buffer.mark_uploaded(id).expect("first");
        assert!(buffer.mark_uploaded(id).is_err());
        assert!(buffer.mark_uploaded(DocId::new()).is_err());
        assert!(!buffer.has_unuploaded());
    }

    #[test]
    fn appends_after_a_snapshot_wait_for_the_next_one() {
        let buffer = ScanBuffer::new();
        buffer.append(doc(&[1])).expect("a");
        let first = buffer.snapshot_unuploaded();
        buffer.append(doc(&[2])).expect("b");

        assert_eq!(first.len(), 1);
        assert_eq!(buffer.snapshot_unuploaded().len(), 2);
    }

    #[test]
    fn back_image_attaches_to_the_last_record_once() {
        let buffer = ScanBuffer::new();
        assert!(buffer.attach_back_to_last(Arc::from(&[9u8][..])).is_err());

        buffer.append(doc(&[1])).expect("a");
        let b = buffer.append(doc(&[2])).expect("b");
        assert_eq!(buffer.attach_back_to_last(Arc::from(&[9u8][..])).expect("attach"), b);
        assert!(buffer.attach_back_to_last(Arc::from(&[8u8][..])).is_err());

        let docs = buffer.snapshot();
        assert!(docs[0].back_image.is_none());
        assert_eq!(docs[1].back_image.as_deref(), Some(&[9u8][..]));
    }

    #[test]
    fn uploaded_records_are_not_mutated() {
        let buffer = ScanBuffer::new();
        let id = buffer.append(doc(&[1])).expect("append");
        buffer.mark_uploaded(id).expect("mark");
        assert!(buffer.attach_back_to_last(Arc::from(&[9u8][..])).is_err());
    }

    #[test]
    fn records_without_front_are_refused() {
        let buffer = ScanBuffer::new();
        let mut bad = doc(&[1]);
        bad.front_image = Arc::from(Vec::<u8>::new());
        assert!(buffer.append(bad).is_err());
        assert!(buffer.is_empty());
    }
}
