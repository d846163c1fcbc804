//! Receiver side of a bulk transfer: reassembles segments arriving out of
//! order, ACKing each as it comes in.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::RdftError;

/// Reassembly state for one in-progress upload.
#[derive(Debug)]
pub struct UploadHandler {
    segments: HashMap<u32, Bytes>,
    segments_amount: u32,
}

/// What happened as a result of feeding one segment to an [`UploadHandler`].
#[derive(Debug)]
pub enum SegmentOutcome {
    /// More segments are still expected.
    Pending,
    /// The transfer is complete; here is the reassembled payload.
    Complete(Vec<u8>),
}

impl UploadHandler {
    /// Starts a new reassembly buffer expecting `segments_amount` segments.
    #[must_use]
    pub fn new(segments_amount: u32) -> Self {
        Self {
            segments: HashMap::new(),
            segments_amount,
        }
    }

    /// Accepts a segment. The caller ACKs `segment_id` regardless of the
    /// return value, including for duplicates — see the module docs.
    pub fn on_segment(&mut self, segment_id: u32, payload: Bytes) -> Result<SegmentOutcome, RdftError> {
        if segment_id >= self.segments_amount {
            return Err(RdftError::MalformedPacket(rdft_proto::MalformedPacket::SegmentIdOutOfRange {
                segment_id,
                segments_amount: self.segments_amount,
            }));
        }

        self.segments.entry(segment_id).or_insert(payload);

        if self.segments.len() as u32 == self.segments_amount {
            let mut ids: Vec<u32> = self.segments.keys().copied().collect();
            ids.sort_unstable();
            let mut out = Vec::new();
            for id in ids {
                out.extend_from_slice(&self.segments[&id]);
            }
            Ok(SegmentOutcome::Complete(out))
        } else {
            Ok(SegmentOutcome::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_once_all_segments_arrive_in_any_order() {
        let mut handler = UploadHandler::new(4);
        for id in [2, 0, 3, 1] {
            let chunk = Bytes::from(vec![b'a' + id as u8]);
            let outcome = handler.on_segment(id, chunk).unwrap();
            if id == 1 {
                match outcome {
                    SegmentOutcome::Complete(payload) => {
                        assert_eq!(payload, b"abcd");
                    }
                    SegmentOutcome::Pending => panic!("expected completion on last segment"),
                }
            } else {
                assert!(matches!(outcome, SegmentOutcome::Pending));
            }
        }
    }

    #[test]
    fn duplicate_segment_does_not_advance_state_twice() {
        let mut handler = UploadHandler::new(1);
        assert!(matches!(
            handler.on_segment(0, Bytes::from_static(b"x")).unwrap(),
            SegmentOutcome::Complete(_)
        ));
        // Re-delivering segment 0 after completion should be handled by the
        // registry (it no longer routes to this handler); at this layer we
        // only guarantee the map itself stays consistent.
        assert_eq!(handler.segments.len(), 1);
    }

    #[test]
    fn rejects_segment_id_at_or_above_segments_amount() {
        let mut handler = UploadHandler::new(2);
        let err = handler.on_segment(2, Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, RdftError::MalformedPacket(_)));
    }
}
