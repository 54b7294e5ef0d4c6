//! Frame name matching (spec.md §4.6 "Frame matching").
//!
//! Grounded on
//! `original_source/.../orchestrator/frame_executor.py::_find_frame_by_name`:
//! normalize both sides (strip "frame"/"-"/"_", lowercase), then accept a
//! frame-id match, a frame-name match, or a substring match, in that
//! order.

use crate::frames::Frame;

fn normalize(raw: &str) -> String {
    raw.to_ascii_lowercase().replace("frame", "").replace(['-', '_'], "")
}

/// Find the loaded frame whose id or name matches `hint` under the
/// spec's normalization rule. Tries an exact id/name match first, then
/// falls back to a substring match either direction.
pub fn find_frame_by_name<'a>(frames: &'a [std::sync::Arc<dyn Frame>], hint: &str) -> Option<&'a std::sync::Arc<dyn Frame>> {
    let needle = normalize(hint);
    if needle.is_empty() {
        return None;
    }

    if let Some(found) = frames.iter().find(|f| normalize(&f.metadata().frame_id) == needle) {
        return Some(found);
    }
    if let Some(found) = frames.iter().find(|f| normalize(&f.metadata().name) == needle) {
        return Some(found);
    }
    frames.iter().find(|f| {
        let id = normalize(&f.metadata().frame_id);
        let name = normalize(&f.metadata().name);
        id.contains(&needle) || needle.contains(&id) || name.contains(&needle) || needle.contains(&name)
    })
}

/// Resolve `selected_frames` (classification's hints) against the loaded
/// frame set. Per spec.md §4.6: a hint that matches nothing is dropped
/// with a warning recorded by the caller; if *none* of the hints resolve
/// to a frame and the hint list was non-empty, the caller falls back to
/// running every loaded frame.
pub fn resolve_selected_frames<'a>(
    frames: &'a [std::sync::Arc<dyn Frame>],
    selected: &[String],
) -> (Vec<&'a std::sync::Arc<dyn Frame>>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut unmatched = Vec::new();
    for hint in selected {
        match find_frame_by_name(frames, hint) {
            Some(frame) => resolved.push(frame),
            None => unmatched.push(hint.clone()),
        }
    }
    (resolved, unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::Result;
    use crate::core::model::{CodeFile, FrameResult};
    use crate::frames::{FrameMetadata, FrameScope};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Stub(FrameMetadata);

    #[async_trait]
    impl Frame for Stub {
        fn metadata(&self) -> &FrameMetadata {
            &self.0
        }
        async fn execute(&self, _file: &CodeFile) -> Result<FrameResult> {
            unreachable!()
        }
    }

    fn meta(frame_id: &str, name: &str) -> FrameMetadata {
        FrameMetadata {
            frame_id: frame_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            category: String::new(),
            priority: 0,
            scope: FrameScope::FileLevel,
            is_blocker: false,
            version: "1".to_string(),
            author: "test".to_string(),
            applicability: vec![],
        }
    }

    #[test]
    fn matches_by_frame_id() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Stub(meta("security", "Security")))];
        assert!(find_frame_by_name(&frames, "security").is_some());
    }

    #[test]
    fn matches_ignoring_frame_suffix_and_case() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Stub(meta("security", "Security")))];
        assert!(find_frame_by_name(&frames, "Security-Frame").is_some());
        assert!(find_frame_by_name(&frames, "SECURITY_FRAME").is_some());
    }

    #[test]
    fn matches_by_substring() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Stub(meta("security", "Security")))];
        assert!(find_frame_by_name(&frames, "sec").is_some());
    }

    #[test]
    fn unknown_hint_resolves_to_none() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Stub(meta("security", "Security")))];
        assert!(find_frame_by_name(&frames, "antipattern").is_none());
    }

    #[test]
    fn resolve_selected_frames_reports_unmatched() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Stub(meta("security", "Security")))];
        let (resolved, unmatched) =
            resolve_selected_frames(&frames, &["security".to_string(), "bogus".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(unmatched, vec!["bogus".to_string()]);
    }
}
