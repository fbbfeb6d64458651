//! Segment labelling – continuation tags and role-label visibility for the
//! segments one message was split into.

use crate::content::Role;
use crate::plan::SegmentTag;

/// Tags for a message split into `count` segments, in order.
pub fn label_segments(count: usize) -> Vec<SegmentTag> {
    match count {
        0 => Vec::new(),
        1 => vec![SegmentTag::Single],
        n => (0..n)
            .map(|i| match i {
                0 => SegmentTag::Start,
                i if i == n - 1 => SegmentTag::End,
                _ => SegmentTag::Middle,
            })
            .collect(),
    }
}

/// Whether a segment opened by a chunk shows the role label.
///
/// Only segments opened by the message's first chunk qualify; among those the
/// label shows when the role has not been shown yet, or again when the
/// continuation starts at the top of a fresh page.
pub fn should_show_role(role: Role, first_chunk: bool, page_top: bool, role_shown: bool) -> bool {
    role.label().is_some() && first_chunk && (page_top || !role_shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SegmentTag::*;

    #[test]
    fn tags_by_position() {
        assert!(label_segments(0).is_empty());
        assert_eq!(label_segments(1), vec![Single]);
        assert_eq!(label_segments(2), vec![Start, End]);
        assert_eq!(label_segments(3), vec![Start, Middle, End]);
        assert_eq!(label_segments(5), vec![Start, Middle, Middle, Middle, End]);
    }

    #[test]
    fn role_label_rules() {
        assert!(should_show_role(Role::User, true, false, false));
        assert!(should_show_role(Role::User, true, true, true));
        assert!(!should_show_role(Role::User, true, false, true));
        assert!(!should_show_role(Role::Assistant, false, true, false));
        assert!(!should_show_role(Role::Note, true, true, false));
    }
}
