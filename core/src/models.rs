mod breadcrumb;
mod document;
mod node_context;
mod outline_node;
mod search_result;
mod sync_state;

pub use breadcrumb::{breadcrumb_string, Breadcrumb};
pub use document::Document;
pub use node_context::NodeContext;
pub use outline_node::{child_path, path_ids, OutlineNode, PATH_SEPARATOR};
pub use search_result::{SearchPage, SearchResult};
pub use sync_state::SyncState;

use chrono::{DateTime, Utc};

/// Convert a Unix timestamp in milliseconds to DateTime<Utc>
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Convert DateTime<Utc> to a Unix timestamp in milliseconds
pub fn datetime_to_millis(datetime: &DateTime<Utc>) -> i64 {
    datetime.timestamp_millis()
}

/// Link to a document, or to a node inside it. The root gets the bare
/// document link.
pub fn permalink(base_url: &str, document_id: &str, node: Option<&OutlineNode>) -> String {
    let base = base_url.trim_end_matches('/');
    match node {
        Some(node) if !node.is_root() => format!("{}/d/{}#z={}", base, document_id, node.id),
        _ => format!("{}/d/{}", base, document_id),
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round_trip() {
        let dt = millis_to_datetime(1_700_000_000_123);
        assert_eq!(datetime_to_millis(&dt), 1_700_000_000_123);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 40), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_permalink_omits_fragment_for_root() {
        let mut node = OutlineNode {
            id: "root".to_string(),
            document_id: "abc".to_string(),
            parent_id: None,
            content: String::new(),
            note: None,
            created: millis_to_datetime(0),
            modified: millis_to_datetime(0),
            sort_order: 0,
            depth: 0,
            path: "/root".to_string(),
            checked: None,
            color: None,
            child_count: 1,
        };
        assert_eq!(permalink("https://dynalist.io", "abc", Some(&node)), "https://dynalist.io/d/abc");
        assert_eq!(permalink("https://dynalist.io/", "abc", None), "https://dynalist.io/d/abc");

        node.id = "x1".to_string();
        node.parent_id = Some("root".to_string());
        assert_eq!(permalink("https://dynalist.io", "abc", Some(&node)), "https://dynalist.io/d/abc#z=x1");
    }
}
