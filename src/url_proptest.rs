//! Property-based tests for URL and input handling.
//!
//! These tests use proptest to generate random paths and pinning attributes
//! and verify that parsing and rendering stay consistent.

#[cfg(test)]
mod proptest_tests {
    use crate::config::Settings;
    use crate::path::canon_path;
    use crate::registry::InputSchemes;
    use crate::url::{percent_decode, percent_encode_path, percent_encode_query, ParsedUrl};
    use proptest::prelude::*;

    /// Absolute paths without dot segments (which URL parsing normalises).
    fn abs_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9_+@ %-]{1,12}", 1..5)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    // ============================================================================
    // percent encoding property tests
    // ============================================================================

    proptest! {
        /// Property: decoding an encoded path gives the path back
        #[test]
        fn percent_encoding_round_trips(input in "\\PC*") {
            let encoded = percent_encode_path(&input);
            prop_assert_eq!(percent_decode(&encoded), Some(input));
        }

        /// Property: encoded paths only contain URL-safe ASCII
        #[test]
        fn percent_encoding_is_ascii(input in "\\PC*") {
            let encoded = percent_encode_path(&input);
            prop_assert!(encoded.is_ascii());
            prop_assert!(!encoded.contains(' '));
            prop_assert!(!encoded.contains('?'));
            prop_assert!(!encoded.contains('#'));
        }

        /// Property: query values come back verbatim, `+` and `&` included
        #[test]
        fn query_value_round_trips(value in "[a-zA-Z0-9+&=%# /-]{0,20}") {
            prop_assert!(!percent_encode_query(&value).contains('+'));

            let mut url = ParsedUrl {
                scheme: "path".to_string(),
                path: "/x".to_string(),
                ..Default::default()
            };
            url.query.insert("rev".to_string(), value);
            prop_assert_eq!(ParsedUrl::parse(&url.to_string()).unwrap(), url);
        }
    }

    // ============================================================================
    // path input round-trip property tests
    // ============================================================================

    proptest! {
        /// Property: a path URL survives parse -> render -> parse unchanged
        #[test]
        fn path_url_round_trips(
            path in abs_path(),
            rev in proptest::option::of("[0-9a-f]{40}"),
            rev_count in proptest::option::of(0u64..1_000_000),
            last_modified in proptest::option::of(0u64..4_000_000_000),
        ) {
            let schemes = InputSchemes::with_defaults(Settings::default());
            let mut url = ParsedUrl {
                scheme: "path".to_string(),
                authority: None,
                path: path.clone(),
                query: Default::default(),
                fragment: String::new(),
            };
            if let Some(rev) = &rev {
                url.query.insert("rev".to_string(), rev.clone());
            }
            if let Some(n) = rev_count {
                url.query.insert("revCount".to_string(), n.to_string());
            }
            if let Some(n) = last_modified {
                url.query.insert("lastModified".to_string(), n.to_string());
            }

            let input = schemes.input_from_url_str(&url.to_string()).unwrap();
            prop_assert_eq!(input.get_rev().unwrap(), rev.as_deref());
            prop_assert_eq!(input.get_rev_count().unwrap(), rev_count);
            prop_assert_eq!(input.get_last_modified().unwrap(), last_modified);

            let rendered = schemes.to_url(&input).unwrap().to_string();
            let reparsed = schemes.input_from_url_str(&rendered).unwrap();
            prop_assert_eq!(reparsed, input);
        }

        /// Property: canonicalisation is idempotent
        #[test]
        fn canon_path_is_idempotent(path in "(/[a-z.]{0,3}){0,6}") {
            let once = canon_path(&path);
            prop_assert_eq!(canon_path(&once), once.clone());
            prop_assert!(once.starts_with('/'));
        }
    }
}
