//! Property-based tests for the compression codec round-trip.
//!
//! For any tab list T, `decompress_tabs(compress_tabs(T))` must equal T
//! field for field; the same holds for whole sessions.

use std::collections::HashMap;

use proptest::prelude::*;

use tabvault::services::compression::{
    compress_session, compress_tabs, decompress_session, decompress_tabs,
};
use tabvault::types::session::Session;
use tabvault::types::tab::{ScrollPosition, TabRecord, UNGROUPED_TAB_GROUP};

// --- Arbitrary strategies for tab and session types ---

fn arb_scroll_position() -> impl Strategy<Value = ScrollPosition> {
    (0.0f64..1e6, 0.0f64..1e6).prop_map(|(x, y)| ScrollPosition {
        // Round to avoid f64 precision loss during JSON serialization roundtrip
        x: x.round(),
        y: y.round(),
    })
}

fn arb_form_data() -> impl Strategy<Value = HashMap<String, String>> {
    proptest::collection::hash_map("[a-z_]{1,12}", "[A-Za-z0-9 ]{0,30}", 0..4)
}

fn arb_tab() -> impl Strategy<Value = TabRecord> {
    (
        "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
        "https?://[a-z]{3,12}\\.[a-z]{2,5}/[a-z0-9/_-]{0,20}",
        "[A-Za-z0-9 ]{0,40}",
        any::<bool>(),
        proptest::option::of(arb_scroll_position()),
        proptest::option::of(arb_form_data()),
        -1i64..20,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(id, url, title, pinned, scroll, form, group_id, active, muted)| TabRecord {
                id,
                url,
                title,
                favicon: None,
                pinned,
                group_id: if group_id < 0 { UNGROUPED_TAB_GROUP } else { group_id },
                group_color: None,
                group_title: None,
                index: 0,
                active,
                muted,
                scroll_position: scroll,
                form_data: form,
            },
        )
}

fn arb_tabs() -> impl Strategy<Value = Vec<TabRecord>> {
    proptest::collection::vec(arb_tab(), 0..8).prop_map(|mut tabs| {
        for (i, tab) in tabs.iter_mut().enumerate() {
            tab.index = i;
        }
        tabs
    })
}

fn arb_session() -> impl Strategy<Value = Session> {
    (
        "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
        "[A-Za-z0-9 ]{1,40}",
        proptest::collection::vec("[a-z]{1,10}", 0..5),
        arb_tabs(),
        0i64..=4_102_444_800,
        1u32..100,
    )
        .prop_map(|(id, name, tags, tabs, created_at, version)| Session {
            id,
            name,
            description: None,
            tags,
            folder_id: None,
            created_at,
            updated_at: created_at,
            last_accessed_at: None,
            is_emergency: false,
            version,
            tabs,
            compressed_tabs: None,
            is_compressed: false,
        })
}

// **Property: tab list compression round-trip**
proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn tabs_compress_decompress_roundtrip(tabs in arb_tabs()) {
        let compressed = compress_tabs(&tabs).expect("compress_tabs should succeed");
        let restored = decompress_tabs(&compressed);
        prop_assert_eq!(restored, tabs, "decompressed tabs must equal the original");
    }

    #[test]
    fn session_compress_decompress_roundtrip(session in arb_session()) {
        let compressed = compress_session(&session).expect("compress_session should succeed");
        let restored = decompress_session(&compressed)
            .expect("decompress_session should return Some for valid input");
        prop_assert_eq!(restored, session, "decompressed session must equal the original");
    }

    // Corrupt input never panics and always degrades to empty/None.
    #[test]
    fn decompress_arbitrary_text_never_panics(garbage in "[ -~]{0,200}") {
        let _ = decompress_tabs(&garbage);
        let _ = decompress_session(&garbage);
    }
}
