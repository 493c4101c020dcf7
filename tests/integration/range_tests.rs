//! Range request integration tests.
//!
//! Tests verify:
//! - The three `Range` forms on stored files
//! - Ranges addressing the uncompressed bytes of zip members
//! - Unsatisfiable and malformed ranges answer 404
//! - Ranged requests never trigger a transform

use axum::http::StatusCode;
use proptest::prelude::*;

use super::test_utils::{
    body_bytes, get, get_range, header_str, patterned, png_bytes, send, zip_bytes, TestStore,
};

// =============================================================================
// Stored Files
// =============================================================================

#[tokio::test]
async fn test_suffix_range() {
    let store = TestStore::new();
    let data = patterned(2000);
    store.put("data.bin", &data);

    let response = send(&store.router(), get_range("/file/download/data.bin", "bytes=-500")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "content-range"), Some("bytes 1500-1999/2000"));
    assert_eq!(header_str(&response, "content-length"), Some("500"));
    assert_eq!(header_str(&response, "accept-ranges"), Some("bytes"));
    assert_eq!(body_bytes(response).await.to_vec(), data[1500..].to_vec());
}

#[tokio::test]
async fn test_open_and_closed_ranges() {
    let store = TestStore::new();
    let data = patterned(2000);
    store.put("data.bin", &data);
    let router = store.router();

    let response = send(&router, get_range("/file/download/data.bin", "bytes=500-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "content-range"), Some("bytes 500-1999/2000"));
    assert_eq!(body_bytes(response).await.to_vec(), data[500..].to_vec());

    let response = send(&router, get_range("/file/download/data.bin", "bytes=500-999")).await;
    assert_eq!(header_str(&response, "content-range"), Some("bytes 500-999/2000"));
    assert_eq!(header_str(&response, "content-length"), Some("500"));
    assert_eq!(body_bytes(response).await.to_vec(), data[500..1000].to_vec());
}

#[tokio::test]
async fn test_end_past_resource_is_clamped() {
    let store = TestStore::new();
    let data = patterned(100);
    store.put("data.bin", &data);

    let response = send(&store.router(), get_range("/file/download/data.bin", "bytes=90-500")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "content-range"), Some("bytes 90-99/100"));
    assert_eq!(body_bytes(response).await.to_vec(), data[90..].to_vec());
}

#[tokio::test]
async fn test_unsatisfiable_and_malformed_ranges() {
    let store = TestStore::new();
    store.put("data.bin", &patterned(100));
    let router = store.router();

    for range in ["bytes=100-", "bytes=50-10", "bytes=-0", "bytes=abc", "items=0-1"] {
        let response = send(&router, get_range("/file/download/data.bin", range)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", range);
    }
}

#[tokio::test]
async fn test_range_does_not_transform() {
    let store = TestStore::new();
    let original = png_bytes(400, 200);
    store.put("photo.png", &original);
    let router = store.router();

    let response = send(&router, get_range("/file/download/photo.png?side=100", "bytes=0-9")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let total = original.len();
    assert_eq!(
        header_str(&response, "content-range").map(str::to_string),
        Some(format!("bytes 0-9/{}", total))
    );
    assert!(response.headers().get("x-cache-hit").is_none());
    assert_eq!(body_bytes(response).await.to_vec(), original[..10].to_vec());
    assert!(store.cache_files().is_empty());
    assert_eq!(store.codecs.decode_count(), 0);
}

#[tokio::test]
async fn test_range_uses_cached_artifact() {
    let store = TestStore::new();
    store.put("photo.png", &png_bytes(400, 200));
    let router = store.router();

    let full = send(&router, get("/file/download/photo.png?side=100")).await;
    let artifact = body_bytes(full).await;

    let response = send(&router, get_range("/file/download/photo.png?side=100", "bytes=-16")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "x-cache-hit"), Some("true"));
    assert_eq!(header_str(&response, "content-type"), Some("image/png"));
    let start = artifact.len() - 16;
    assert_eq!(
        header_str(&response, "content-range").map(str::to_string),
        Some(format!("bytes {}-{}/{}", start, artifact.len() - 1, artifact.len()))
    );
    assert_eq!(body_bytes(response).await, artifact.slice(start..));
}

// =============================================================================
// Zip Members
// =============================================================================

#[tokio::test]
async fn test_zip_member_range() {
    let store = TestStore::new();
    let member = patterned(10_000);
    store.put(
        "archive.zip",
        &zip_bytes(&[("first.txt", &b"abc"[..]), ("dir/payload.bin", member.as_slice())]),
    );

    let response = send(
        &store.router(),
        get_range("/file/download/archive.zip/dir/payload.bin", "bytes=100-199"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, "content-range"), Some("bytes 100-199/10000"));
    assert_eq!(header_str(&response, "content-length"), Some("100"));
    assert_eq!(
        header_str(&response, "content-disposition"),
        Some("inline; filename*=utf-8''payload.bin")
    );
    assert_eq!(body_bytes(response).await.to_vec(), member[100..200].to_vec());
}

#[tokio::test]
async fn test_zip_member_suffix_range() {
    let store = TestStore::new();
    let member = patterned(10_000);
    store.put("archive.zip", &zip_bytes(&[("payload.bin", member.as_slice())]));

    let response = send(
        &store.router(),
        get_range("/file/download/archive.zip/payload.bin", "bytes=-10"),
    )
    .await;
    assert_eq!(header_str(&response, "content-range"), Some("bytes 9990-9999/10000"));
    assert_eq!(body_bytes(response).await.to_vec(), member[9990..].to_vec());
}

#[tokio::test]
async fn test_zip_member_range_past_end() {
    let store = TestStore::new();
    store.put("archive.zip", &zip_bytes(&[("payload.bin", patterned(100).as_slice())]));

    let response = send(
        &store.router(),
        get_range("/file/download/archive.zip/payload.bin", "bytes=100-"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_range_body_matches_source(total in 1usize..5000, a_seed in any::<u64>(), len_seed in any::<u64>(), in_zip in any::<bool>()) {
        let a = (a_seed % total as u64) as usize;
        let len = 1 + (len_seed % (total - a) as u64) as usize;
        let data = patterned(total);

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (status, content_range, body) = runtime.block_on(async {
            let store = TestStore::new();
            let uri = if in_zip {
                store.put("archive.zip", &zip_bytes(&[("payload.bin", data.as_slice())]));
                "/file/download/archive.zip/payload.bin"
            } else {
                store.put("payload.bin", data.as_slice());
                "/file/download/payload.bin"
            };
            let range = format!("bytes={}-{}", a, a + len - 1);
            let response = send(&store.router(), get_range(uri, &range)).await;
            let status = response.status();
            let content_range = header_str(&response, "content-range").map(str::to_string);
            (status, content_range, body_bytes(response).await)
        });

        prop_assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        prop_assert_eq!(content_range, Some(format!("bytes {}-{}/{}", a, a + len - 1, total)));
        prop_assert_eq!(body.to_vec(), data[a..a + len].to_vec());
    }
}
