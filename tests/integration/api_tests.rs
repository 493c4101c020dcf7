//! API integration tests.
//!
//! Tests verify:
//! - Health and download routes
//! - Headers of whole-file responses
//! - Parameter sources (query string, JSON body) and overrides
//! - Covers of images, epubs, audio and video
//! - Every failure answers 404

use axum::http::{header, StatusCode};
use image::GenericImageView;

use super::test_utils::{
    body_bytes, decode, epub_bytes, get, header_str, jpeg_bytes, png_bytes, post_json, send,
    zip_bytes, RecordingCodecs, TestStore,
};

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let store = TestStore::new();
    let response = send(&store.router(), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

// =============================================================================
// Whole Files
// =============================================================================

#[tokio::test]
async fn test_download_text_file() {
    let store = TestStore::new();
    store.put("notes.txt", b"hello world\n");

    let response = send(&store.router(), get("/file/download/notes.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-type"),
        Some("text/plain;charset=UTF-8")
    );
    assert_eq!(header_str(&response, "content-length"), Some("12"));
    assert_eq!(header_str(&response, "accept-ranges"), Some("bytes"));
    assert_eq!(
        header_str(&response, "content-disposition"),
        Some("inline; filename*=utf-8''notes.txt")
    );
    assert_eq!(
        header_str(&response, "cache-control"),
        Some("public, max-age=60")
    );
    assert!(response.headers().get("x-cache-hit").is_none());
    assert_eq!(&body_bytes(response).await[..], b"hello world\n");
}

#[tokio::test]
async fn test_download_image_without_params_is_original() {
    let store = TestStore::new();
    let original = png_bytes(64, 32);
    store.put("pic.png", &original);

    let response = send(&store.router(), get("/file/download/pic.png")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), Some("image/png"));
    assert_eq!(body_bytes(response).await.to_vec(), original);
    assert!(store.cache_files().is_empty());
    assert_eq!(store.codecs.decode_count(), 0);
}

#[tokio::test]
async fn test_quality_hint_alone_serves_original() {
    let store = TestStore::new();
    let original = jpeg_bytes(300, 200);
    store.put("photo.jpg", &original);

    let response = send(&store.router(), get("/file/download/photo.jpg?quality=low")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.to_vec(), original);
    assert!(store.cache_files().is_empty());
}

#[tokio::test]
async fn test_import_download() {
    let store = TestStore::new();
    store.put_import("incoming.txt", b"imported");

    let router = store.router();
    let response = send(&router, get("/file/download/import/incoming.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"imported");

    // Import files are not visible through the store route.
    let response = send(&router, get("/file/download/incoming.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_name_override_and_encoding() {
    let store = TestStore::new();
    store.put("abc123.txt", b"x");

    let response = send(
        &store.router(),
        get("/file/download/abc123.txt?name=Quarterly%20R%C3%A9sum%C3%A9.txt"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-disposition"),
        Some("inline; filename*=utf-8''Quarterly%20R%C3%A9sum%C3%A9.txt")
    );
}

#[tokio::test]
async fn test_name_override_gains_extension() {
    let store = TestStore::new();
    store.put("f81d4fae.png", &png_bytes(8, 8));

    let response = send(&store.router(), get("/file/download/f81d4fae.png?name=holiday")).await;
    assert_eq!(
        header_str(&response, "content-disposition"),
        Some("inline; filename*=utf-8''holiday.png")
    );
}

#[tokio::test]
async fn test_mime_hint_refines_sniffed_type() {
    let store = TestStore::new();
    store.put("blob", &[0x01, 0x02, 0x00, 0xFF, 0xFE]);

    let router = store.router();
    let response = send(&router, get("/file/download/blob")).await;
    assert_eq!(
        header_str(&response, "content-type"),
        Some("application/octet-stream")
    );

    let response = send(&router, get("/file/download/blob?mime=audio/x-custom")).await;
    assert_eq!(header_str(&response, "content-type"), Some("audio/x-custom"));
}

#[tokio::test]
async fn test_json_body_parameters() {
    let store = TestStore::new();
    store.put("wide.png", &png_bytes(400, 200));

    let response = send(
        &store.router(),
        post_json("/file/download/wide.png", serde_json::json!({"side": 100})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-cache-hit"), Some("false"));
    let image = decode(&body_bytes(response).await);
    assert_eq!(image.dimensions(), (100, 50));
}

#[tokio::test]
async fn test_query_wins_over_body() {
    let store = TestStore::new();
    store.put("wide.png", &png_bytes(400, 200));

    let response = send(
        &store.router(),
        post_json(
            "/file/download/wide.png?side=200",
            serde_json::json!({"side": 100}),
        ),
    )
    .await;
    let image = decode(&body_bytes(response).await);
    assert_eq!(image.dimensions(), (200, 100));
}

#[tokio::test]
async fn test_scale_multiplies_side() {
    let store = TestStore::new();
    store.put("wide.png", &png_bytes(800, 400));

    let response = send(&store.router(), get("/file/download/wide.png?side=100&scale=2")).await;
    let image = decode(&body_bytes(response).await);
    assert_eq!(image.dimensions(), (200, 100));
}

// =============================================================================
// Zip Members
// =============================================================================

#[tokio::test]
async fn test_zip_member_download() {
    let store = TestStore::new();
    store.put(
        "bundle.zip",
        &zip_bytes(&[("docs/readme.txt", &b"inside the zip"[..]), ("other.bin", &[0u8; 10][..])]),
    );

    let response = send(&store.router(), get("/file/download/bundle.zip/docs/readme.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-disposition"),
        Some("inline; filename*=utf-8''readme.txt")
    );
    assert_eq!(header_str(&response, "content-length"), Some("14"));
    assert_eq!(&body_bytes(response).await[..], b"inside the zip");
}

#[tokio::test]
async fn test_zip_member_missing() {
    let store = TestStore::new();
    store.put("bundle.zip", &zip_bytes(&[("a.txt", &b"a"[..])]));

    let response = send(&store.router(), get("/file/download/bundle.zip/b.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zip_member_cover_is_not_found() {
    let store = TestStore::new();
    store.put("bundle.zip", &zip_bytes(&[("a.png", png_bytes(8, 8).as_slice())]));

    let response = send(&store.router(), get("/file/download/bundle.zip/a.png?cover=true")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Covers
// =============================================================================

#[tokio::test]
async fn test_image_cover_without_side_is_original() {
    let store = TestStore::new();
    let original = png_bytes(32, 32);
    store.put("icon.png", &original);

    let response = send(&store.router(), get("/file/download/icon.png?cover=1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.to_vec(), original);
}

#[tokio::test]
async fn test_epub_cover() {
    let store = TestStore::new();
    store.put("book.epub", &epub_bytes(&png_bytes(120, 180)));

    let router = store.router();
    let uri = "/file/download/book.epub?cover=true&mime=application/epub%2Bzip";
    let response = send(&router, super::test_utils::get(uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), Some("image/jpeg"));
    assert_eq!(header_str(&response, "x-cache-hit"), Some("false"));
    let image = decode(&body_bytes(response).await);
    assert_eq!(image.dimensions(), (120, 180));

    let response = send(&router, get(uri)).await;
    assert_eq!(header_str(&response, "x-cache-hit"), Some("true"));
    assert_eq!(store.codecs.decode_count(), 1);
}

#[tokio::test]
async fn test_audio_cover_inline() {
    let art = png_bytes(16, 16);
    let store = TestStore::with_codecs(RecordingCodecs::new().with_audio_art(art.clone()));
    store.put("song.mp3", b"ID3\x04\x00\x00\x00\x00\x00\x00not really audio");

    let response = send(&store.router(), get("/file/download/song.mp3?cover=true")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), Some("image/png"));
    assert!(response.headers().get("x-cache-hit").is_none());
    assert_eq!(body_bytes(response).await.to_vec(), art);
    assert!(store.cache_files().is_empty());
}

#[tokio::test]
async fn test_audio_without_art_is_not_found() {
    let store = TestStore::new();
    store.put("song.mp3", b"ID3\x04\x00\x00\x00\x00\x00\x00no art");

    let response = send(&store.router(), get("/file/download/song.mp3?cover=true")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_video_cover_is_bounded() {
    let store = TestStore::with_codecs(RecordingCodecs::new().with_video_frame(3840, 2160));
    store.put("clip.mp4", b"video bytes");

    let response = send(
        &store.router(),
        get("/file/download/clip.mp4?cover=true&mime=video/mp4"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), Some("image/jpeg"));
    let image = decode(&body_bytes(response).await);
    assert_eq!(image.dimensions(), (1920, 1080));
    assert_eq!(store.cache_files().len(), 1);
}

#[tokio::test]
async fn test_cover_of_text_is_not_found() {
    let store = TestStore::new();
    store.put("notes.txt", b"plain text");

    let response = send(&store.router(), get("/file/download/notes.txt?cover=true")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_missing_file_is_not_found_json() {
    let store = TestStore::new();
    let response = send(&store.router(), get("/file/download/nothing.png")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE.as_str()),
        Some("application/json")
    );
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_traversal_is_not_found() {
    let store = TestStore::new();
    store.put_import("secret.txt", b"secret");

    for uri in [
        "/file/download/..",
        "/file/download/..%2Fsecret.txt",
        "/file/download/a%5Cb.txt",
    ] {
        let response = send(&store.router(), get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_undecodable_image_falls_back_to_original() {
    let store = TestStore::new();
    let mut broken = png_bytes(64, 64);
    broken.truncate(60);
    store.put("broken.png", &broken);

    let response = send(&store.router(), get("/file/download/broken.png?side=16")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.to_vec(), broken);
}
