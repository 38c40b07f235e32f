mod common;

use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use lens::encoder::prepare_image;
use lens::error::LensError;
use lens::{QueryInput, SearchRequestBuilder};

use common::{Fixture, HashEmbedder, put_mode};

fn text_query(text: &str) -> QueryInput {
    QueryInput::Text(text.to_string())
}

#[tokio::test]
async fn test_exact_text_match_ranks_first() {
    let fixture = Fixture::new(100);
    let service = fixture.service().await;

    let request = SearchRequestBuilder::new(text_query("item 42"))
        .top_k(5)
        .threshold(0.99)
        .build();
    let outcome = service.search(request).await.unwrap();

    assert!(outcome.hits.len() <= 5);
    assert_eq!(outcome.hits[0].image_id, "a42");
    assert!((outcome.hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(outcome.hits[0].brand_name.as_deref(), Some("Acme"));
    assert!(outcome.failed_chunks.is_empty());
}

#[tokio::test]
async fn test_results_respect_threshold_top_k_and_order() {
    let fixture = Fixture::new(100);
    let service = fixture.service().await;

    for (top_k, threshold) in [(10, -1.0), (50, 0.0), (100, 0.2), (3, -5.0)] {
        let request = SearchRequestBuilder::new(text_query("item 7"))
            .top_k(top_k)
            .threshold(threshold)
            .build();
        let hits = service.search(request).await.unwrap().hits;

        assert!(hits.len() as i64 <= top_k);
        assert!(hits.iter().all(|hit| hit.score >= threshold));
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }
}

#[tokio::test]
async fn test_threshold_above_one_is_empty() {
    let fixture = Fixture::new(20);
    let service = fixture.service().await;
    let request = SearchRequestBuilder::new(text_query("item 3"))
        .threshold(1.1)
        .build();
    let outcome = service.search(request).await.unwrap();
    assert!(outcome.hits.is_empty());
}

#[tokio::test]
async fn test_non_positive_top_k_is_empty() {
    let fixture = Fixture::new(20);
    let service = fixture.service().await;
    for top_k in [0, -1] {
        let request = SearchRequestBuilder::new(text_query("item 3"))
            .top_k(top_k)
            .build();
        assert!(service.search(request).await.unwrap().hits.is_empty());
    }
}

#[tokio::test]
async fn test_unknown_mode_fails_before_encoding() {
    let fixture = Fixture::new(10);
    let service = fixture.service().await;

    for mode in ["nonexistent", "structure"] {
        let request = SearchRequestBuilder::new(text_query("item 1"))
            .mode(mode)
            .build();
        let err = service.search(request).await.unwrap_err();
        assert!(matches!(err, LensError::IndexNotFound(_)));
    }
    assert_eq!(fixture.embedder.calls(), 0);
}

#[tokio::test]
async fn test_candidates_without_metadata_are_dropped() {
    let fixture = Fixture::new(10);
    fixture.metadata.remove("a4");
    let service = fixture.service().await;

    let request = SearchRequestBuilder::new(text_query("item 4"))
        .threshold(-1.0)
        .top_k(10)
        .build();
    let outcome = service.search(request).await.unwrap();

    assert_eq!(outcome.hits.len(), 9);
    assert!(outcome.hits.iter().all(|hit| hit.image_id != "a4"));
    assert!(outcome.failed_chunks.is_empty());
}

#[tokio::test]
async fn test_failed_metadata_chunk_yields_partial_results() {
    let fixture = Fixture::new(120);
    fixture.metadata.fail_on("a42");
    let service = fixture.service().await;

    let request = SearchRequestBuilder::new(text_query("item 42"))
        .threshold(-1.0)
        .top_k(120)
        .build();
    let outcome = service.search(request).await.unwrap();

    // Candidates are ranked, so a42 leads the first chunk of 50, which fails.
    assert_eq!(outcome.failed_chunks.len(), 1);
    assert_eq!(outcome.failed_chunks[0].ids.len(), 50);
    assert_eq!(outcome.hits.len(), 70);
    assert!(outcome.hits.iter().all(|hit| hit.image_id != "a42"));
    assert_eq!(fixture.metadata.calls(), 3);
}

#[tokio::test]
async fn test_structure_mode_matches_desaturated_image() {
    let fixture = Fixture::new(5);
    let photo = RgbImage::from_fn(6, 6, |x, y| Rgb([(40 * x) as u8, (40 * y) as u8, 120]));
    let bytes = common::png(&photo);

    let gray = prepare_image(&bytes, true).unwrap();
    put_mode(
        &fixture.blobs,
        "structure",
        &[
            ("shape-match".to_string(), gray.as_raw().clone()),
            ("color-match".to_string(), photo.as_raw().clone()),
        ],
    );
    fixture.metadata.insert(common::record("shape-match"));
    fixture.metadata.insert(common::record("color-match"));
    let service = fixture.service().await;

    let request = SearchRequestBuilder::new(QueryInput::Image(bytes))
        .mode("structure")
        .threshold(0.999)
        .build();
    let hits = service.search(request).await.unwrap().hits;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].image_id, "shape-match");
}

#[tokio::test]
async fn test_malformed_image_is_feature_error() {
    let fixture = Fixture::new(5);
    let service = fixture.service().await;
    let request = SearchRequestBuilder::new(QueryInput::Image(b"GIF89a garbage".to_vec())).build();
    let err = service.search(request).await.unwrap_err();
    assert!(matches!(err, LensError::FeatureComputation { .. }));
}

#[tokio::test]
async fn test_slow_pipeline_times_out() {
    let mut fixture = Fixture::new(5);
    fixture.embedder = Arc::new(HashEmbedder::slow(Duration::from_millis(500)));
    let service = fixture
        .service()
        .await
        .with_timeout(Duration::from_millis(20));

    let request = SearchRequestBuilder::new(text_query("item 1")).build();
    let err = service.search(request).await.unwrap_err();
    assert!(matches!(err, LensError::Timeout(_)));
}

#[tokio::test]
async fn test_same_image_encodes_identically() {
    let fixture = Fixture::new(1);
    let service = fixture.service().await;
    let bytes = common::png(&RgbImage::from_pixel(4, 4, Rgb([9, 99, 199])));
    let mode = lens::IndexMode::new("color");

    let first = service.encoder().encode_image(&bytes, &mode).await.unwrap();
    let second = service.encoder().encode_image(&bytes, &mode).await.unwrap();
    assert_eq!(first, second);
    assert!(first.is_unit());
}
