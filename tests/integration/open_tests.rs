//! Slide opening tests: pyramid construction, metadata and associated
//! images.

use sha2::{Digest, Sha256};

use optra_wsi::{FormatError, Slide};

use super::test_utils::{
    pyramid_specs, scaninfo_packet, write_fixture, DirSpec, LABEL_FILL, MID_FILL, SMALL_FILL,
    TILE,
};

// =============================================================================
// Pyramid Construction
// =============================================================================

#[tokio::test]
async fn test_open_builds_sorted_pyramid() {
    let path = write_fixture("open-pyramid", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(slide.level_count(), 3);
    assert_eq!(slide.dimensions(), (1250, 950));
    assert_eq!(slide.level_dimensions(0), Some((1250, 950)));
    assert_eq!(slide.level_dimensions(1), Some((640, 512)));
    assert_eq!(slide.level_dimensions(2), Some((320, 256)));
    assert_eq!(slide.level_dimensions(3), None);

    assert_eq!(slide.level_downsample(0), Some(1.0));
    assert_eq!(slide.level_downsample(1), Some(1250.0 / 640.0));
    assert_eq!(slide.level_downsample(2), Some(1250.0 / 320.0));

    assert_eq!(slide.best_level_for_downsample(1.0), 0);
    assert_eq!(slide.best_level_for_downsample(2.0), 1);
    assert_eq!(slide.best_level_for_downsample(100.0), 2);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_slide_debug_summarizes_pyramid() {
    let path = write_fixture("open-debug", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let repr = format!("{slide:?}");
    assert!(repr.contains("Slide"));
    assert!(repr.contains("1250"));
    assert!(repr.contains("level_count: 3"));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_open_orders_levels_by_width_not_file_order() {
    // Reduced directories arrive smaller-first; the pyramid must still come
    // out widest-first.
    let specs = vec![
        DirSpec::full(800, 600).with_xml(scaninfo_packet()),
        DirSpec::reduced(200, 150),
        DirSpec::reduced(400, 300),
    ];
    let path = write_fixture("open-order", &specs);
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(slide.level_count(), 3);
    assert_eq!(slide.level_dimensions(0), Some((800, 600)));
    assert_eq!(slide.level_dimensions(1), Some((400, 300)));
    assert_eq!(slide.level_dimensions(2), Some((200, 150)));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_open_skips_untiled_directories() {
    let specs = vec![
        DirSpec::full(640, 480).with_xml(scaninfo_packet()),
        DirSpec::reduced(320, 240).untiled(),
        DirSpec::reduced(160, 120),
    ];
    let path = write_fixture("open-untiled", &specs);
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(slide.level_count(), 2);
    assert_eq!(slide.level_dimensions(0), Some((640, 480)));
    assert_eq!(slide.level_dimensions(1), Some((160, 120)));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_open_rejects_unsupported_compression() {
    let specs = vec![
        DirSpec::full(640, 480).with_xml(scaninfo_packet()),
        DirSpec::reduced(320, 240).with_compression(5), // LZW
    ];
    let path = write_fixture("open-lzw", &specs);

    let err = Slide::open(&path).await.unwrap_err();
    assert!(matches!(
        err,
        FormatError::UnsupportedCompression { compression: 5, .. }
    ));

    std::fs::remove_file(&path).unwrap();
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_open_extracts_scaninfo_properties() {
    let path = write_fixture("open-props", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(slide.property("optra.Magnification"), Some("20"));
    assert_eq!(slide.property("optra.PixelResolution"), Some("0.25"));
    assert_eq!(slide.property("optra.ScannerModel"), Some("OS-15"));

    assert_eq!(slide.property("objective-power"), Some("20"));
    assert_eq!(slide.property("mpp-x"), Some("0.25"));
    assert_eq!(slide.property("mpp-y"), Some("0.25"));

    assert_eq!(
        slide.property("tiff.Software"),
        Some("OptraScan ImageViewer 2.1")
    );

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_quickhash_covers_smallest_level() {
    let path = write_fixture("open-hash", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    // Smallest level is 320x256: 5x4 tiles, all pointing at one stored
    // block of solid SMALL_FILL pixels.
    let mut block = Vec::new();
    for _ in 0..TILE * TILE {
        block.extend_from_slice(&SMALL_FILL);
    }
    let mut hasher = Sha256::new();
    for _ in 0..20 {
        hasher.update(&block);
    }
    let expected = hex::encode(hasher.finalize());

    assert_eq!(slide.property("quickhash-1"), Some(expected.as_str()));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_quickhash_skipped_when_over_budget() {
    let mut specs = pyramid_specs();
    // Claim 1 MB per tile on the smallest level: 20 MB total, well past the
    // fingerprint budget, so the hash must be skipped without reading.
    let last = specs.last_mut().unwrap();
    *last = last.clone().with_claimed_tile_bytes(1_000_000);

    let path = write_fixture("open-hash-skip", &specs);
    let slide = Slide::open(&path).await.unwrap();

    assert!(slide.property("quickhash-1").is_none());

    std::fs::remove_file(&path).unwrap();
}

// =============================================================================
// Associated Images
// =============================================================================

#[tokio::test]
async fn test_associated_images_registered() {
    let path = write_fixture("open-assoc", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(slide.associated_image_names(), vec!["label", "thumbnail"]);
    assert_eq!(slide.associated_image_dimensions("label"), Some((200, 150)));
    assert_eq!(
        slide.associated_image_dimensions("thumbnail"),
        Some((640, 512))
    );
    assert_eq!(slide.associated_image_dimensions("macro"), None);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_thumbnail_defaults_to_directory_zero() {
    // No reduced directory clears the minimum on both sides, so the
    // full-resolution directory doubles as the thumbnail.
    let specs = vec![
        DirSpec::full(800, 600).with_xml(scaninfo_packet()),
        DirSpec::reduced(400, 300),
    ];
    let path = write_fixture("open-thumb-default", &specs);
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(
        slide.associated_image_dimensions("thumbnail"),
        Some((800, 600))
    );

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_thumbnail_last_qualifying_directory_wins() {
    let specs = vec![
        DirSpec::full(1300, 1000).with_xml(scaninfo_packet()),
        DirSpec::reduced(800, 700).with_fill(MID_FILL),
        DirSpec::reduced(600, 560).with_fill(LABEL_FILL),
    ];
    let path = write_fixture("open-thumb-last", &specs);
    let slide = Slide::open(&path).await.unwrap();

    assert_eq!(
        slide.associated_image_dimensions("thumbnail"),
        Some((600, 560))
    );

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_missing_description_on_associated_fails() {
    let specs = vec![
        DirSpec::full(640, 480).with_xml(scaninfo_packet()),
        DirSpec::associated(200, 150, "label").without_description(),
    ];
    let path = write_fixture("open-no-desc", &specs);

    let err = Slide::open(&path).await.unwrap_err();
    assert!(matches!(
        err,
        FormatError::MissingField {
            tag: "ImageDescription",
            ..
        }
    ));

    std::fs::remove_file(&path).unwrap();
}
