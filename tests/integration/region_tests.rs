//! Region painting and associated-image decoding tests.

use optra_wsi::error::TileError;
use optra_wsi::Slide;

use super::test_utils::{
    pyramid_specs, scaninfo_packet, solid_jpeg_tile, write_fixture, DirSpec, BASE_FILL,
    LABEL_FILL, MID_FILL, SMALL_FILL,
};

// =============================================================================
// Region Reads
// =============================================================================

#[tokio::test]
async fn test_region_from_base_level() {
    let path = write_fixture("region-base", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(10, 10, 0, 32, 32).await.unwrap();
    assert_eq!(region.width(), 32);
    assert_eq!(region.height(), 32);
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(region.pixel(x, y), BASE_FILL);
        }
    }

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_region_clipped_at_image_edge() {
    // The base level is 1250x950 with 64-px tiles, so the edge tiles extend
    // past the image; pixels beyond it must come back fully transparent.
    let path = write_fixture("region-edge", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(1240, 940, 0, 20, 20).await.unwrap();
    for y in 0..20 {
        for x in 0..20 {
            let expected = if x < 10 && y < 10 { BASE_FILL } else { [0; 4] };
            assert_eq!(region.pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_region_with_negative_origin() {
    let path = write_fixture("region-neg", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(-16, -16, 0, 32, 32).await.unwrap();
    for y in 0..32 {
        for x in 0..32 {
            let expected = if x >= 16 && y >= 16 { BASE_FILL } else { [0; 4] };
            assert_eq!(region.pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_region_from_reduced_level() {
    let path = write_fixture("region-level1", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(0, 0, 1, 16, 16).await.unwrap();
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(region.pixel(x, y), MID_FILL);
        }
    }

    let region = slide.read_region(0, 0, 2, 16, 16).await.unwrap();
    assert_eq!(region.pixel(0, 0), SMALL_FILL);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_region_level_out_of_range() {
    let path = write_fixture("region-range", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let err = slide.read_region(0, 0, 5, 4, 4).await.unwrap_err();
    assert!(matches!(
        err,
        TileError::LevelOutOfRange { level: 5, count: 3 }
    ));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_empty_region() {
    let path = write_fixture("region-empty", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(0, 0, 0, 0, 0).await.unwrap();
    assert_eq!(region.data().len(), 0);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let path = write_fixture("region-repeat", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    // Second read serves from the decoded-tile cache; output must not drift.
    let first = slide.read_region(100, 100, 0, 48, 48).await.unwrap();
    let second = slide.read_region(100, 100, 0, 48, 48).await.unwrap();
    assert_eq!(first, second);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_region_from_jpeg_tiles() {
    let rgb = [180, 90, 30];
    let specs = vec![DirSpec::full(256, 192)
        .with_xml(scaninfo_packet())
        .with_jpeg_tiles(solid_jpeg_tile(rgb))];
    let path = write_fixture("region-jpeg", &specs);
    let slide = Slide::open(&path).await.unwrap();

    let region = slide.read_region(0, 0, 0, 32, 32).await.unwrap();
    for y in 0..32 {
        for x in 0..32 {
            let px = region.pixel(x, y);
            for c in 0..3 {
                let diff = (px[c] as i32 - rgb[c] as i32).abs();
                assert!(diff <= 8, "channel {c} off by {diff} at ({x}, {y})");
            }
            assert_eq!(px[3], 255);
        }
    }

    std::fs::remove_file(&path).unwrap();
}

// =============================================================================
// Associated Image Reads
// =============================================================================

#[tokio::test]
async fn test_read_label_image() {
    let path = write_fixture("assoc-label", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let label = slide.read_associated_image("label").await.unwrap().unwrap();
    assert_eq!(label.width(), 200);
    assert_eq!(label.height(), 150);
    assert_eq!(label.pixel(5, 5), LABEL_FILL);
    assert_eq!(label.pixel(199, 149), LABEL_FILL);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_read_thumbnail_image() {
    let path = write_fixture("assoc-thumb", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let thumb = slide
        .read_associated_image("thumbnail")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(thumb.width(), 640);
    assert_eq!(thumb.height(), 512);
    assert_eq!(thumb.pixel(320, 256), MID_FILL);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_read_unknown_associated_image() {
    let path = write_fixture("assoc-unknown", &pyramid_specs());
    let slide = Slide::open(&path).await.unwrap();

    let result = slide.read_associated_image("macro").await.unwrap();
    assert!(result.is_none());

    std::fs::remove_file(&path).unwrap();
}
