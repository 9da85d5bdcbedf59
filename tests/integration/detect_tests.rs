//! Format detection tests.
//!
//! Detection is exercised directly through the driver so each refusal can
//! be checked for its precise error, and through `Slide::open` where all
//! refusals collapse into an unrecognized-format error.

use std::path::Path;

use optra_wsi::format::{FormatDriver, OptraDriver};
use optra_wsi::io::FileRangeReader;
use optra_wsi::tiff::TiffFile;
use optra_wsi::{FormatError, Slide};

use super::test_utils::{pyramid_specs, write_fixture, DirSpec};

async fn detect_at(path: &Path) -> Result<(), FormatError> {
    let reader = FileRangeReader::open(path).unwrap();
    let tiff = TiffFile::parse(&reader).await.ok();
    OptraDriver
        .detect(&path.display().to_string(), tiff.as_ref(), &reader)
        .await
}

#[tokio::test]
async fn test_detect_accepts_well_formed_container() {
    let path = write_fixture("detect-ok", &pyramid_specs());
    detect_at(&path).await.unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_is_repeatable() {
    // Detection keeps no state, so probing the same file again must give
    // the same answer.
    let path = write_fixture("detect-repeat", &pyramid_specs());
    detect_at(&path).await.unwrap();
    detect_at(&path).await.unwrap();

    let reader = FileRangeReader::open(&path).unwrap();
    let tiff = TiffFile::parse(&reader).await.ok();
    let name = path.display().to_string();
    OptraDriver.detect(&name, tiff.as_ref(), &reader).await.unwrap();
    OptraDriver.detect(&name, tiff.as_ref(), &reader).await.unwrap();

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_rejects_non_tiff() {
    let path = std::env::temp_dir().join(format!(
        "optra-wsi-it-{}-detect-not-tiff.bin",
        std::process::id()
    ));
    std::fs::write(&path, b"this is not a tiff container").unwrap();

    let err = detect_at(&path).await.unwrap_err();
    assert!(matches!(err, FormatError::NotTiff));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_rejects_untiled_directory_zero() {
    let specs = vec![DirSpec::full(800, 600)
        .untiled()
        .with_xml(super::test_utils::scaninfo_packet())];
    let path = write_fixture("detect-untiled", &specs);

    let err = detect_at(&path).await.unwrap_err();
    assert!(matches!(err, FormatError::NotTiled));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_rejects_missing_metadata_packet() {
    let specs = vec![DirSpec::full(800, 600)];
    let path = write_fixture("detect-no-packet", &specs);

    let err = detect_at(&path).await.unwrap_err();
    assert!(matches!(err, FormatError::MissingMetadata));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_rejects_packet_without_marker() {
    let specs = vec![DirSpec::full(800, 600).with_xml(b"<Metadata Vendor=\"other\"/>".to_vec())];
    let path = write_fixture("detect-no-marker", &specs);

    let err = detect_at(&path).await.unwrap_err();
    assert!(matches!(err, FormatError::MarkerNotFound { .. }));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_detect_rejects_wrong_root_even_with_marker() {
    // The marker substring appears as an attribute, so the cheap pre-check
    // passes and the full parse has to refuse the document.
    let specs = vec![DirSpec::full(800, 600).with_xml(b"<Metadata ScanInfo=\"yes\"/>".to_vec())];
    let path = write_fixture("detect-wrong-root", &specs);

    let err = detect_at(&path).await.unwrap_err();
    assert!(matches!(
        err,
        FormatError::UnexpectedXmlRoot { found } if found == "Metadata"
    ));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_open_unrecognized_format() {
    let path = std::env::temp_dir().join(format!(
        "optra-wsi-it-{}-open-unrecognized.bin",
        std::process::id()
    ));
    std::fs::write(&path, b"garbage bytes").unwrap();

    let err = Slide::open(&path).await.unwrap_err();
    assert!(matches!(err, FormatError::UnrecognizedFormat));
    std::fs::remove_file(&path).unwrap();
}
