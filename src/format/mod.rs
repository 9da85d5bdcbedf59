//! Format driver registry.
//!
//! Each vendor format implements [`FormatDriver`]; `Slide::open` probes
//! the registered drivers in order and the first one whose `detect`
//! accepts the file opens it.

pub mod optra;

pub use optra::OptraDriver;

use async_trait::async_trait;

use crate::error::FormatError;
use crate::io::{HandlePool, RangeReader};
use crate::slide::OpenedSlide;
use crate::tiff::TiffFile;

/// A whole-slide format driver.
#[async_trait]
pub trait FormatDriver: Send + Sync {
    /// Short driver name for logging.
    fn name(&self) -> &'static str;

    /// Vendor identifier, the namespace prefix of raw properties.
    fn vendor(&self) -> &'static str;

    /// Decide whether this driver can open the file.
    ///
    /// A pure predicate: no state may persist from it. `tiff` is `None`
    /// when the file did not parse as a TIFF container.
    async fn detect(
        &self,
        filename: &str,
        tiff: Option<&TiffFile>,
        reader: &dyn RangeReader,
    ) -> Result<(), FormatError>;

    /// Open a detected file, building the full pyramid, properties and
    /// associated images.
    ///
    /// Any error discards everything built so far; partially constructed
    /// state never escapes.
    async fn open(
        &self,
        filename: &str,
        tiff: &TiffFile,
        reader: &dyn RangeReader,
        pool: HandlePool,
    ) -> Result<OpenedSlide, FormatError>;
}

static DRIVERS: &[&dyn FormatDriver] = &[&OptraDriver];

/// All registered drivers, in probe order.
pub fn registered_drivers() -> impl Iterator<Item = &'static dyn FormatDriver> {
    DRIVERS.iter().copied()
}
