// Analysis module - per-sample signal pipeline
//
// Pure building blocks used by the engine for every orientation sample:
//
// 1. AngleExtractor: picks the tilt axis for the screen orientation and
//    corrects upside-down devices
// 2. SignalFilter: rejects spikes, smooths, clamps to the display range
// 3. Unit conversion: degrees / slope ratio / percent plus bubble position
//
// None of these types touch the sensor, the clock or the renderer.

pub mod extractor;
pub mod filter;
pub mod sample;
pub mod units;

pub use extractor::AngleExtractor;
pub use filter::{FilterOutcome, SignalFilter};
pub use sample::{OrientationMode, OrientationSample, SampleRejection};
pub use units::{convert, BubblePosition, DisplayValue, Reading, Unit};

#[cfg(test)]
mod tests;
