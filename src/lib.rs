//! Sequence gap checking for packet captures.
//!
//! Each packet carries a fixed-width sequence number at a fixed offset. The
//! values are pulled out in arrival order and every break in the +1 run is
//! reported as a gap. Gaps whose missing value shows up elsewhere in the
//! capture are also reported as out of order.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub mod acquire;
pub mod analyze;
pub mod config;
pub mod diag;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod source;

pub use analyze::ReclassifyScope;
pub use config::{Encoding, ExtractionConfig, FieldWidth, PacketConfig};
pub use error::{SeqError, SourceError};
pub use report::AnalysisResult;
pub use source::{PacketSource, PcapFileSource, RawPacket, VecSource};

use pipeline::PipelineLimits;

/// Knobs that do not change what a gap is.
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    pub scope: ReclassifyScope,
    /// Fail with `RetainedOverflow` rather than hold more values than this.
    pub max_retained: Option<usize>,
    pub cancel: Option<Arc<AtomicBool>>,
    /// Sample process memory this many times after collection (0 disables).
    pub memory_samples: usize,
    pub memory_interval: Option<Duration>,
}

/// Analyze every packet `source` yields, with default options.
pub fn analyze<S>(config: &ExtractionConfig, source: S) -> Result<AnalysisResult, SeqError>
where
    S: PacketSource + Send,
{
    analyze_with(config, source, &AnalysisOptions::default())
}

pub fn analyze_with<S>(config: &ExtractionConfig, source: S, options: &AnalysisOptions) -> Result<AnalysisResult, SeqError>
where
    S: PacketSource + Send,
{
    let cancel = options.cancel.as_deref();
    let limits = PipelineLimits { max_retained: options.max_retained, cancel };
    let collected = pipeline::collect(config, source, limits)?;

    // Dropped without stop(): it samples on its own for its whole budget.
    let _sampler = if options.memory_samples > 0 {
        let interval = options.memory_interval.unwrap_or(diag::DEFAULT_INTERVAL);
        Some(diag::MemorySampler::start(interval, options.memory_samples)?)
    } else {
        None
    };

    let analysis = analyze::check_gaps(&collected.values, options.scope, cancel)?;
    Ok(AnalysisResult::new(collected.values.len(), analysis, &collected.stats))
}

/// Full request: validate, stage the capture unless told to reuse it, read it
/// and analyze it.
pub fn run(request: &PacketConfig, staging: &Path, options: &AnalysisOptions) -> Result<AnalysisResult, SeqError> {
    let config = request.validate()?;
    // Read a fresh download through its own handle; staging may be replaced
    // by a concurrent request at any point.
    let source = if request.reuse_staged() {
        PcapFileSource::open(staging)?
    } else {
        let file = acquire::download(&request.packet_url, staging)?;
        PcapFileSource::from_file(file, &request.packet_url)?
    };
    let result = analyze_with(&config, source, options)?;
    Ok(result.with_url(&request.packet_url))
}
