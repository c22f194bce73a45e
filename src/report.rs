use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::GapAnalysis;
use crate::pipeline::ProducerStats;

/// Outcome of one analysis, serialized with the field names clients of the
/// service already rely on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "PacketURL")]
    pub packet_url: String,
    /// Number of sequence values collected, i.e. packets that were not skipped.
    #[serde(rename = "PacketLength")]
    pub packet_length: usize,
    #[serde(rename = "NumberOfGaps")]
    pub number_of_gaps: usize,
    #[serde(rename = "NumberOfOutOfOrder")]
    pub number_of_out_of_order: usize,
    #[serde(rename = "GapIndex")]
    pub gap_index: Vec<u64>,
    #[serde(rename = "GapMap")]
    pub gap_map: BTreeMap<u64, String>,
    #[serde(rename = "OutOfOrderSeq")]
    pub out_of_order_seq: Vec<u64>,
    #[serde(rename = "SkippedPackets", default)]
    pub skipped_packets: usize,
    #[serde(rename = "ReadErrors", default)]
    pub read_errors: usize,
    #[serde(rename = "CaptureStart", default, skip_serializing_if = "Option::is_none")]
    pub capture_start: Option<DateTime<Utc>>,
    #[serde(rename = "CaptureEnd", default, skip_serializing_if = "Option::is_none")]
    pub capture_end: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    pub fn new(packet_length: usize, analysis: GapAnalysis, stats: &ProducerStats) -> AnalysisResult {
        AnalysisResult {
            packet_url: String::new(),
            packet_length,
            number_of_gaps: analysis.gaps.len(),
            number_of_out_of_order: analysis.out_of_order.len(),
            gap_index: analysis.gap_index(),
            gap_map: analysis.gap_map(),
            out_of_order_seq: analysis.out_of_order,
            skipped_packets: stats.skipped_short,
            read_errors: stats.read_errors,
            capture_start: stats.first_timestamp,
            capture_end: stats.last_timestamp,
        }
    }

    pub fn with_url(mut self, url: &str) -> AnalysisResult {
        self.packet_url = url.to_string();
        self
    }
}
