//! End-to-end analysis of capture files written to disk.

mod common;

use std::fs;
use std::io::BufWriter;

use chrono::{TimeZone, Utc};
use common::{be32, udp_packet, write_pcap, HEADER_LEN};
use pcap_file::PcapWriter;
use seqgap::{
    analyze, analyze_with, AnalysisOptions, Encoding, ExtractionConfig, FieldWidth, PacketConfig, PcapFileSource,
    ReclassifyScope, SeqError,
};

fn be32_at_payload() -> ExtractionConfig {
    ExtractionConfig::new(Encoding::BigEndian, HEADER_LEN, FieldWidth::U32).unwrap()
}

#[test]
fn contiguous_capture_has_no_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clean.pcap");
    let seqs: Vec<u32> = (1..=500).collect();
    write_pcap(&path, 1_600_000_000, &be32(&seqs));

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.packet_length, 500);
    assert_eq!(result.number_of_gaps, 0);
    assert_eq!(result.number_of_out_of_order, 0);
    assert!(result.gap_index.is_empty());
}

#[test]
fn reordered_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reordered.pcap");
    write_pcap(&path, 1_600_000_000, &be32(&[5, 6, 8, 7, 9]));

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.packet_length, 5);
    assert_eq!(result.number_of_gaps, 3);
    assert_eq!(result.gap_index, vec![7, 9, 8]);
    assert_eq!(result.gap_map.get(&7).map(String::as_str), Some("seq gap 2"));
    assert_eq!(result.gap_map.get(&9).map(String::as_str), Some("seq gap -1"));
    assert_eq!(result.number_of_out_of_order, 3);
    assert_eq!(result.out_of_order_seq, vec![7, 9, 8]);
}

#[test]
fn lost_packet_is_a_gap_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loss.pcap");
    write_pcap(&path, 1_600_000_000, &be32(&[100, 105]));

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.number_of_gaps, 1);
    assert_eq!(result.gap_index, vec![101]);
    assert_eq!(result.number_of_out_of_order, 0);
}

#[test]
fn short_packets_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.pcap");
    let mut packets = be32(&[1, 2]);
    packets.push(vec![0u8; HEADER_LEN + 3]);
    packets.extend(be32(&[3, 4]));
    write_pcap(&path, 1_600_000_000, &packets);

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.packet_length, 4);
    assert_eq!(result.skipped_packets, 1);
    assert_eq!(result.number_of_gaps, 0);
}

#[test]
fn little_endian_u64_and_u16() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("le.pcap");
    let seqs: [u64; 4] = [1 << 40, (1 << 40) + 1, (1 << 40) + 3, (1 << 40) + 4];
    let packets: Vec<Vec<u8>> = seqs.iter().map(|s| udp_packet(&s.to_le_bytes())).collect();
    write_pcap(&path, 1_600_000_000, &packets);

    let wide = ExtractionConfig::new(Encoding::LittleEndian, HEADER_LEN, FieldWidth::U64).unwrap();
    let result = analyze(&wide, PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.gap_index, vec![(1 << 40) + 2]);
    assert_eq!(result.gap_map.values().next().map(String::as_str), Some("seq gap 2"));

    // Reading only the low two bytes of the same field sees the same gap.
    let narrow = ExtractionConfig::new(Encoding::LittleEndian, HEADER_LEN, FieldWidth::U16).unwrap();
    let result = analyze(&narrow, PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.gap_index, vec![2]);
}

#[test]
fn capture_window_comes_from_packet_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("window.pcap");
    write_pcap(&path, 1_600_000_000, &be32(&[1, 2, 3]));

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.capture_start, Utc.timestamp_opt(1_600_000_000, 0).single());
    assert_eq!(result.capture_end, Utc.timestamp_opt(1_600_000_002, 0).single());
}

#[test]
fn capture_window_keeps_sub_second_part() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("subsec.pcap");
    let mut writer = PcapWriter::new(BufWriter::new(fs::File::create(&path).unwrap())).unwrap();
    for (i, p) in be32(&[1, 2]).iter().enumerate() {
        writer.write(1_600_000_000, 250_000 * (i as u32 + 1), p, p.len() as u32).unwrap();
    }
    drop(writer);

    let result = analyze(&be32_at_payload(), PcapFileSource::open(&path).unwrap()).unwrap();
    assert_eq!(result.capture_start, Utc.timestamp_opt(1_600_000_000, 250_000_000).single());
    assert_eq!(result.capture_end, Utc.timestamp_opt(1_600_000_000, 500_000_000).single());
}

#[test]
fn source_reads_from_held_handle_after_path_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("download.pcap");
    write_pcap(&path, 1_600_000_000, &be32(&[100, 105]));
    let held = fs::File::open(&path).unwrap();

    let replacement = dir.path().join("other.pcap");
    write_pcap(&replacement, 1_600_000_000, &be32(&[1, 2, 3]));
    fs::rename(&replacement, &path).unwrap();

    let source = PcapFileSource::from_file(held, "held capture").unwrap();
    let result = analyze(&be32_at_payload(), source).unwrap();
    assert_eq!(result.packet_length, 2);
    assert_eq!(result.gap_index, vec![101]);
}

#[test]
fn after_gap_scope_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scope.pcap");
    write_pcap(&path, 1_600_000_000, &be32(&[3, 1, 2, 4]));

    let options = AnalysisOptions { scope: ReclassifyScope::AfterGap, ..Default::default() };
    let result = analyze_with(&be32_at_payload(), PcapFileSource::open(&path).unwrap(), &options).unwrap();
    assert_eq!(result.gap_index, vec![4, 3]);
    assert_eq!(result.out_of_order_seq, vec![4]);
}

#[test]
fn retained_limit_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.pcap");
    let seqs: Vec<u32> = (0..100).collect();
    write_pcap(&path, 1_600_000_000, &be32(&seqs));

    let options = AnalysisOptions { max_retained: Some(50), ..Default::default() };
    let err = analyze_with(&be32_at_payload(), PcapFileSource::open(&path).unwrap(), &options).unwrap_err();
    assert!(matches!(err, SeqError::RetainedOverflow { limit: 50 }));
}

#[test]
fn run_reuses_staged_capture() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("download.pcap");
    write_pcap(&staging, 1_600_000_000, &be32(&[10, 11, 13]));

    let request = PacketConfig {
        encoding: "BigEndian".to_string(),
        start_offset: HEADER_LEN as i64,
        length: 4,
        packet_url: "https://example.invalid/capture.pcap".to_string(),
        read_local: Some(true),
    };
    let result = seqgap::run(&request, &staging, &AnalysisOptions::default()).unwrap();
    assert_eq!(result.packet_url, "https://example.invalid/capture.pcap");
    assert_eq!(result.gap_index, vec![12]);
}

#[test]
fn run_rejects_bad_config_first() {
    let request = PacketConfig {
        encoding: "MiddleEndian".to_string(),
        start_offset: 42,
        length: 4,
        packet_url: "https://example.invalid/capture.pcap".to_string(),
        read_local: Some(false),
    };
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("download.pcap");
    let err = seqgap::run(&request, &staging, &AnalysisOptions::default()).unwrap_err();
    assert!(matches!(err, SeqError::Config(_)));
    assert!(!staging.exists());
}

#[test]
fn missing_or_garbage_capture_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.pcap");
    assert!(matches!(PcapFileSource::open(&missing), Err(SeqError::SourceUnavailable(_))));

    let garbage = dir.path().join("garbage.pcap");
    fs::write(&garbage, b"this is not a capture file at all").unwrap();
    assert!(matches!(PcapFileSource::open(&garbage), Err(SeqError::SourceUnavailable(_))));
}
