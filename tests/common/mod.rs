//! Helpers for writing small capture files.

#![allow(dead_code)]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use pcap_file::PcapWriter;

/// Ethernet + IPv4 + UDP headers; the payload starts right after.
pub const HEADER_LEN: usize = 42;

/// A packet with `seq` as the first payload bytes.
pub fn udp_packet(seq: &[u8]) -> Vec<u8> {
    let mut p = vec![0u8; HEADER_LEN];
    p[12] = 0x08; // IPv4 ethertype
    p.extend_from_slice(seq);
    p.extend_from_slice(b"payload");
    p
}

pub fn be32(seqs: &[u32]) -> Vec<Vec<u8>> {
    seqs.iter().map(|s| udp_packet(&s.to_be_bytes())).collect()
}

/// Write `packets` to `path`, one second apart starting at `start_sec`.
pub fn write_pcap(path: &Path, start_sec: u32, packets: &[Vec<u8>]) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut writer = PcapWriter::new(file).unwrap();
    for (i, p) in packets.iter().enumerate() {
        writer.write(start_sec + i as u32, 0, p, p.len() as u32).unwrap();
    }
}
