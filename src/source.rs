use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use pcap_file::PcapReader;

use crate::error::{SeqError, SourceError};

/// A reader that keeps failing is treated as dead after this many errors in a row.
pub const MAX_CONSECUTIVE_ERRORS: usize = 1024;

/// One captured packet, as handed to the pipeline.
#[derive(Clone, Debug)]
pub struct RawPacket {
    pub data: Vec<u8>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawPacket {
    pub fn new(data: Vec<u8>) -> RawPacket {
        RawPacket { data, timestamp: None }
    }
}

/// Ordered supply of captured packets.
///
/// `Ok(None)` means the source is exhausted. `SourceError::Transient` skips
/// one record, `SourceError::Fatal` ends the request.
pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError>;
}

//
// PcapFileSource

/// Counts unreadable records in a row and decides when the reader is dead.
#[derive(Copy, Clone, Default, Debug)]
pub struct ErrorStreak {
    count: usize,
}

impl ErrorStreak {
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn record(&mut self, err: &dyn std::fmt::Display) -> SourceError {
        self.count += 1;
        if self.count >= MAX_CONSECUTIVE_ERRORS {
            SourceError::Fatal(format!("{} consecutive unreadable records, last: {}", self.count, err))
        } else {
            SourceError::Transient(err.to_string())
        }
    }
}

const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
const MAGIC_NANOS_SWAPPED: u32 = 0x4d3c_b2a1;

/// Packet time from the record header. The sub-second field holds
/// nanoseconds or microseconds depending on the file's magic number.
fn packet_time(ts_sec: u32, ts_frac: u32, nanos: bool) -> Option<DateTime<Utc>> {
    let nsec = if nanos { ts_frac } else { ts_frac.checked_mul(1000)? };
    Utc.timestamp_opt(ts_sec as i64, nsec).single()
}

pub struct PcapFileSource {
    reader: PcapReader<BufReader<File>>,
    nanos: bool,
    errors: ErrorStreak,
}

impl PcapFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PcapFileSource, SeqError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SeqError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
        PcapFileSource::from_file(file, &path.display().to_string())
    }

    /// Read from a handle the caller already holds. `label` only shows up in
    /// logs and errors.
    pub fn from_file(file: File, label: &str) -> Result<PcapFileSource, SeqError> {
        let reader = PcapReader::new(BufReader::new(file))
            .map_err(|e| SeqError::SourceUnavailable(format!("{}: {}", label, e)))?;
        let magic = reader.header.magic_number;
        let nanos = magic == MAGIC_NANOS || magic == MAGIC_NANOS_SWAPPED;
        log::info!("Opened capture {} (datalink {:?})", label, reader.header.datalink);
        Ok(PcapFileSource { reader, nanos, errors: ErrorStreak::default() })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        match self.reader.next() {
            None => Ok(None),
            Some(Ok(packet)) => {
                self.errors.reset();
                let timestamp = packet_time(packet.header.ts_sec, packet.header.ts_nsec, self.nanos);
                Ok(Some(RawPacket { data: packet.data.into_owned(), timestamp }))
            }
            Some(Err(e)) => Err(self.errors.record(&e)),
        }
    }
}

//
// VecSource

/// In-memory source, mostly for tests and for callers that already hold the
/// packets.
#[derive(Default)]
pub struct VecSource {
    items: VecDeque<Result<RawPacket, SourceError>>,
}

impl VecSource {
    pub fn from_packets<I: IntoIterator<Item = Vec<u8>>>(packets: I) -> VecSource {
        VecSource {
            items: packets.into_iter().map(|p| Ok(RawPacket::new(p))).collect(),
        }
    }

    pub fn push(&mut self, item: Result<RawPacket, SourceError>) {
        self.items.push_back(item);
    }
}

impl PacketSource for VecSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>, SourceError> {
        match self.items.pop_front() {
            None => Ok(None),
            Some(item) => item.map(Some),
        }
    }
}
