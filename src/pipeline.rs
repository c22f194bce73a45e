//! Producer/consumer bridge between a packet source and the analyzer.
//!
//! One producer thread owns the source, extracts a sequence number from each
//! packet and sends it down an unbounded channel. The calling thread is the
//! single consumer and appends values in receipt order, so the collected log
//! always matches arrival order. Every retained value costs 8 bytes; callers
//! that need a ceiling set `max_retained`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::ExtractionConfig;
use crate::error::{SeqError, SourceError};
use crate::extract::get_sequence;
use crate::source::PacketSource;

/// How many extracted windows are echoed to the debug log.
const LOGGED_WINDOWS: usize = 10;

#[derive(Copy, Clone, Default, Debug)]
pub struct PipelineLimits<'a> {
    pub max_retained: Option<usize>,
    pub cancel: Option<&'a AtomicBool>,
}

/// Everything the producer learned besides the values themselves.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct ProducerStats {
    pub packets_read: usize,
    pub skipped_short: usize,
    pub read_errors: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// The ordered sequence log plus producer bookkeeping.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Collected {
    pub values: Vec<u64>,
    pub stats: ProducerStats,
}

pub fn collect<S>(config: &ExtractionConfig, source: S, limits: PipelineLimits<'_>) -> Result<Collected, SeqError>
where
    S: PacketSource + Send,
{
    let (tx, rx) = unbounded::<u64>();
    thread::scope(|s| {
        let producer = thread::Builder::new()
            .name("seqgap-producer".into())
            .spawn_scoped(s, move || produce(source, config, tx, limits.cancel))
            .map_err(|e| SeqError::Fatal(format!("spawn producer thread: {e}")))?;

        let consumed = consume(&rx, limits.max_retained);
        // Once the receiver is gone the producer's next send fails and it stops.
        drop(rx);

        let produced = producer
            .join()
            .map_err(|_| SeqError::Fatal("producer thread panicked".to_string()))?;
        let values = consumed?;
        let stats = produced?;
        log::info!(
            "Collected {} sequence values from {} packets ({} short, {} unreadable)",
            values.len(),
            stats.packets_read,
            stats.skipped_short,
            stats.read_errors
        );
        Ok(Collected { values, stats })
    })
}

fn produce<S: PacketSource>(
    mut source: S,
    config: &ExtractionConfig,
    tx: Sender<u64>,
    cancel: Option<&AtomicBool>,
) -> Result<ProducerStats, SeqError> {
    let mut stats = ProducerStats::default();
    loop {
        if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
            return Err(SeqError::Cancelled);
        }
        let packet = match source.next_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(SourceError::Transient(e)) => {
                log::warn!("Error: {}", e);
                stats.read_errors += 1;
                continue;
            }
            Err(SourceError::Fatal(e)) => return Err(SeqError::SourceUnavailable(e)),
        };

        let index = stats.packets_read;
        stats.packets_read += 1;
        if packet.timestamp.is_some() {
            if stats.first_timestamp.is_none() {
                stats.first_timestamp = packet.timestamp;
            }
            stats.last_timestamp = packet.timestamp;
        }

        let seq = match get_sequence(&packet.data, config) {
            Some(seq) => seq,
            None => {
                log::warn!("Ignoring packet smaller than start offset + length at index {}", index);
                stats.skipped_short += 1;
                continue;
            }
        };
        if index < LOGGED_WINDOWS {
            log::debug!("packet {} window {:?} -> {}", index, &packet.data[config.offset..config.end()], seq);
        }
        if tx.send(seq).is_err() {
            log::debug!("consumer went away, stopping producer at packet {}", index);
            break;
        }
    }
    Ok(stats)
}

fn consume(rx: &Receiver<u64>, max_retained: Option<usize>) -> Result<Vec<u64>, SeqError> {
    let mut hold = Vec::new();
    for seq in rx.iter() {
        if let Some(limit) = max_retained {
            if hold.len() >= limit {
                return Err(SeqError::RetainedOverflow { limit });
            }
        }
        hold.push(seq);
    }
    Ok(hold)
}
