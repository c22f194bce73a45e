use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::config::{Encoding, ExtractionConfig, FieldWidth};

/// Pull the sequence number out of one packet.
///
/// Returns `None` when the packet is too short to hold the whole field.
pub fn get_sequence(data: &[u8], config: &ExtractionConfig) -> Option<u64> {
    if data.len() < config.end() {
        return None;
    }
    let window = &data[config.offset..config.end()];
    Some(match config.encoding {
        Encoding::BigEndian => read_width::<BigEndian>(window, config.width),
        Encoding::LittleEndian => read_width::<LittleEndian>(window, config.width),
    })
}

fn read_width<B: ByteOrder>(window: &[u8], width: FieldWidth) -> u64 {
    match width {
        FieldWidth::U16 => B::read_u16(window) as u64,
        FieldWidth::U32 => B::read_u32(window) as u64,
        FieldWidth::U64 => B::read_u64(window),
    }
}
