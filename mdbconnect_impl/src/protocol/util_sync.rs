use crate::{protocol::reply::check_message_length, MdbResult};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

// Reads one complete message, including its header.
pub(crate) fn read_message(rdr: &mut dyn Read, max_message_size: usize) -> MdbResult<Vec<u8>> {
    let raw_length = rdr.read_i32::<LittleEndian>()?; // I4
    let length = check_message_length(raw_length, max_message_size)?;
    let mut message = vec![0_u8; length];
    message[0..4].copy_from_slice(&raw_length.to_le_bytes());
    rdr.read_exact(&mut message[4..])?;
    Ok(message)
}
