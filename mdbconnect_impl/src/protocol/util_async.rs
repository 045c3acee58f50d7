use crate::{protocol::reply::check_message_length, MdbResult};
use tokio::io::{AsyncRead, AsyncReadExt};

// Reads one complete message, including its header.
pub(crate) async fn read_message<R: AsyncRead + Unpin + ?Sized>(
    rdr: &mut R,
    max_message_size: usize,
) -> MdbResult<Vec<u8>> {
    let raw_length = rdr.read_i32_le().await?; // I4
    let length = check_message_length(raw_length, max_message_size)?;
    let mut message = vec![0_u8; length];
    message[0..4].copy_from_slice(&raw_length.to_le_bytes());
    rdr.read_exact(&mut message[4..]).await?;
    Ok(message)
}
