use crate::conn::SyncStream;
use std::io::{BufReader, Write};

#[derive(Debug)]
pub(crate) struct SyncTcpClient {
    stream: BufReader<Box<dyn SyncStream>>,
}

impl SyncTcpClient {
    pub fn new(stream: Box<dyn SyncStream>, buffer_size: usize) -> Self {
        Self {
            stream: BufReader::with_capacity(buffer_size, stream),
        }
    }

    // Requests are serialized completely before they are written, so writes bypass the buffer.
    pub fn writer(&mut self) -> &mut dyn Write {
        self.stream.get_mut()
    }

    pub fn reader(&mut self) -> &mut BufReader<Box<dyn SyncStream>> {
        &mut self.stream
    }
}
