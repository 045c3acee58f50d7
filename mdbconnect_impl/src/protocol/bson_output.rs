use crate::MdbResult;
use bson::Document;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

const ELEMENT_STRING: u8 = 0x02;
const ELEMENT_DOCUMENT: u8 = 0x03;
const ELEMENT_ARRAY: u8 = 0x04;
const ELEMENT_BOOLEAN: u8 = 0x08;

// Growable output buffer for wire messages.
//
// Besides the plain little-endian writers it can write the envelope of a command document
// element by element, so that encoders can mark a position, write a document, and rewind
// if a limit is exceeded. Lengths are backpatched when a document or array is closed.
#[derive(Debug, Default)]
pub(crate) struct BsonOutput {
    buffer: Vec<u8>,
}
impl BsonOutput {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn position(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    // Rewinds to a previously marked position.
    pub(crate) fn truncate(&mut self, position: usize) {
        self.buffer.truncate(position);
    }

    pub(crate) fn write_i32(&mut self, value: i32) -> MdbResult<()> {
        self.buffer.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    pub(crate) fn write_i64(&mut self, value: i64) -> MdbResult<()> {
        self.buffer.write_i64::<LittleEndian>(value)?;
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, value: u8) -> MdbResult<()> {
        self.buffer.write_u8(value)?;
        Ok(())
    }

    pub(crate) fn write_cstring(&mut self, value: &str) -> MdbResult<()> {
        if value.as_bytes().contains(&0) {
            return Err(usage_err!("cstring must not contain a null byte: {value:?}"));
        }
        self.buffer.write_all(value.as_bytes())?;
        self.buffer.write_u8(0)?;
        Ok(())
    }

    // Writes a complete document, returns its size.
    pub(crate) fn write_document(&mut self, document: &Document) -> MdbResult<usize> {
        let start = self.position();
        document.to_writer(&mut self.buffer)?;
        Ok(self.position() - start)
    }

    pub(crate) fn backpatch_i32(&mut self, position: usize, value: i32) -> MdbResult<()> {
        if position + 4 > self.buffer.len() {
            return Err(impl_err!("backpatch position {position} is out of range"));
        }
        LittleEndian::write_i32(&mut self.buffer[position..position + 4], value);
        Ok(())
    }

    // Backpatches the number of bytes from `start` to the current position into `start`.
    pub(crate) fn backpatch_length(&mut self, start: usize) -> MdbResult<()> {
        let length = i32::try_from(self.position() - start)
            .map_err(|_| impl_err!("length of {} bytes exceeds i32", self.position() - start))?;
        self.backpatch_i32(start, length)
    }

    // Opens an embedded document envelope and returns the position of its length field.
    pub(crate) fn start_document(&mut self) -> MdbResult<usize> {
        let start = self.position();
        self.write_i32(0)?; // I4 length placeholder
        Ok(start)
    }

    pub(crate) fn end_document(&mut self, start: usize) -> MdbResult<()> {
        self.write_u8(0)?;
        self.backpatch_length(start)
    }

    pub(crate) fn start_array(&mut self, name: &str) -> MdbResult<usize> {
        self.write_u8(ELEMENT_ARRAY)?;
        self.write_cstring(name)?;
        self.start_document()
    }

    pub(crate) fn end_array(&mut self, start: usize) -> MdbResult<()> {
        self.end_document(start)
    }

    pub(crate) fn write_string_element(&mut self, name: &str, value: &str) -> MdbResult<()> {
        self.write_u8(ELEMENT_STRING)?;
        self.write_cstring(name)?;
        let length = i32::try_from(value.len() + 1)
            .map_err(|_| usage_err!("string of {} bytes is too long", value.len()))?;
        self.write_i32(length)?;
        self.buffer.write_all(value.as_bytes())?;
        self.write_u8(0)
    }

    pub(crate) fn write_bool_element(&mut self, name: &str, value: bool) -> MdbResult<()> {
        self.write_u8(ELEMENT_BOOLEAN)?;
        self.write_cstring(name)?;
        self.write_u8(u8::from(value))
    }

    // Writes an embedded document element, returns the size of the embedded document.
    pub(crate) fn write_document_element(
        &mut self,
        name: &str,
        document: &Document,
    ) -> MdbResult<usize> {
        self.write_u8(ELEMENT_DOCUMENT)?;
        self.write_cstring(name)?;
        self.write_document(document)
    }
}

#[cfg(test)]
mod test {
    use super::BsonOutput;
    use bson::{doc, Document};

    #[test]
    fn test_envelope_matches_bson_encoding() {
        let mut out = BsonOutput::new();
        let start = out.start_document().unwrap();
        out.write_string_element("insert", "coll").unwrap();
        out.write_bool_element("ordered", true).unwrap();
        let array = out.start_array("documents").unwrap();
        out.write_document_element("0", &doc! {"a": 1}).unwrap();
        let mark = out.position();
        out.write_document_element("1", &doc! {"b": 2}).unwrap();
        out.truncate(mark);
        out.end_array(array).unwrap();
        out.end_document(start).unwrap();

        let decoded = Document::from_reader(&mut out.as_slice()).unwrap();
        assert_eq!(
            decoded,
            doc! {"insert": "coll", "ordered": true, "documents": [{"a": 1}]}
        );
    }

    #[test]
    fn test_cstring_with_null_is_rejected() {
        let mut out = BsonOutput::new();
        assert!(out.write_cstring("a\0b").is_err());
        assert!(out.write_cstring("db.$cmd").is_ok());
        assert_eq!(out.position(), 8);
    }
}
