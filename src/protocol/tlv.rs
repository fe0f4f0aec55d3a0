//! One-byte-type, one-byte-length TLV helpers shared by payload codecs.

use super::ProtocolError;

/// Largest value a single TLV entry can carry.
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

/// Append one TLV entry.
pub(crate) fn write(buf: &mut Vec<u8>, field: u8, value: &[u8]) -> Result<(), ProtocolError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(ProtocolError::FieldTooLong {
            field,
            max: MAX_VALUE_LEN,
            got: value.len(),
        });
    }
    buf.push(field);
    buf.push(value.len() as u8);
    buf.extend_from_slice(value);
    Ok(())
}

/// Iterator over `(type, value)` entries.
pub(crate) struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<(u8, &'a [u8]), ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        if self.pos + 2 > self.data.len() {
            let expected = self.pos + 2;
            let got = self.data.len();
            self.pos = got;
            return Some(Err(ProtocolError::MessageTooShort { expected, got }));
        }
        let field = self.data[self.pos];
        let len = self.data[self.pos + 1] as usize;
        let start = self.pos + 2;
        let end = start + len;
        if end > self.data.len() {
            let got = self.data.len();
            self.pos = got;
            return Some(Err(ProtocolError::MessageTooShort { expected: end, got }));
        }
        self.pos = end;
        Some(Ok((field, &self.data[start..end])))
    }
}

/// Copy a fixed-size field value.
pub(crate) fn fixed<const N: usize>(field: u8, value: &[u8]) -> Result<[u8; N], ProtocolError> {
    if value.len() != N {
        return Err(ProtocolError::InvalidFieldLength {
            field,
            expected: N,
            got: value.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(value);
    Ok(out)
}

/// Decode a UTF-8 field value.
pub(crate) fn utf8(field: u8, value: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(value.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(field))
}
