//! Fixed-size record encoding and channel I/O

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// A packed, fixed-size wire record
pub trait Record: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Append exactly `SIZE` bytes to `buf`
    fn encode(&self, buf: &mut BytesMut) -> std::result::Result<(), ProtocolError>;

    /// Decode from a buffer holding at least `SIZE` bytes
    fn decode(buf: &mut Bytes) -> std::result::Result<Self, ProtocolError>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> std::result::Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf)?;
        debug_assert_eq!(buf.len(), Self::SIZE);
        Ok(buf.freeze())
    }
}

/// Write `value` NUL-padded to `capacity` bytes
pub(crate) fn put_fixed_str(
    buf: &mut BytesMut,
    field: &'static str,
    value: &str,
    capacity: usize,
) -> std::result::Result<(), ProtocolError> {
    put_fixed_bytes(buf, field, value.as_bytes(), capacity)
}

/// Write raw `bytes` NUL-padded to `capacity` bytes
pub(crate) fn put_fixed_bytes(
    buf: &mut BytesMut,
    field: &'static str,
    bytes: &[u8],
    capacity: usize,
) -> std::result::Result<(), ProtocolError> {
    if bytes.len() >= capacity {
        return Err(ProtocolError::FieldTooLong {
            field,
            len: bytes.len(),
            capacity,
        });
    }
    if bytes.contains(&0) {
        return Err(ProtocolError::EmbeddedNul { field });
    }

    buf.put_slice(bytes);
    buf.put_bytes(0, capacity - bytes.len());
    Ok(())
}

/// Read a NUL-padded field of `capacity` bytes as UTF-8
pub(crate) fn get_fixed_str(
    buf: &mut Bytes,
    field: &'static str,
    capacity: usize,
) -> std::result::Result<String, ProtocolError> {
    let raw = get_fixed_bytes(buf, field, capacity)?;
    std::str::from_utf8(&raw)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8 { field })
}

/// Read a NUL-padded field of `capacity` bytes, up to the first NUL
pub(crate) fn get_fixed_bytes(
    buf: &mut Bytes,
    field: &'static str,
    capacity: usize,
) -> std::result::Result<Bytes, ProtocolError> {
    let mut raw = buf.split_to(capacity);
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or(ProtocolError::Unterminated { field })?;
    raw.truncate(end);
    Ok(raw)
}

/// Reject buffers shorter than a full record
pub(crate) fn ensure_len(buf: &Bytes, expected: usize) -> std::result::Result<(), ProtocolError> {
    if buf.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            got: buf.len(),
        });
    }
    Ok(())
}

/// Read one record from a channel
///
/// Returns `Ok(None)` when the stream ends cleanly on a record boundary.
/// End of stream part way through a record is `ProtocolError::Truncated`.
pub async fn read_record<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: Record,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::zeroed(T::SIZE);
    let mut filled = 0;

    while filled < T::SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::Truncated {
                expected: T::SIZE,
                got: filled,
            }
            .into());
        }
        filled += n;
    }

    let mut bytes = buf.freeze();
    Ok(Some(T::decode(&mut bytes)?))
}

/// Write one record to a channel and flush it
pub async fn write_record<T, W>(writer: &mut W, record: &T) -> Result<()>
where
    T: Record,
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = record.to_bytes()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_str_padding() {
        let mut buf = BytesMut::new();
        put_fixed_str(&mut buf, "name", "abc", 8).unwrap();
        assert_eq!(&buf[..], b"abc\0\0\0\0\0");

        let mut bytes = buf.freeze();
        assert_eq!(get_fixed_str(&mut bytes, "name", 8).unwrap(), "abc");
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_fixed_bytes_keep_invalid_utf8() {
        let mut buf = BytesMut::new();
        put_fixed_bytes(&mut buf, "text", &[0xff, b'a'], 4).unwrap();
        assert_eq!(&buf[..], b"\xffa\0\0");

        let mut bytes = buf.clone().freeze();
        assert_eq!(&get_fixed_bytes(&mut bytes, "text", 4).unwrap()[..], b"\xffa");

        let mut bytes = buf.freeze();
        assert_eq!(
            get_fixed_str(&mut bytes, "text", 4).unwrap_err(),
            ProtocolError::InvalidUtf8 { field: "text" }
        );
    }

    #[test]
    fn test_fixed_str_at_capacity_rejected() {
        let mut buf = BytesMut::new();
        let err = put_fixed_str(&mut buf, "name", "abcdefgh", 8).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldTooLong {
                field: "name",
                len: 8,
                capacity: 8
            }
        );

        // One byte short of capacity leaves room for the terminator
        put_fixed_str(&mut buf, "name", "abcdefg", 8).unwrap();
    }

    #[test]
    fn test_fixed_str_embedded_nul() {
        let mut buf = BytesMut::new();
        let err = put_fixed_str(&mut buf, "name", "a\0b", 8).unwrap_err();
        assert_eq!(err, ProtocolError::EmbeddedNul { field: "name" });
    }

    #[test]
    fn test_unterminated_field() {
        let mut bytes = Bytes::from_static(b"abcdefgh");
        let err = get_fixed_str(&mut bytes, "name", 8).unwrap_err();
        assert_eq!(err, ProtocolError::Unterminated { field: "name" });
    }

    #[test]
    fn test_invalid_utf8_field() {
        let mut bytes = Bytes::from_static(&[0xff, 0xfe, 0, 0]);
        let err = get_fixed_str(&mut bytes, "name", 4).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidUtf8 { field: "name" });
    }
}
