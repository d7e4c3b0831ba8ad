//! Request and response records

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::record::{
    ensure_len, get_fixed_bytes, get_fixed_str, put_fixed_bytes, put_fixed_str, Record,
};
use crate::error::ProtocolError;

/// Administrative request kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    RegisterPublisher,
    RegisterSubscriber,
    CreateBox,
    RemoveBox,
    ListBoxes,
}

impl RequestKind {
    /// Wire op code
    pub fn op_code(self) -> OpCode {
        match self {
            RequestKind::RegisterPublisher => OpCode::RegisterPublisher,
            RequestKind::RegisterSubscriber => OpCode::RegisterSubscriber,
            RequestKind::CreateBox => OpCode::CreateBox,
            RequestKind::RemoveBox => OpCode::RemoveBox,
            RequestKind::ListBoxes => OpCode::ListBoxes,
        }
    }

    /// Whether the request names a box
    pub fn needs_box(self) -> bool {
        !matches!(self, RequestKind::ListBoxes)
    }
}

impl TryFrom<OpCode> for RequestKind {
    type Error = ProtocolError;

    fn try_from(code: OpCode) -> Result<Self, Self::Error> {
        match code {
            OpCode::RegisterPublisher => Ok(RequestKind::RegisterPublisher),
            OpCode::RegisterSubscriber => Ok(RequestKind::RegisterSubscriber),
            OpCode::CreateBox => Ok(RequestKind::CreateBox),
            OpCode::RemoveBox => Ok(RequestKind::RemoveBox),
            OpCode::ListBoxes => Ok(RequestKind::ListBoxes),
            other => Err(ProtocolError::UnexpectedOpCode {
                expected: "request",
                actual: other.as_u8(),
            }),
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestKind::RegisterPublisher => "register-publisher",
            RequestKind::RegisterSubscriber => "register-subscriber",
            RequestKind::CreateBox => "create-box",
            RequestKind::RemoveBox => "remove-box",
            RequestKind::ListBoxes => "list-boxes",
        };
        f.write_str(name)
    }
}

/// One administrative request
///
/// `box_name` is empty for `ListBoxes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: RequestKind,
    pub reply_path: String,
    pub box_name: String,
}

impl Request {
    /// Create a request that targets a box
    pub fn new(kind: RequestKind, reply_path: impl Into<String>, box_name: impl Into<String>) -> Self {
        Self {
            kind,
            reply_path: reply_path.into(),
            box_name: box_name.into(),
        }
    }

    /// Create a `ListBoxes` request
    pub fn list(reply_path: impl Into<String>) -> Self {
        Self::new(RequestKind::ListBoxes, reply_path, String::new())
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.reply_path.is_empty() {
            return Err(ProtocolError::EmptyField {
                field: "reply channel path",
            });
        }
        if self.kind.needs_box() && self.box_name.is_empty() {
            return Err(ProtocolError::EmptyField { field: "box name" });
        }
        Ok(())
    }
}

impl Record for Request {
    const SIZE: usize = 1 + PIPE_PATH_LEN + BOX_NAME_LEN;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.validate()?;
        buf.put_u8(self.kind.op_code().as_u8());
        put_fixed_str(buf, "reply channel path", &self.reply_path, PIPE_PATH_LEN)?;
        put_fixed_str(buf, "box name", &self.box_name, BOX_NAME_LEN)?;
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let kind = RequestKind::try_from(OpCode::try_from(buf.get_u8())?)?;
        let reply_path = get_fixed_str(buf, "reply channel path", PIPE_PATH_LEN)?;
        let box_name = get_fixed_str(buf, "box name", BOX_NAME_LEN)?;

        let request = Self {
            kind,
            reply_path,
            box_name,
        };
        request.validate()?;
        Ok(request)
    }
}

/// A line of text travelling publisher → broker or broker → subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: OpCode,
    pub text: String,
}

impl Message {
    /// Message sent by a publisher
    pub fn publisher(text: impl Into<String>) -> Self {
        Self {
            code: OpCode::PublisherMessage,
            text: text.into(),
        }
    }

    /// Message sent to a subscriber
    pub fn subscriber(text: impl Into<String>) -> Self {
        Self {
            code: OpCode::SubscriberMessage,
            text: text.into(),
        }
    }
}

impl Record for Message {
    const SIZE: usize = 1 + MESSAGE_LEN;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.code.as_u8());
        put_fixed_str(buf, "message text", &self.text, MESSAGE_LEN)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let code = OpCode::try_from(buf.get_u8())?;
        if !matches!(code, OpCode::PublisherMessage | OpCode::SubscriberMessage) {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: "message",
                actual: code.as_u8(),
            });
        }
        let text = get_fixed_str(buf, "message text", MESSAGE_LEN)?;
        Ok(Self { code, text })
    }
}

/// A message whose text is kept as the bytes the client sent
///
/// Same layout as [`Message`]. The publisher path stores text verbatim, so
/// it does not require UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub code: OpCode,
    pub text: Bytes,
}

impl Record for RawMessage {
    const SIZE: usize = Message::SIZE;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.code.as_u8());
        put_fixed_bytes(buf, "message text", &self.text, MESSAGE_LEN)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let code = OpCode::try_from(buf.get_u8())?;
        let text = get_fixed_bytes(buf, "message text", MESSAGE_LEN)?;
        Ok(Self { code, text })
    }
}

/// Answer to a `CreateBox` or `RemoveBox` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxAnswer {
    pub code: OpCode,
    pub return_code: i32,
    pub error_message: String,
}

impl BoxAnswer {
    /// Successful answer
    pub fn ok(code: OpCode) -> Self {
        Self {
            code,
            return_code: ANSWER_OK,
            error_message: String::new(),
        }
    }

    /// Failed answer; the message is cut to fit the wire field
    pub fn error(code: OpCode, message: impl Into<String>) -> Self {
        let mut error_message = message.into();
        truncate_utf8(&mut error_message, ERROR_MESSAGE_LEN - 1);
        Self {
            code,
            return_code: ANSWER_ERR,
            error_message,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.return_code == ANSWER_OK
    }
}

impl Record for BoxAnswer {
    const SIZE: usize = 1 + 4 + ERROR_MESSAGE_LEN;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.code.as_u8());
        buf.put_i32_le(self.return_code);
        put_fixed_str(buf, "error message", &self.error_message, ERROR_MESSAGE_LEN)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let code = OpCode::try_from(buf.get_u8())?;
        if !matches!(code, OpCode::CreateBoxAnswer | OpCode::RemoveBoxAnswer) {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: "box answer",
                actual: code.as_u8(),
            });
        }
        let return_code = buf.get_i32_le();
        let error_message = get_fixed_str(buf, "error message", ERROR_MESSAGE_LEN)?;
        Ok(Self {
            code,
            return_code,
            error_message,
        })
    }
}

/// One row of a `ListBoxes` answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxListEntry {
    pub last: bool,
    pub box_name: String,
    pub size: u64,
    pub publishers: u64,
    pub subscribers: u64,
}

impl BoxListEntry {
    /// The single entry sent when no boxes exist
    pub fn placeholder() -> Self {
        Self {
            last: true,
            box_name: String::new(),
            size: 0,
            publishers: 0,
            subscribers: 0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.box_name.is_empty()
    }
}

impl Record for BoxListEntry {
    const SIZE: usize = 1 + 1 + BOX_NAME_LEN + 8 * 3;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(OpCode::ListBoxesAnswer.as_u8());
        buf.put_u8(u8::from(self.last));
        put_fixed_str(buf, "box name", &self.box_name, BOX_NAME_LEN)?;
        buf.put_u64_le(self.size);
        buf.put_u64_le(self.publishers);
        buf.put_u64_le(self.subscribers);
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let code = buf.get_u8();
        if code != OpCode::ListBoxesAnswer.as_u8() {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: "box list entry",
                actual: code,
            });
        }
        let last = buf.get_u8() != 0;
        let box_name = get_fixed_str(buf, "box name", BOX_NAME_LEN)?;
        Ok(Self {
            last,
            box_name,
            size: buf.get_u64_le(),
            publishers: buf.get_u64_le(),
            subscribers: buf.get_u64_le(),
        })
    }
}

/// Cut `s` to at most `max` bytes without splitting a character
pub(crate) fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
