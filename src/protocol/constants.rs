//! Protocol constants

use crate::error::ProtocolError;

/// Capacity of the reply channel path field (NUL included)
pub const PIPE_PATH_LEN: usize = 256;

/// Capacity of a box name field (NUL included)
pub const BOX_NAME_LEN: usize = 32;

/// Capacity of a message text field (NUL included)
pub const MESSAGE_LEN: usize = 1024;

/// Capacity of a box answer error message (NUL included)
pub const ERROR_MESSAGE_LEN: usize = 1024;

/// Longest box name that can be encoded
pub const MAX_BOX_NAME: usize = BOX_NAME_LEN - 1;

/// Longest message text that can be encoded
pub const MAX_MESSAGE_TEXT: usize = MESSAGE_LEN - 1;

/// Return code carried by a successful `BoxAnswer`
pub const ANSWER_OK: i32 = 0;

/// Return code carried by a failed `BoxAnswer`
pub const ANSWER_ERR: i32 = -1;

/// Op codes shared by every record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    RegisterPublisher = 1,
    RegisterSubscriber = 2,
    CreateBox = 3,
    CreateBoxAnswer = 4,
    RemoveBox = 5,
    RemoveBoxAnswer = 6,
    ListBoxes = 7,
    ListBoxesAnswer = 8,
    PublisherMessage = 9,
    SubscriberMessage = 10,
}

impl OpCode {
    /// Raw wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => OpCode::RegisterPublisher,
            2 => OpCode::RegisterSubscriber,
            3 => OpCode::CreateBox,
            4 => OpCode::CreateBoxAnswer,
            5 => OpCode::RemoveBox,
            6 => OpCode::RemoveBoxAnswer,
            7 => OpCode::ListBoxes,
            8 => OpCode::ListBoxesAnswer,
            9 => OpCode::PublisherMessage,
            10 => OpCode::SubscriberMessage,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}
