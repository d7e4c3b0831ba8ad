//! Wire protocol
//!
//! Every exchange between clients and the broker is a fixed-size, packed
//! record. String fields are NUL-padded to their capacity and integers are
//! little-endian.
//!
//! ```text
//! Request       code:u8  reply_path:[u8;256]  box_name:[u8;32]          289 bytes
//! Message       code:u8  text:[u8;1024]                                1025 bytes
//! BoxAnswer     code:u8  return_code:i32  error:[u8;1024]              1029 bytes
//! BoxListEntry  code:u8  last:u8  box_name:[u8;32]  size:u64
//!               publishers:u64  subscribers:u64                          58 bytes
//! ```

pub mod constants;
pub mod message;
pub mod record;

pub use constants::OpCode;
pub use message::{BoxAnswer, BoxListEntry, Message, RawMessage, Request, RequestKind};
pub use record::{read_record, write_record, Record};
