//! Broker clients over named pipes
//!
//! Every operation creates the client's own FIFO, sends one request down the
//! broker's administrative FIFO naming it, then reads or writes that FIFO:
//! - `create_box` / `remove_box` / `list_boxes` read the answer and return
//! - `Publisher` writes messages until dropped
//! - `Subscriber` reads messages until the broker closes the pipe

pub mod admin;
pub mod config;
pub mod pipe;
pub mod publisher;
pub mod subscriber;

pub use admin::{create_box, list_boxes, remove_box, send_request};
pub use config::ClientConfig;
pub use publisher::{publish_lines, Publisher};
pub use subscriber::{subscribe, Subscriber};
