pub mod dispatcher;
pub mod framer;

pub use dispatcher::{classify, Frame, ParseError, PrintCommand};
pub use framer::{Framer, FramerError, DEFAULT_REASSEMBLY_TIMEOUT, MAX_MESSAGE_SIZE, MIN_MESSAGE_SIZE};
