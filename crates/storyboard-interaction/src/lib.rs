//! Wire-level interaction with the generation server.
//!
//! - `event_decoder`: framing of the server-sent event stream into JSON values
//! - `http_backend`: reqwest implementation of the collaborator traits

pub mod event_decoder;
pub mod http_backend;

pub use event_decoder::{EventDecoder, byte_stream_from_chunks, decode_events};
pub use http_backend::HttpBackend;
