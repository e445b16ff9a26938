//! C ABI for hosts that load the binding as a shared library.
//!
//! Every function takes and returns plain C types. Events are handed to host
//! callbacks as versioned JSON envelopes, only from inside `gb_pump`.

mod callback;
mod envelope;
mod exports;
mod status;

pub use callback::{CallbackSink, EventCallback};
pub use envelope::EventEnvelope;
pub use exports::*;
pub use status::FfiResult;
