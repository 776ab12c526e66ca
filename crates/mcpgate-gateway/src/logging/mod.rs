//! Request correlation for gateway logs
//!
//! Every request gets a short trace id that is attached to its span and to
//! the request extensions, so auth, session and transport logs for one turn
//! can be grepped together.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
