//! PFCP capture ingress.
//!
//! Binds a connectionless UDP socket (port 8805 by default) and hands
//! received datagrams to the pipeline. A read timeout keeps the receive call
//! short so the stop signal is observed promptly.

pub mod engine;
