//! Transport primitives: TCP stream transport for peer traffic, UDP
//! datagram transport for the directory protocol.

pub mod datagram;
pub mod stream;
