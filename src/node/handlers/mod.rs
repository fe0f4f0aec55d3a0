//! Event loop and packet handlers.

mod dispatch;
mod encrypted;
mod forwarding;
mod handshake;
mod rx_loop;
