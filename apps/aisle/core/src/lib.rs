//! Shared wire primitives for the Aisle catalog service.
//!
//! Both the server and the client speak the same half-duplex protocol: one
//! JSON document per frame, each frame terminated by a blank line (`"\n\n"`).
//! This crate owns the message shapes and the framing so the two sides can
//! never drift apart.

pub mod codec;
pub mod protocol;

pub use codec::{
    decode, encode, recv_frame, recv_message, FrameCodec, FramingError, DEFAULT_MAX_FRAME_BYTES,
    TERMINATOR,
};
pub use protocol::{
    CategoryNode, CategoryRef, Listing, ListingError, Location, ProductItem, Request, Response,
};
