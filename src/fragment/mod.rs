//! Payload fragmentation - splitting and reassembly.
//!
//! A logical frame whose encoded size exceeds the connection's maximum
//! frame size is split into an initial fragment (the original frame type
//! carrying as much metadata/data as fits) followed by PAYLOAD
//! continuation fragments chained via the FOLLOWS flag. Reassembly is the
//! exact inverse for every frame type that supports fragmentation.

mod assembler;
mod splitter;

pub use assembler::{Assembled, FragmentAssembler};
pub use splitter::split_frame;
