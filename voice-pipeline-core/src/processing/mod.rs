pub mod biquad;
pub mod compressor;
pub mod effect_graph;
pub mod ring_buffer;
pub mod signal;
