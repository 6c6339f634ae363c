pub mod beat;
pub mod grid;
pub mod sequencer;
