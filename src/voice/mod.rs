//! Audio output
//!
//! Handles speech playback, the guidance beep, and WAV decoding.
//! Speech synthesis itself is remote (see `transport`)

pub mod beep;
mod playback;
mod speaker;
pub mod wav;

pub use playback::{AudioPlayback, AudioSink, PlaybackParams, render, spatial_gains};
pub use speaker::Speaker;
pub use wav::{AudioClip, WAV_HEADER_LEN, decode_pcm16, samples_to_wav};
