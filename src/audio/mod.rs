// Audio processing (DSP)
// Modules: decoder, spectrum, bpm, key, energy, onset, mfcc

pub mod bpm;
pub mod decoder;
pub mod energy;
pub mod key;
pub mod mfcc;
pub mod onset;
pub mod spectrum;
