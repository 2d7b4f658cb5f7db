pub mod device;
pub mod playback;
pub mod queue;
pub mod sink;
