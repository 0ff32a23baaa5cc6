pub mod frame;
pub mod frame_queue;
pub mod wav_format;
