pub mod adapter;
pub mod feed;
pub mod file;
pub mod wav;

pub use adapter::{
    AudioMode, AudioRef, CaptureAdapter, CaptureHandle, CaptureStatus, Permission, SampleConfig,
};
pub use feed::{can_remix, conform_frame, AudioFeed, AudioFrame, FileFeed, SilenceFeed};
pub use file::AudioFile;
pub use wav::WavCaptureAdapter;
