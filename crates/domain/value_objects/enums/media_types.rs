use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }

    /// Type-specific upload ceiling in bytes.
    pub fn max_bytes(&self) -> u64 {
        match self {
            MediaType::Image => MAX_IMAGE_BYTES,
            MediaType::Video => MAX_VIDEO_BYTES,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
