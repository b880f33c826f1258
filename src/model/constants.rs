/// Color channels per image; the provider always yields RGB.
pub const CHANNELS: usize = 3;

/// Smallest patch side the network configs accept.
pub const MIN_PATCH_SIZE: usize = 8;
