/// Streamed SHA-256 hashing for transfer verification
pub mod hash;

/// Working-directory lifecycle helpers
pub mod fs;
