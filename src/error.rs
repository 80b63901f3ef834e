use thiserror::Error;

pub const MAX_VOLUME: u8 = 150;
pub const MIN_VOLUME: u8 = 1;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("voice connection failed: {0}")]
    Voice(String),
    #[error("track control failed: {0}")]
    Track(String),
    #[error("chat request failed: {0}")]
    Chat(#[from] serenity::Error),
    #[error("metadata feed failed: {0}")]
    Feed(String),
}

/// Rejected `volume <n>` input. The display text is sent back to the user as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VolumeError {
    #[error("Volume must be an integer.")]
    NotAnInteger,
    #[error("Volume cannot exceed 150.")]
    TooHigh,
    #[error("Volume cannot be less than 1.")]
    TooLow,
}

impl VolumeError {
    pub fn check(percent: i64) -> Result<u8, VolumeError> {
        if percent > MAX_VOLUME as i64 {
            Err(VolumeError::TooHigh)
        } else if percent < MIN_VOLUME as i64 {
            Err(VolumeError::TooLow)
        } else {
            Ok(percent as u8)
        }
    }

    pub fn parse(input: &str) -> Result<u8, VolumeError> {
        let percent = input
            .trim()
            .parse::<i64>()
            .map_err(|_| VolumeError::NotAnInteger)?;

        Self::check(percent)
    }
}
