//! Effect column and volume column encodings.

/// Effect command id meaning "no command".
pub const NO_COMMAND: u8 = 255;

/// Raw volume byte meaning "no volume column event".
pub const NO_VOLUME: u8 = 255;

/// Volume column command.
///
/// S3M only ever produces `None` and `Set`; the remaining variants are the
/// XM volume-column effects, normalized at parse time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolumeCommand {
    #[default]
    None,
    /// Set volume (0-64)
    Set(u8),
    SlideDown(u8),
    SlideUp(u8),
    FineSlideDown(u8),
    FineSlideUp(u8),
    /// Set vibrato speed
    VibratoSpeed(u8),
    /// Vibrato with the given depth
    Vibrato(u8),
    /// Set panning (0-15)
    SetPan(u8),
    PanSlideLeft(u8),
    PanSlideRight(u8),
    TonePorta(u8),
}

impl VolumeCommand {
    /// Unified volume byte: 0-64 for a set-volume event, 255 otherwise.
    pub const fn raw(self) -> u8 {
        match self {
            VolumeCommand::Set(v) => v,
            _ => NO_VOLUME,
        }
    }

    /// The volume to set, if this is a set-volume event.
    pub const fn set_volume(self) -> Option<u8> {
        match self {
            VolumeCommand::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            VolumeCommand::None => "None",
            VolumeCommand::Set(_) => "Set",
            VolumeCommand::SlideDown(_) => "SlideDown",
            VolumeCommand::SlideUp(_) => "SlideUp",
            VolumeCommand::FineSlideDown(_) => "FineSlideDown",
            VolumeCommand::FineSlideUp(_) => "FineSlideUp",
            VolumeCommand::VibratoSpeed(_) => "VibratoSpeed",
            VolumeCommand::Vibrato(_) => "Vibrato",
            VolumeCommand::SetPan(_) => "SetPan",
            VolumeCommand::PanSlideLeft(_) => "PanSlideLeft",
            VolumeCommand::PanSlideRight(_) => "PanSlideRight",
            VolumeCommand::TonePorta(_) => "TonePorta",
        }
    }
}
