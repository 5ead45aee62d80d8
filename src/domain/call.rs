//! Call row entities extracted from the dashboard's live-calls view.

/// Outcome of a call as reported by the dashboard row's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Call is ringing, in progress, or otherwise not yet failed.
    Pending,
    /// The dashboard marked the call as failed; no recording will exist.
    Failed,
}

impl CallStatus {
    /// Classify a raw status cell. Anything other than `FAILED`
    /// (case-insensitive) is treated as pending.
    pub fn from_cell(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("FAILED") {
            Self::Failed
        } else {
            Self::Pending
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Reference to a call recording, mined from the row's play control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    /// Device identifier, first argument of the play handler.
    pub device_id: String,
    /// Call UUID, second argument of the play handler.
    pub call_uuid: String,
}

impl AudioRef {
    /// Build the sound-fetch URL for this recording against the given base.
    pub fn sound_url(&self, base_url: &str) -> String {
        format!(
            "{}/live/calls/sound?did={}&uuid={}",
            base_url.trim_end_matches('/'),
            self.device_id,
            self.call_uuid
        )
    }
}

/// One row of the live-calls table, rebuilt fresh on every poll tick.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Country name extracted from the first column.
    pub country: String,
    /// Destination number, raw text of the second column.
    pub number: String,
    /// Caller-line identifier, the deduplication key.
    pub cli_number: String,
    /// Call duration in seconds, when a column carried one.
    pub duration: Option<u64>,
    /// Recording reference, when the play handler yielded a parseable pair.
    pub audio: Option<AudioRef>,
    /// Classified status of the row.
    pub status: CallStatus,
}

impl CallRecord {
    /// Whether this call should enter the audio pipeline: not failed and
    /// carrying a resolvable recording reference.
    pub fn has_audio(&self) -> bool {
        !self.status.is_failed() && self.audio.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_is_case_insensitive() {
        assert_eq!(CallStatus::from_cell("FAILED"), CallStatus::Failed);
        assert_eq!(CallStatus::from_cell("failed"), CallStatus::Failed);
        assert_eq!(CallStatus::from_cell("  Failed  "), CallStatus::Failed);
        assert_eq!(CallStatus::from_cell("ANSWERED"), CallStatus::Pending);
        assert_eq!(CallStatus::from_cell(""), CallStatus::Pending);
    }

    #[test]
    fn sound_url_construction() {
        let audio = AudioRef {
            device_id: "dev-7".into(),
            call_uuid: "abc-123".into(),
        };
        assert_eq!(
            audio.sound_url("https://panel.example.com/"),
            "https://panel.example.com/live/calls/sound?did=dev-7&uuid=abc-123"
        );
    }

    #[test]
    fn failed_rows_never_have_audio() {
        let call = CallRecord {
            country: "SPAIN".into(),
            number: "34911222333".into(),
            cli_number: "34600111222".into(),
            duration: None,
            audio: Some(AudioRef {
                device_id: "d".into(),
                call_uuid: "u".into(),
            }),
            status: CallStatus::Failed,
        };
        assert!(!call.has_audio());
    }
}
