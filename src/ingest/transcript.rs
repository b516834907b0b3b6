//! Transcription prompts and reply parsing

use crate::error::{FolioError, Result};
use std::str::FromStr;

/// Marker the transcription model places between transcript and summary
pub const TRANSCRIPT_SEPARATOR: &str = "##**##";

const FORMAT_INSTRUCTIONS: &str = "The format should be 1. the Transcript without any timestamps \
     or any explanation at the beginning that it's the transcript 2. the Summary without any \
     explanation at the beginning that it's the summary";

/// Language the transcript and summary should be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptLanguage {
    /// Keep the language spoken in the recording
    #[default]
    English,
    Arabic,
}

impl TranscriptLanguage {
    fn instruction(&self) -> &'static str {
        match self {
            Self::English => "in the language that the transcript is in",
            Self::Arabic => "in Arabic language",
        }
    }
}

impl FromStr for TranscriptLanguage {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "english" => Ok(Self::English),
            "arabic" => Ok(Self::Arabic),
            other => Err(FolioError::Validation(format!(
                "language must be either 'english' or 'arabic', got '{}'",
                other
            ))),
        }
    }
}

/// Build the audio transcription prompt
///
/// A custom prompt still gets the format instructions appended so the reply
/// can be split by [`TranscriptResult::parse`].
pub fn transcription_prompt(custom: Option<&str>, language: TranscriptLanguage) -> String {
    let lead = match custom.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => format!("{}.", custom.trim_end_matches('.')),
        None => "Please transcribe this audio and provide a detailed summary of its content. \
                 Include key points and main topics."
            .to_string(),
    };

    format!(
        "{} {}. {}. 3. the transcript and the summary are divided by these characters {}",
        lead,
        FORMAT_INSTRUCTIONS,
        language.instruction(),
        TRANSCRIPT_SEPARATOR
    )
}

/// Transcript and summary extracted from a transcription reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub transcript: String,
    pub summary: String,
    /// False when the reply did not contain exactly one separator
    pub separated: bool,
}

impl TranscriptResult {
    /// Split a reply on [`TRANSCRIPT_SEPARATOR`]
    ///
    /// Without exactly one separator the whole reply is used for both fields.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw.split(TRANSCRIPT_SEPARATOR).collect();

        if let [transcript, summary] = parts.as_slice() {
            Self {
                transcript: transcript.trim().to_string(),
                summary: summary.trim().to_string(),
                separated: true,
            }
        } else {
            let whole = raw.trim().to_string();
            Self {
                transcript: whole.clone(),
                summary: whole,
                separated: false,
            }
        }
    }
}
