//! Alarm melody text codec
//!
//! Operators type whitespace-separated entries of the form `NOTE` or
//! `NOTE@MULTIPLIER`, where `NOTE` is a frequency in Hz or a note name
//! (`C4`, `A#3`) and `MULTIPLIER` scales the 500 ms unit duration. The board
//! stores the same melody as `FREQ` / `FREQ@MILLISECONDS` entries.

use std::fmt;
use std::str::FromStr;

use crate::note::{frequency_to_note, note_to_frequency};

pub const MAX_ALARM_STEPS: usize = 100;
pub const MIN_NOTE_FREQ: u16 = 0;
pub const MAX_NOTE_FREQ: u16 = 20_000;
pub const MIN_NOTE_DURATION_MS: u16 = 1;
pub const MAX_NOTE_DURATION_MS: u16 = 1_000;
/// Canonical unit duration; a multiplier of 1 means this many milliseconds
pub const DEFAULT_NOTE_DURATION_MS: u16 = 500;

const NOTE_SEPARATOR: char = '@';
/// ms / 500 never needs more than three decimals
const EXACT_DECIMALS: usize = 3;
const EDITABLE_DECIMALS: usize = 2;

/// One tone of an alarm melody
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelodyStep {
    pub frequency: u16,
    pub duration_ms: u16,
}

impl MelodyStep {
    /// Parse one `NOTE[@MULTIPLIER]` entry
    pub fn parse(token: &str) -> Result<Self, MelodyError> {
        let (note, duration) = match token.split_once(NOTE_SEPARATOR) {
            Some((note, duration)) => (note, Some(duration)),
            None => (token, None),
        };
        Ok(Self {
            frequency: resolve_frequency(token, note)?,
            duration_ms: resolve_duration(duration)?,
        })
    }

    /// Whether the step uses the unit duration and so needs no `@` suffix
    pub fn has_default_duration(&self) -> bool {
        self.duration_ms == DEFAULT_NOTE_DURATION_MS
    }
}

/// A validated melody of 1 to [`MAX_ALARM_STEPS`] steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    steps: Vec<MelodyStep>,
}

impl Melody {
    /// Parse operator text. Entries past [`MAX_ALARM_STEPS`] are ignored, and
    /// the first invalid entry fails the whole melody.
    pub fn parse(input: &str) -> Result<Self, MelodyError> {
        Self::from_steps(parse_steps(input)?)
    }

    pub fn from_steps(steps: Vec<MelodyStep>) -> Result<Self, MelodyError> {
        if steps.is_empty() {
            return Err(MelodyError::Empty);
        }
        if steps.len() > MAX_ALARM_STEPS {
            return Err(MelodyError::TooManySteps { count: steps.len() });
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[MelodyStep] {
        &self.steps
    }

    /// Text written to the melody characteristic: `440 523@250 440@1000`
    pub fn to_wire(&self) -> String {
        self.steps
            .iter()
            .map(|step| {
                if step.has_default_duration() {
                    step.frequency.to_string()
                } else {
                    format!("{}{NOTE_SEPARATOR}{}", step.frequency, step.duration_ms)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for Melody {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Operator form with numeric frequencies and duration multipliers:
/// `440 523@0.5 440@2`. Multipliers keep three decimals, enough for any
/// whole millisecond, so parsing it back yields the same steps.
impl fmt::Display for Melody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", step.frequency)?;
            if let Some(multiplier) = multiplier_text(step.duration_ms, EXACT_DECIMALS) {
                write!(f, "{NOTE_SEPARATOR}{multiplier}")?;
            }
        }
        Ok(())
    }
}

/// Parse operator text into steps without requiring any; an empty input
/// yields an empty list.
pub fn parse_steps(input: &str) -> Result<Vec<MelodyStep>, MelodyError> {
    input
        .split_whitespace()
        .take(MAX_ALARM_STEPS)
        .map(MelodyStep::parse)
        .collect()
}

/// Convert the board's melody text into the operator form, turning each
/// frequency into its nearest note name and each duration into a multiplier.
///
/// This is a display convenience: an entry whose frequency has no note keeps
/// its original text, and an unreadable duration is dropped.
pub fn wire_to_editable(raw: &str) -> String {
    raw.split_whitespace()
        .map(|entry| {
            let (frequency, duration) = match entry.split_once(NOTE_SEPARATOR) {
                Some((frequency, duration)) => (frequency, Some(duration)),
                None => (entry, None),
            };

            let note = frequency
                .parse::<f64>()
                .ok()
                .and_then(frequency_to_note)
                .unwrap_or_else(|| frequency.to_string());

            match duration
                .and_then(|ms| ms.parse::<u16>().ok())
                .and_then(|ms| multiplier_text(ms, EDITABLE_DECIMALS))
            {
                Some(multiplier) => format!("{note}{NOTE_SEPARATOR}{multiplier}"),
                None => note,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Multiplier of the unit duration with at most `decimals` decimals, `None`
/// when it renders as 1.
fn multiplier_text(duration_ms: u16, decimals: usize) -> Option<String> {
    if duration_ms == DEFAULT_NOTE_DURATION_MS {
        return None;
    }
    let multiplier = f64::from(duration_ms) / f64::from(DEFAULT_NOTE_DURATION_MS);
    let text = format!("{multiplier:.decimals$}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "1" {
        return None;
    }
    Some(text.to_string())
}

fn resolve_frequency(token: &str, note: &str) -> Result<u16, MelodyError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(MelodyError::MissingNote {
            token: token.to_string(),
        });
    }

    let frequency = match finite_number(note) {
        Some(hz) => hz,
        None => note_to_frequency(note).ok_or_else(|| MelodyError::InvalidNote {
            note: note.to_string(),
        })?,
    };
    Ok(clamp_truncate(frequency, MIN_NOTE_FREQ, MAX_NOTE_FREQ))
}

fn resolve_duration(duration: Option<&str>) -> Result<u16, MelodyError> {
    let multiplier = match duration.map(str::trim) {
        None | Some("") => 1.0,
        Some(text) => finite_number(text).ok_or_else(|| MelodyError::InvalidDuration {
            duration: text.to_string(),
        })?,
    };
    Ok(clamp_truncate(
        multiplier * f64::from(DEFAULT_NOTE_DURATION_MS),
        MIN_NOTE_DURATION_MS,
        MAX_NOTE_DURATION_MS,
    ))
}

/// The whole text must be a number, so `440hz` or `0.5x` is rejected rather
/// than read up to the first stray character.
fn finite_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn clamp_truncate(value: f64, min: u16, max: u16) -> u16 {
    if !value.is_finite() {
        return min;
    }
    value.trunc().clamp(f64::from(min), f64::from(max)) as u16
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MelodyError {
    #[error("the melody must contain at least one entry in note@duration format")]
    Empty,
    #[error("the melody has {count} entries, at most {} are allowed", MAX_ALARM_STEPS)]
    TooManySteps { count: usize },
    #[error("add a musical note before the @ separator in \"{token}\"")]
    MissingNote { token: String },
    #[error("the note \"{note}\" is not valid")]
    InvalidNote { note: String },
    #[error("the duration \"{duration}\" is not valid")]
    InvalidDuration { duration: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step(frequency: u16, duration_ms: u16) -> MelodyStep {
        MelodyStep { frequency, duration_ms }
    }

    #[test]
    fn parses_notes_numbers_and_multipliers() {
        let melody = Melody::parse("A4 C5@0.5 440@2").unwrap();
        assert_eq!(melody.steps(), &[step(440, 500), step(523, 250), step(440, 1000)]);
        assert_eq!(melody.to_string(), "440 523@0.5 440@2");
        assert_eq!(melody.to_wire(), "440 523@250 440@1000");
    }

    #[test]
    fn empty_input_is_rejected() {
        for input in ["", "   ", "\n\t "] {
            let err = Melody::parse(input).unwrap_err();
            assert_eq!(err, MelodyError::Empty);
            assert!(err.to_string().contains("must contain at least one entry"));
        }
        assert_eq!(parse_steps("  ").unwrap(), vec![]);
    }

    #[test]
    fn frequency_is_truncated_and_clamped() {
        let steps = parse_steps("440.9 -3 25000 1e3").unwrap();
        let freqs: Vec<_> = steps.iter().map(|s| s.frequency).collect();
        assert_eq!(freqs, vec![440, 0, 20000, 1000]);
    }

    #[test]
    fn duration_is_truncated_and_clamped() {
        let steps = parse_steps("440@0 440@-1 440@3 440@0.0031 440@1.9999 440@").unwrap();
        let durations: Vec<_> = steps.iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![1, 1, 1000, 1, 999, 500]);
    }

    #[test]
    fn invalid_entries_name_the_offending_text() {
        assert_eq!(
            Melody::parse("A4 H9 C4"),
            Err(MelodyError::InvalidNote { note: "H9".to_string() })
        );
        assert_eq!(
            Melody::parse("A4@fast"),
            Err(MelodyError::InvalidDuration { duration: "fast".to_string() })
        );
        assert_eq!(
            Melody::parse("@2"),
            Err(MelodyError::MissingNote { token: "@2".to_string() })
        );
        assert_eq!(
            Melody::parse("inf"),
            Err(MelodyError::InvalidNote { note: "inf".to_string() })
        );
        assert_eq!(
            Melody::parse("440@NaN"),
            Err(MelodyError::InvalidDuration { duration: "NaN".to_string() })
        );
    }

    #[test]
    fn only_the_first_separator_splits() {
        assert_eq!(
            Melody::parse("440@1@2"),
            Err(MelodyError::InvalidDuration { duration: "1@2".to_string() })
        );
    }

    #[test]
    fn trailing_text_after_a_number_is_rejected() {
        assert_eq!(
            Melody::parse("440hz"),
            Err(MelodyError::InvalidNote { note: "440hz".to_string() })
        );
        assert_eq!(
            Melody::parse("440@0.5x"),
            Err(MelodyError::InvalidDuration { duration: "0.5x".to_string() })
        );
    }

    #[test]
    fn entries_past_the_cap_are_ignored() {
        let mut input = vec!["440"; MAX_ALARM_STEPS].join(" ");
        input.push_str(" not-a-note");
        let melody = Melody::parse(&input).unwrap();
        assert_eq!(melody.steps().len(), MAX_ALARM_STEPS);
    }

    #[test]
    fn from_steps_enforces_bounds() {
        assert_eq!(Melody::from_steps(vec![]), Err(MelodyError::Empty));
        assert_eq!(
            Melody::from_steps(vec![step(440, 500); MAX_ALARM_STEPS + 1]),
            Err(MelodyError::TooManySteps { count: MAX_ALARM_STEPS + 1 })
        );
    }

    #[test]
    fn default_duration_is_never_written_explicitly() {
        let melody = Melody::from_steps(vec![step(262, 500), step(0, 500)]).unwrap();
        assert_eq!(melody.to_wire(), "262 0");
        assert_eq!(melody.to_string(), "262 0");
    }

    #[test]
    fn quarter_duration_round_trips_through_operator_form() {
        let melody = Melody::from_steps(vec![step(330, 250)]).unwrap();
        assert_eq!(melody.to_string(), "330@0.5");
        let reparsed = Melody::parse(&melody.to_string()).unwrap();
        assert_eq!(reparsed.steps(), &[step(330, 250)]);
    }

    #[test]
    fn odd_durations_keep_three_decimals() {
        let melody = Melody::from_steps(vec![step(440, 333), step(440, 3), step(440, 999)]).unwrap();
        assert_eq!(melody.to_string(), "440@0.666 440@0.006 440@1.998");
        assert_eq!(Melody::parse(&melody.to_string()).unwrap(), melody);
    }

    #[test]
    fn board_text_becomes_editable_notes() {
        assert_eq!(wire_to_editable("440@500 523@250 440@1000"), "A4 C5@0.5 A4@2");
        assert_eq!(wire_to_editable("262"), "C4");
        assert_eq!(wire_to_editable("0@500 440@abc"), "0 A4");
        assert_eq!(wire_to_editable("330@333"), "E4@0.67");
        assert_eq!(wire_to_editable(""), "");
    }

    #[test]
    fn editable_form_parses_back() {
        let melody = Melody::parse(&wire_to_editable("440@500 523@250 440@1000")).unwrap();
        assert_eq!(melody.steps(), &[step(440, 500), step(523, 250), step(440, 1000)]);
    }

    fn token() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..30_000).prop_map(|hz| hz.to_string()),
            (0u32..30_000, 0.0f64..3.0).prop_map(|(hz, m)| format!("{hz}@{m}")),
            (0usize..7, 0i32..8).prop_map(|(n, o)| format!("{}{o}", ["C", "D#", "E", "F", "Gb", "A", "B"][n])),
        ]
    }

    proptest! {
        #[test]
        fn valid_entries_always_parse_in_range(tokens in prop::collection::vec(token(), 1..150)) {
            let melody = Melody::parse(&tokens.join(" ")).unwrap();
            prop_assert_eq!(melody.steps().len(), tokens.len().min(MAX_ALARM_STEPS));
            for step in melody.steps() {
                prop_assert!(step.frequency <= MAX_NOTE_FREQ);
                prop_assert!((MIN_NOTE_DURATION_MS..=MAX_NOTE_DURATION_MS).contains(&step.duration_ms));
            }
        }

        #[test]
        fn unit_duration_melodies_round_trip(freqs in prop::collection::vec(0u16..=MAX_NOTE_FREQ, 1..=MAX_ALARM_STEPS)) {
            let steps: Vec<_> = freqs.iter().map(|&f| step(f, DEFAULT_NOTE_DURATION_MS)).collect();
            let melody = Melody::from_steps(steps).unwrap();
            prop_assert!(!melody.to_string().contains('@'));
            prop_assert_eq!(Melody::parse(&melody.to_string()).unwrap(), melody);
        }

        #[test]
        fn any_melody_round_trips_through_operator_form(
            steps in prop::collection::vec(
                (0u16..=MAX_NOTE_FREQ, MIN_NOTE_DURATION_MS..=MAX_NOTE_DURATION_MS),
                1..=MAX_ALARM_STEPS,
            )
        ) {
            let steps: Vec<_> = steps.into_iter().map(|(f, ms)| step(f, ms)).collect();
            let melody = Melody::from_steps(steps).unwrap();
            prop_assert_eq!(Melody::parse(&melody.to_string()).unwrap(), melody);
        }
    }

    #[test]
    fn every_duration_round_trips_through_operator_form() {
        for ms in MIN_NOTE_DURATION_MS..=MAX_NOTE_DURATION_MS {
            let melody = Melody::from_steps(vec![step(440, ms)]).unwrap();
            let text = melody.to_string();
            assert_eq!(Melody::parse(&text).unwrap(), melody, "{text}");
        }
    }
}
