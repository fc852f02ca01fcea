//! Scientific pitch notation <-> equal-tempered frequency (A4 = 440 Hz)

const A4_FREQUENCY: f64 = 440.0;
const A4_MIDI: i32 = 69;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Frequency of a note name such as `C4`, `A#3`, `Eb5`, `fx2` or `C-1`.
///
/// Accidentals: `#`, `##`, `x` (double sharp), `b`, `bb`. The octave is
/// mandatory. Returns `None` for anything else.
pub fn note_to_frequency(note: &str) -> Option<f64> {
    let midi = note_to_midi(note)?;
    Some(midi_to_frequency(midi))
}

/// Nearest note name for a frequency, spelled with sharps.
///
/// Only positive, finite frequencies have a note; the caller keeps its own
/// text for anything else.
pub fn frequency_to_note(frequency: f64) -> Option<String> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    let midi = (A4_MIDI as f64 + 12.0 * (frequency / A4_FREQUENCY).log2()).round();
    if !midi.is_finite() || midi.abs() > i32::MAX as f64 / 2.0 {
        return None;
    }
    let midi = midi as i32;
    let name = SHARP_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    Some(format!("{name}{octave}"))
}

fn midi_to_frequency(midi: i32) -> f64 {
    A4_FREQUENCY * 2f64.powf(f64::from(midi - A4_MIDI) / 12.0)
}

fn note_to_midi(note: &str) -> Option<i32> {
    let mut chars = note.chars();
    let pitch_class = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let octave_start = rest
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .unwrap_or(rest.len());
    let (accidental, octave) = rest.split_at(octave_start);

    let shift = match accidental.to_ascii_lowercase().as_str() {
        "" => 0,
        "#" => 1,
        "##" | "x" => 2,
        "b" => -1,
        "bb" => -2,
        _ => return None,
    };

    let digits = octave.strip_prefix('-').unwrap_or(octave);
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let octave: i32 = octave.parse().ok()?;

    Some((octave + 1) * 12 + pitch_class + shift)
}
