use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use serde_derive::{Deserialize, Serialize};

use super::CodecError;
use crate::color::Color;

/// First line of an effect file.
///
/// `colors` is the dictionary table: rows reference colors by their position
/// in this list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectMetadata {
    pub frame_delay_ms: u32,
    pub light_count: usize,
    pub colors: Vec<Color>,
}

/// Serialize a frame matrix (rows = frames, columns = lights) into the
/// effect-file format.
///
/// Colors are quantized to 8 bits per channel by the dictionary pass; the
/// encoded index stream is otherwise lossless.
pub fn encode<W: Write>(
    out: &mut W,
    frames: &[Vec<Color>],
    frame_delay_ms: u32,
    light_count: usize,
) -> Result<(), CodecError> {
    // Global dictionary: distinct quantized colors, ascending packed value
    let table: BTreeSet<u32> = frames
        .iter()
        .flat_map(|row| row.iter().map(|color| color.to_packed()))
        .collect();

    let colors: Vec<Color> = table.iter().map(|&packed| Color::from_packed(packed)).collect();
    let index_of: HashMap<u32, usize> = table
        .iter()
        .enumerate()
        .map(|(index, &packed)| (packed, index))
        .collect();

    let rows: Vec<Vec<usize>> = frames
        .iter()
        .map(|row| row.iter().map(|color| index_of[&color.to_packed()]).collect())
        .collect();

    let metadata = EffectMetadata {
        frame_delay_ms,
        light_count,
        colors,
    };
    writeln!(out, "{}", serde_json::to_string(&metadata)?)?;

    // Vertical pass: collapse runs of identical frames
    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        while end < rows.len() && rows[end] == rows[start] {
            end += 1;
        }

        let encoded = encode_row(&rows[start]);
        let count = end - start;
        if count == 1 {
            writeln!(out, "{}", encoded)?;
        } else {
            writeln!(out, "{}r[{}]", count, encoded)?;
        }

        start = end;
    }

    Ok(())
}

/// Horizontal pass: collapse runs of identical pixel indices within a row.
fn encode_row(row: &[usize]) -> String {
    let mut groups = Vec::new();

    let mut start = 0;
    while start < row.len() {
        let mut end = start + 1;
        while end < row.len() && row[end] == row[start] {
            end += 1;
        }

        let count = end - start;
        if count == 1 {
            groups.push(row[start].to_string());
        } else {
            groups.push(format!("{}x{}", count, row[start]));
        }

        start = end;
    }

    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_string(frames: &[Vec<Color>], frame_delay_ms: u32, light_count: usize) -> String {
        let mut out = Vec::new();
        encode(&mut out, frames, frame_delay_ms, light_count).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_encode_row_runs() {
        assert_eq!(encode_row(&[0, 0, 0]), "3x0");
        assert_eq!(encode_row(&[0, 1, 2]), "0,1,2");
        assert_eq!(encode_row(&[1, 1, 0, 2, 2, 2]), "2x1,0,3x2");
        assert_eq!(encode_row(&[5]), "5");
    }

    #[test]
    fn test_encode_identical_frames_collapse() {
        let red = Color::rgb8(255, 0, 0);
        let frames = vec![vec![red; 3]; 4];

        let output = encode_to_string(&frames, 40, 3);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r##"{"frame_delay_ms":40,"light_count":3,"colors":["#ff0000"]}"##
        );
        assert_eq!(lines[1], "4r[3x0]");
    }

    #[test]
    fn test_encode_distinct_frames_one_line_each() {
        let red = Color::rgb8(255, 0, 0);
        let green = Color::rgb8(0, 255, 0);
        let frames = vec![
            vec![red, red, green],
            vec![green, red, red],
            vec![red, red, green],
        ];

        let output = encode_to_string(&frames, 25, 3);
        let lines: Vec<&str> = output.lines().collect();

        // Dictionary sorts by packed value: green (0x00ff00) before red
        assert_eq!(
            lines[0],
            r##"{"frame_delay_ms":25,"light_count":3,"colors":["#00ff00","#ff0000"]}"##
        );
        assert_eq!(&lines[1..], ["2x1,0", "0,2x1", "2x1,0"]);
    }

    #[test]
    fn test_encode_quantizes_through_dictionary() {
        // Channels closer than 1/255 collapse onto one dictionary entry
        let a = Color::rgb(0.5, 0., 0.);
        let b = Color::rgb(0.500001, 0., 0.);
        let frames = vec![vec![a, b]];

        let output = encode_to_string(&frames, 40, 2);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines[0],
            r##"{"frame_delay_ms":40,"light_count":2,"colors":["#7f0000"]}"##
        );
        assert_eq!(lines[1], "2x0");
    }
}
