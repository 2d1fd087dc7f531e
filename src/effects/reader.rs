use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

use super::{format::EffectMetadata, CodecError};
use crate::color::Color;

lazy_static::lazy_static! {
    /// Whole-row repeat wrapper: `<count>r[<body>]`
    static ref ROW_REPEAT_REGEX: Regex = Regex::new(r"^(\d+)r\[(.*)\]$").unwrap();
    /// Row token: `<index>` or `<count>x<index>`
    static ref TOKEN_REGEX: Regex = Regex::new(r"^(?:(\d+)x)?(\d+)$").unwrap();
}

const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// Streaming decoder for one effect file.
///
/// Frames are decoded one line at a time and the file is rewound at EOF, so
/// playback loops forever in bounded memory. The consumer stops by dropping
/// the reader.
pub struct EffectReader {
    name: String,
    metadata: EffectMetadata,
    lines: BufReader<File>,
    line_buf: String,
    frame: Vec<Color>,
    /// Remaining yields of `frame` before the next line is read
    repeats_left: u32,
    /// Guards against spinning on a file with no decodable rows
    decoded_since_rewind: bool,
}

impl EffectReader {
    pub async fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, CodecError> {
        Self::open_with_capacity(name, path, DEFAULT_BUFFER_CAPACITY).await
    }

    /// Open with an explicit read-buffer capacity, which bounds how much of
    /// the file is held in memory while amortizing I/O.
    pub async fn open_with_capacity(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        capacity: usize,
    ) -> Result<Self, CodecError> {
        let file = File::open(path.as_ref()).await?;
        let mut lines = BufReader::with_capacity(capacity, file);

        let mut metadata_line = String::new();
        lines.read_line(&mut metadata_line).await?;
        let metadata: EffectMetadata = serde_json::from_str(metadata_line.trim_end())?;

        let light_count = metadata.light_count;

        Ok(Self {
            name: name.into(),
            metadata,
            lines,
            line_buf: String::new(),
            frame: Vec::with_capacity(light_count),
            repeats_left: 0,
            decoded_since_rewind: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.metadata.frame_delay_ms as _)
    }

    pub fn light_count(&self) -> usize {
        self.metadata.light_count
    }

    /// Decode the next frame. Never terminates on its own: at end of file
    /// the reader seeks back past the metadata line and keeps going.
    pub async fn next_frame(&mut self) -> Result<&[Color], CodecError> {
        if self.repeats_left > 0 {
            self.repeats_left -= 1;
            return Ok(&self.frame);
        }

        loop {
            self.line_buf.clear();
            let read = self.lines.read_line(&mut self.line_buf).await?;

            if read == 0 {
                if !self.decoded_since_rewind {
                    return Err(CodecError::EmptyBody);
                }

                // Loop: rewind and skip the metadata line again
                self.decoded_since_rewind = false;
                self.lines.seek(SeekFrom::Start(0)).await?;
                self.line_buf.clear();
                self.lines.read_line(&mut self.line_buf).await?;
                continue;
            }

            let line = self.line_buf.trim_end();
            if line.is_empty() {
                continue;
            }

            let (count, body) = match ROW_REPEAT_REGEX.captures(line) {
                Some(captures) => {
                    let count: u32 = captures[1]
                        .parse()
                        .map_err(|_| CodecError::Grammar(line.to_owned()))?;
                    let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
                    (count, body)
                }
                None => (1, line),
            };

            // A zero repeat encodes no frames at all
            if count == 0 {
                continue;
            }

            decode_row_into(
                &self.metadata.colors,
                self.metadata.light_count,
                body,
                &mut self.frame,
            )?;

            self.repeats_left = count - 1;
            self.decoded_since_rewind = true;
            return Ok(&self.frame);
        }
    }
}

impl std::fmt::Debug for EffectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectReader")
            .field("name", &self.name)
            .field("light_count", &self.metadata.light_count)
            .finish()
    }
}

/// Expand one encoded row into `out`, truncated to `light_count` pixels.
fn decode_row_into(
    colors: &[Color],
    light_count: usize,
    body: &str,
    out: &mut Vec<Color>,
) -> Result<(), CodecError> {
    out.clear();

    for token in body.split(',') {
        let captures = TOKEN_REGEX
            .captures(token)
            .ok_or_else(|| CodecError::Grammar(token.to_owned()))?;

        let repeat: u32 = match captures.get(1) {
            Some(count) => count
                .as_str()
                .parse()
                .map_err(|_| CodecError::Grammar(token.to_owned()))?,
            None => 1,
        };
        let index: usize = captures[2]
            .parse()
            .map_err(|_| CodecError::Grammar(token.to_owned()))?;

        let color = *colors.get(index).ok_or(CodecError::IndexOutOfRange {
            index,
            len: colors.len(),
        })?;

        for _ in 0..repeat {
            // Defensive truncation against overlong rows
            if out.len() == light_count {
                return Ok(());
            }
            out.push(color);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::encode;
    use std::path::PathBuf;

    async fn effect_file(tag: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "strandlight-reader-{}-{}.effect",
            std::process::id(),
            tag
        ));
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_repeat_row_scenario() {
        let path = effect_file(
            "repeat",
            "{\"frame_delay_ms\":40,\"light_count\":3,\"colors\":[\"#ff0000\",\"#00ff00\"]}\n2r[3x0]\n",
        )
        .await;

        let mut reader = EffectReader::open("repeat", &path).await.unwrap();
        assert_eq!(reader.frame_delay(), Duration::from_millis(40));
        assert_eq!(reader.light_count(), 3);

        let red = Color::rgb8(255, 0, 0);
        assert_eq!(reader.next_frame().await.unwrap(), [red, red, red]);
        assert_eq!(reader.next_frame().await.unwrap(), [red, red, red]);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_loops_forever() {
        let path = effect_file(
            "loop",
            "{\"frame_delay_ms\":10,\"light_count\":2,\"colors\":[\"#000000\",\"#ffffff\"]}\n2x0\n2x1\n",
        )
        .await;

        let black = Color::rgb8(0, 0, 0);
        let white = Color::rgb8(255, 255, 255);

        let mut reader = EffectReader::open("loop", &path).await.unwrap();

        // Three full passes over a two-frame file
        for _ in 0..3 {
            assert_eq!(reader.next_frame().await.unwrap(), [black, black]);
            assert_eq!(reader.next_frame().await.unwrap(), [white, white]);
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_overlong_row_truncated() {
        let path = effect_file(
            "truncate",
            "{\"frame_delay_ms\":10,\"light_count\":2,\"colors\":[\"#ff0000\"]}\n9x0\n",
        )
        .await;

        let mut reader = EffectReader::open("truncate", &path).await.unwrap();
        assert_eq!(reader.next_frame().await.unwrap().len(), 2);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_row_is_grammar_error() {
        let path = effect_file(
            "grammar",
            "{\"frame_delay_ms\":10,\"light_count\":2,\"colors\":[\"#ff0000\"]}\n0,x2\n",
        )
        .await;

        let mut reader = EffectReader::open("grammar", &path).await.unwrap();
        match reader.next_frame().await {
            Err(CodecError::Grammar(token)) => assert_eq!(token, "x2"),
            other => panic!("unexpected result: {:?}", other),
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_index() {
        let path = effect_file(
            "range",
            "{\"frame_delay_ms\":10,\"light_count\":2,\"colors\":[\"#ff0000\"]}\n0,3\n",
        )
        .await;

        let mut reader = EffectReader::open("range", &path).await.unwrap();
        match reader.next_frame().await {
            Err(CodecError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 3);
                assert_eq!(len, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_only_file_is_empty() {
        let path = effect_file(
            "empty",
            "{\"frame_delay_ms\":10,\"light_count\":2,\"colors\":[]}\n",
        )
        .await;

        let mut reader = EffectReader::open("empty", &path).await.unwrap();
        match reader.next_frame().await {
            Err(CodecError::EmptyBody) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_encode_decode_round_trip() {
        let palette = [
            Color::rgb8(255, 0, 0),
            Color::rgb8(0, 255, 0),
            Color::rgb8(0, 0, 255),
            Color::rgb8(255, 255, 255),
        ];

        // Mix of runs and distinct rows, including consecutive duplicates
        let mut frames = Vec::new();
        for frame in 0..12 {
            let row: Vec<Color> = (0..5).map(|i| palette[(frame / 3 + i) % 4]).collect();
            frames.push(row);
        }

        let mut encoded = Vec::new();
        encode(&mut encoded, &frames, 20, 5).unwrap();

        let path = effect_file("roundtrip", std::str::from_utf8(&encoded).unwrap()).await;
        let mut reader = EffectReader::open("roundtrip", &path).await.unwrap();

        // One full pass reproduces the quantized input exactly
        for expected in &frames {
            let decoded = reader.next_frame().await.unwrap();
            let decoded: Vec<u32> = decoded.iter().map(|c| c.to_packed()).collect();
            let expected: Vec<u32> = expected.iter().map(|c| c.to_packed()).collect();
            assert_eq!(decoded, expected);
        }

        // And the next frame wraps around to the first one
        let wrapped: Vec<u32> = reader
            .next_frame()
            .await
            .unwrap()
            .iter()
            .map(|c| c.to_packed())
            .collect();
        let first: Vec<u32> = frames[0].iter().map(|c| c.to_packed()).collect();
        assert_eq!(wrapped, first);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
