//! Slideshow videos from a zip of images.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::archive::{extract_matching, has_extension, ExtractedEntry};
use super::config::ToolsConfig;
use super::error::ProcessorError;
use super::sink::OutputSink;
use super::tools::{check_tool, path_arg, run_tool};
use super::traits::Processor;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};

pub const OP_CREATE_SLIDESHOW: &str = "create_slideshow";

pub const DEFAULT_SLIDE_SECS: u32 = 3;
const SLIDE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const FRAME_WIDTH: u32 = 1280;
const FRAME_HEIGHT: u32 = 720;

/// Builds an H.264 slideshow with ffmpeg's concat demuxer.
pub struct SlideshowProcessor {
    config: ToolsConfig,
}

/// Per-slide duration from params: a positive integer, otherwise the default.
pub fn parse_slide_duration(params: Option<&str>) -> u32 {
    params
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SLIDE_SECS)
}

fn escape_concat_path(path: &Path) -> String {
    path_arg(path).replace('\'', r"'\''")
}

/// Concat demuxer script showing each slide for `secs`.
///
/// The last file is listed twice; the demuxer ignores the final
/// `duration` otherwise.
fn concat_script(slides: &[ExtractedEntry], secs: u32) -> String {
    let mut script = String::from("ffconcat version 1.0\n");
    for slide in slides {
        script.push_str(&format!(
            "file '{}'\nduration {}\n",
            escape_concat_path(&slide.path),
            secs
        ));
    }
    if let Some(last) = slides.last() {
        script.push_str(&format!("file '{}'\n", escape_concat_path(&last.path)));
    }
    script
}

impl SlideshowProcessor {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, script: &Path, output: &Path) -> Vec<String> {
        let filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,format=yuv420p",
            w = FRAME_WIDTH,
            h = FRAME_HEIGHT
        );
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(script),
            "-vf".to_string(),
            filter,
            "-r".to_string(),
            self.config.slideshow_fps.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            path_arg(output),
        ]
    }
}

#[async_trait]
impl Processor for SlideshowProcessor {
    fn name(&self) -> &str {
        "slideshow"
    }

    fn routes(&self) -> Vec<MatchRule> {
        vec![MatchRule::exact(OP_CREATE_SLIDESHOW)]
    }

    fn operations(&self) -> &[&'static str] {
        &[OP_CREATE_SLIDESHOW]
    }

    async fn process(
        &self,
        mut request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        if request.operation != OP_CREATE_SLIDESHOW {
            return Err(ProcessorError::unsupported(self.name(), request.operation));
        }

        let secs = parse_slide_duration(request.params.as_deref());
        let data = request.read_input().await?;
        let scratch = self.config.scratch("transmute-slideshow-")?;

        let slides_dir = scratch.path().join("slides");
        tokio::fs::create_dir_all(&slides_dir).await?;
        let slides = tokio::task::spawn_blocking(move || {
            extract_matching(&data, &slides_dir, |name| {
                has_extension(name, &SLIDE_EXTENSIONS)
            })
        })
        .await??;
        if slides.is_empty() {
            return Err(ProcessorError::invalid_input(
                "no image files (.jpg, .png) found in archive",
            ));
        }

        let script = scratch.path().join("slides.ffconcat");
        tokio::fs::write(&script, concat_script(&slides, secs)).await?;

        let output = scratch.path().join("slideshow.mp4");
        let args = self.build_args(&script, &output);
        run_tool("ffmpeg", &self.config.ffmpeg_path, &args, self.config.timeout_secs).await?;

        let output_name = format!("{}_slideshow.mp4", request.base_name);
        let locator = sink.put_file(&output_name, &output).await?;
        info!(slides = slides.len(), slide_secs = secs, output = %output_name, "Slideshow rendered");
        Ok(ProcessOutput::single(locator))
    }

    async fn validate(&self) -> Result<(), ProcessorError> {
        check_tool("ffmpeg", &self.config.ffmpeg_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockArtifactStore};
    use std::path::PathBuf;
    use std::sync::Arc;

    #[test]
    fn test_parse_slide_duration() {
        assert_eq!(parse_slide_duration(Some("5")), 5);
        assert_eq!(parse_slide_duration(Some(" 7 ")), 7);
        assert_eq!(parse_slide_duration(Some("abc")), DEFAULT_SLIDE_SECS);
        assert_eq!(parse_slide_duration(Some("0")), DEFAULT_SLIDE_SECS);
        assert_eq!(parse_slide_duration(Some("-2")), DEFAULT_SLIDE_SECS);
        assert_eq!(parse_slide_duration(None), DEFAULT_SLIDE_SECS);
    }

    #[test]
    fn test_concat_script_repeats_last_slide() {
        let slides = vec![
            ExtractedEntry {
                name: "a.jpg".to_string(),
                path: PathBuf::from("/s/0000-a.jpg"),
            },
            ExtractedEntry {
                name: "b.png".to_string(),
                path: PathBuf::from("/s/0001-b's.png"),
            },
        ];

        let script = concat_script(&slides, 4);
        let lines: Vec<_> = script.lines().collect();
        assert_eq!(lines[0], "ffconcat version 1.0");
        assert_eq!(lines[1], "file '/s/0000-a.jpg'");
        assert_eq!(lines[2], "duration 4");
        assert_eq!(lines[3], r"file '/s/0001-b'\''s.png'");
        assert_eq!(lines.last(), Some(&r"file '/s/0001-b'\''s.png'"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_build_args_uses_fps() {
        let processor = SlideshowProcessor::new(ToolsConfig {
            slideshow_fps: 30,
            ..ToolsConfig::default()
        });
        let args = processor.build_args(Path::new("/s/list"), Path::new("/s/out.mp4"));

        assert!(args.windows(2).any(|w| w == ["-f", "concat"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
        assert!(args.iter().any(|a| a.contains("pad=1280:720")));
    }

    #[tokio::test]
    async fn test_archive_without_images_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let processor = SlideshowProcessor::new(
            ToolsConfig::default().with_scratch_dir(scratch.path().to_path_buf()),
        );
        let sink = OutputSink::new(Arc::new(MockArtifactStore::new()));
        let request = ProcessRequest {
            operation: OP_CREATE_SLIDESHOW.to_string(),
            base_name: "show".to_string(),
            original_name: "show.zip".to_string(),
            params: Some("2".to_string()),
            input: Box::new(std::io::Cursor::new(fixtures::zip_archive(&[(
                "song.mp3",
                b"audio".as_slice(),
            )]))),
        };

        let err = processor.process(request, &sink).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("no image files (.jpg, .png) found in archive"));
    }
}
