//! Video transcoding and thumbnails via ffmpeg.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tracing::{info, warn};

use super::config::ToolsConfig;
use super::error::ProcessorError;
use super::sink::OutputSink;
use super::tools::{check_tool, path_arg, run_tool};
use super::traits::Processor;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};

pub const OP_TO_MP4: &str = "video_to_mp4";
pub const OP_THUMBNAIL: &str = "generate_thumbnail";

/// FFmpeg-backed video processor.
pub struct VideoProcessor {
    config: ToolsConfig,
}

impl VideoProcessor {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// Builds ffmpeg arguments for an H.264/AAC MP4 transcode.
    fn build_mp4_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-i".to_string(), path_arg(input)];
        args.extend(
            [
                "-c:v", "libx264", "-preset", "medium", "-pix_fmt", "yuv420p", "-c:a", "aac",
                "-movflags", "+faststart",
            ]
            .map(String::from),
        );
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);
        args.push(path_arg(output));
        args
    }

    /// Builds ffmpeg arguments grabbing one JPEG frame at `offset_secs`.
    fn build_thumbnail_args(&self, input: &Path, output: &Path, offset_secs: f64) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", offset_secs),
            "-i".to_string(),
            path_arg(input),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            path_arg(output),
        ]
    }

    /// Probes the container duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>, ProcessorError> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            path_arg(path),
        ];
        let output = run_tool(
            "ffprobe",
            &self.config.ffprobe_path,
            &args,
            self.config.timeout_secs,
        )
        .await?;
        Ok(parse_probe_duration(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn transcode(
        &self,
        input: &Path,
        scratch: &Path,
        base_name: &str,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let output = scratch.join("output.mp4");
        let args = self.build_mp4_args(input, &output);
        run_tool("ffmpeg", &self.config.ffmpeg_path, &args, self.config.timeout_secs).await?;

        let locator = sink
            .put_file(&format!("{}_converted.mp4", base_name), &output)
            .await?;
        Ok(ProcessOutput::single(locator))
    }

    async fn thumbnail(
        &self,
        input: &Path,
        scratch: &Path,
        base_name: &str,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let duration = match self.probe_duration(input).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!(error = %e, "Could not probe duration, using configured offset");
                None
            }
        };
        let offset = thumbnail_offset(self.config.thumbnail_offset_secs, duration);

        let output = scratch.join("thumb.jpg");
        let args = self.build_thumbnail_args(input, &output, offset);
        run_tool("ffmpeg", &self.config.ffmpeg_path, &args, self.config.timeout_secs).await?;

        if !tokio::fs::try_exists(&output).await? {
            return Err(ProcessorError::tool_failed(
                "ffmpeg",
                "no frame was extracted",
                None,
            ));
        }

        let locator = sink
            .put_file(&format!("thumb_{}.jpg", base_name), &output)
            .await?;
        Ok(ProcessOutput::single(locator))
    }
}

/// Parses `format.duration` out of ffprobe JSON.
fn parse_probe_duration(output: &str) -> Option<f64> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }

    serde_json::from_str::<ProbeOutput>(output)
        .ok()?
        .format
        .duration?
        .parse()
        .ok()
}

/// Clamps the requested offset to half the clip so short clips still yield
/// a frame.
fn thumbnail_offset(requested: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d > 0.0 && requested >= d => d / 2.0,
        _ => requested.max(0.0),
    }
}

/// Spools the request input into `dir`, keeping its extension for ffmpeg's
/// format detection.
pub(crate) async fn spool_input(
    request: &mut ProcessRequest,
    dir: &Path,
) -> Result<std::path::PathBuf, ProcessorError> {
    let ext = request.input_extension().unwrap_or_else(|| "bin".to_string());
    let path = dir.join(format!("input.{}", ext));
    let mut file = File::create(&path).await?;
    tokio::io::copy(&mut request.input, &mut file).await?;
    Ok(path)
}

#[async_trait]
impl Processor for VideoProcessor {
    fn name(&self) -> &str {
        "video"
    }

    fn routes(&self) -> Vec<MatchRule> {
        vec![MatchRule::prefix("video_"), MatchRule::exact(OP_THUMBNAIL)]
    }

    fn operations(&self) -> &[&'static str] {
        &[OP_TO_MP4, OP_THUMBNAIL]
    }

    async fn process(
        &self,
        mut request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError> {
        let operation = request.operation.clone();
        if operation != OP_TO_MP4 && operation != OP_THUMBNAIL {
            return Err(ProcessorError::unsupported(self.name(), operation));
        }

        let scratch = self.config.scratch("transmute-video-")?;
        let input = spool_input(&mut request, scratch.path()).await?;

        let result = if operation == OP_TO_MP4 {
            self.transcode(&input, scratch.path(), &request.base_name, sink)
                .await
        } else {
            self.thumbnail(&input, scratch.path(), &request.base_name, sink)
                .await
        };

        if let Ok(output) = &result {
            info!(operation = %operation, outputs = output.outputs.len(), "Video processed");
        }
        result
    }

    async fn validate(&self) -> Result<(), ProcessorError> {
        check_tool("ffmpeg", &self.config.ffmpeg_path, "-version").await?;
        check_tool("ffprobe", &self.config.ffprobe_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockArtifactStore;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn processor() -> VideoProcessor {
        VideoProcessor::new(ToolsConfig::default())
    }

    #[test]
    fn test_build_mp4_args() {
        let args = processor().build_mp4_args(Path::new("/in.avi"), Path::new("/out.mp4"));

        assert_eq!(&args[..3], &["-y", "-i", "/in.avi"]);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert_eq!(args.last().map(String::as_str), Some("/out.mp4"));
    }

    #[test]
    fn test_build_thumbnail_args() {
        let args =
            processor().build_thumbnail_args(Path::new("/in.mp4"), Path::new("/t.jpg"), 2.0);

        assert!(args.windows(2).any(|w| w == ["-ss", "2.000"]));
        assert!(args.windows(2).any(|w| w == ["-frames:v", "1"]));
        // Seeking before -i is the fast input seek.
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
    }

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "x.mp4", "duration": "12.480000"}}"#;
        assert_eq!(parse_probe_duration(json), Some(12.48));
        assert_eq!(parse_probe_duration(r#"{"format": {}}"#), None);
        assert_eq!(parse_probe_duration("garbage"), None);
    }

    #[test]
    fn test_thumbnail_offset_clamps_short_clips() {
        assert_eq!(thumbnail_offset(2.0, Some(10.0)), 2.0);
        assert_eq!(thumbnail_offset(2.0, Some(1.0)), 0.5);
        assert_eq!(thumbnail_offset(2.0, None), 2.0);
        assert_eq!(thumbnail_offset(-1.0, None), 0.0);
    }

    #[test]
    fn test_routes() {
        let routes = processor().routes();
        assert!(routes.contains(&MatchRule::prefix("video_")));
        assert!(routes.contains(&MatchRule::exact("generate_thumbnail")));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_fails_with_tool_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let config = ToolsConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..ToolsConfig::default()
        }
        .with_scratch_dir(scratch.path().to_path_buf());
        let sink = OutputSink::new(Arc::new(MockArtifactStore::new()));
        let request = ProcessRequest {
            operation: OP_TO_MP4.to_string(),
            base_name: "job".to_string(),
            original_name: "clip.avi".to_string(),
            params: None,
            input: Box::new(std::io::Cursor::new(b"video".to_vec())),
        };

        let err = VideoProcessor::new(config)
            .process(request, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ToolNotFound { .. }));
        // Scratch directory cleaned up on the error path.
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_spool_input_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = ProcessRequest {
            operation: OP_TO_MP4.to_string(),
            base_name: "job".to_string(),
            original_name: "Clip.MOV".to_string(),
            params: None,
            input: Box::new(std::io::Cursor::new(b"frames".to_vec())),
        };

        let path = spool_input(&mut request, dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "input.mov");
        assert_eq!(std::fs::read(path).unwrap(), b"frames");
    }
}
