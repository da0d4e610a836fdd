// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleanup of raw microphone recordings before they become masters.
//!
//! Every preset folds the input down to a centered stereo signal, then
//! applies its own equalizer, compander and limiter settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::encode::{Invocation, SharedTool, TemplateValues, render};
use crate::error::PreprocessError;

pub const DEFAULT_PREFIX: &str = "preprocessed-";

pub const PREPROCESS_TEMPLATE: &str =
    "{{ffmpeg}} -y -i {{input}} -vn -ac 2 -filter_complex {{filter}} {{output}}";

const DOWNMIX: &str = "pan=stereo|c0<.5*c0+.5*c1|c1<.5*c0+.5*c1";

const LIMITER: &str = "alimiter=limit=0.7943282347242815:level=disabled";

const VOICE_EQ: &str = "firequalizer=gain_entry='entry(100,0); entry(200,-6); entry(300,-6); \
    entry(500,-6); entry(600,0); entry(1000,-2); entry(1200,0);entry(7000,0); entry(8000,2); \
    entry(16000,6); entry(20000,0)'";

/// Filter chains for different microphones and rooms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Preset {
    #[default]
    Sm7b,
    Qzj,
    Aggressive,
    Heavy,
    QzjPodmic,
    QzjPodmic2,
    Lowcut,
    /// Downmix only
    None,
}

impl Preset {
    pub const ALL: [Preset; 8] = [
        Preset::Sm7b,
        Preset::Qzj,
        Preset::Aggressive,
        Preset::Heavy,
        Preset::QzjPodmic,
        Preset::QzjPodmic2,
        Preset::Lowcut,
        Preset::None,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Sm7b => "sm7b",
            Preset::Qzj => "qzj",
            Preset::Aggressive => "aggressive",
            Preset::Heavy => "heavy",
            Preset::QzjPodmic => "qzj-podmic",
            Preset::QzjPodmic2 => "qzj-podmic2",
            Preset::Lowcut => "lowcut",
            Preset::None => "none",
        }
    }

    /// Filters applied after the downmix
    fn stages(&self) -> Vec<&'static str> {
        match self {
            Preset::Sm7b => vec![
                "highpass=80",
                "lowpass=18000",
                VOICE_EQ,
                "compand=attacks=.01:decays=.1:points=-90/-900|-57/-57|-27/-12|-3/-3|0/-3|20/-3:soft-knee=2",
                LIMITER,
            ],
            Preset::Qzj => vec![
                "highpass=80",
                "lowpass=18000",
                VOICE_EQ,
                "compand=attacks=.01:decays=.1:points=-90/-900|-57/-57|-27/-9|-3/-3|0/-3|20/-3:soft-knee=2",
                LIMITER,
            ],
            Preset::Aggressive => vec![
                "firequalizer=gain_entry='entry(0,-90); entry(50,0); entry(80,0); entry(125,-20); \
                 entry(200,0); entry(250,-9); entry(300,-6); entry(1000,0); entry(1400,-3); \
                 entry(1700,0); entry(7000,0); entry(10000,+3); entry(13000,+3); entry(16000,+3); \
                 entry(18000,-12)'",
                "compand=attacks=.01:decays=.1:points=-90/-900|-57/-57|-27/-9|-3/-3|0/-3|20/-3:soft-knee=2",
                "firequalizer=gain_entry='entry(80, 0); entry(130,-2); entry(180,0)'",
                LIMITER,
            ],
            Preset::Heavy => vec![
                "compand=attacks=.01:decays=.1:points=-90/-900|-80/-90|-57/-57|-27/-9|0/-2|20/-2:soft-knee=12",
                LIMITER,
            ],
            Preset::QzjPodmic => vec![
                "firequalizer=gain_entry='entry(125, +2); entry(250, 0); entry(500, -2); \
                 entry(1000, 0); entry(2000, 1); entry(4000, 1); entry(8000, 0); entry(15000, -5)'",
                "compand=attacks=.01:decays=.1:points=-90/-900|-57/-57|-27/-7|-3/-3|0/-3|20/-3:soft-knee=2",
                LIMITER,
            ],
            Preset::QzjPodmic2 => {
                vec!["firequalizer=gain_entry='entry(90,2); entry(538,-3); entry(12000,-2)'"]
            }
            Preset::Lowcut => vec![
                "firequalizer=gain_entry='entry(130,-5); entry(250, 0)'",
                "compand=attacks=.01:decays=.1:points=-90/-900|-57/-57|-27/-7|-3/-3|0/-3|20/-3:soft-knee=2",
                LIMITER,
            ],
            Preset::None => Vec::new(),
        }
    }

    /// The complete `-filter_complex` argument
    pub fn filter(&self) -> String {
        let mut chain = vec![DOWNMIX];
        chain.extend(self.stages());
        chain.join(",")
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| PreprocessError::UnknownPreset {
                name: s.to_string(),
            })
    }
}

/// Runs recordings through a preset's filter chain with ffmpeg
pub struct Preprocessor {
    tool: SharedTool,
    ffmpeg: String,
    preset: Preset,
    prefix: String,
}

impl Preprocessor {
    pub fn new(tool: SharedTool, ffmpeg: impl Into<String>) -> Self {
        Self {
            tool,
            ffmpeg: ffmpeg.into(),
            preset: Preset::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Empty prefixes keep the default, so inputs are never overwritten
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix;
        }
        self
    }

    /// Where the processed copy of `input` is written
    pub fn output_path(&self, input: &Path) -> Result<PathBuf, PreprocessError> {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PreprocessError::InvalidInput {
                path: input.to_path_buf(),
            })?;
        Ok(input.with_file_name(format!("{}{name}", self.prefix)))
    }

    /// Process every input in order, stopping at the first failure.
    /// Returns the written files.
    pub async fn process(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PreprocessError> {
        if inputs.is_empty() {
            return Err(PreprocessError::NoInputs);
        }

        let filter = self.preset.filter();
        let mut outputs = Vec::with_capacity(inputs.len());

        for input in inputs {
            let output = self.output_path(input)?;
            let values = TemplateValues::new()
                .with("ffmpeg", self.ffmpeg.clone())
                .with("input", input.to_string_lossy())
                .with("output", output.to_string_lossy())
                .with("filter", filter.clone());
            let command_line = render(PREPROCESS_TEMPLATE, &values)?;

            info!(
                input = %input.display(),
                output = %output.display(),
                preset = %self.preset,
                "preprocessing"
            );

            // Paths are as given on the command line, so stay in the current directory
            let invocation = Invocation::new(command_line, ".").producing(&output);
            self.tool
                .run(&invocation)
                .await
                .map_err(|e| PreprocessError::Tool {
                    path: input.clone(),
                    source: e,
                })?;

            outputs.push(output);
        }

        info!(count = outputs.len(), "preprocessed");
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ExternalTool;
    use crate::error::ToolError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTool {
        commands: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl ExternalTool for RecordingTool {
        async fn run(&self, invocation: &Invocation) -> Result<(), ToolError> {
            self.commands.lock().unwrap().push(invocation.clone());
            Ok(())
        }

        async fn capture(&self, _invocation: &Invocation) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    #[test]
    fn preset_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(preset.name().parse::<Preset>().unwrap(), preset);
        }
        assert_eq!("QZJ-Podmic".parse::<Preset>().unwrap(), Preset::QzjPodmic);
        assert!(matches!(
            "studio".parse::<Preset>(),
            Err(PreprocessError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn filters_start_with_downmix_and_never_dangle() {
        for preset in Preset::ALL {
            let filter = preset.filter();
            assert!(filter.starts_with("pan=stereo|"), "{preset}");
            assert!(!filter.ends_with(','), "{preset}");
        }
        assert_eq!(Preset::None.filter(), DOWNMIX);
        assert!(Preset::Sm7b.filter().ends_with(LIMITER));
        assert!(Preset::Sm7b.filter().contains("-27/-12"));
        assert!(Preset::Qzj.filter().contains("-27/-9"));
    }

    #[test]
    fn output_gets_prefixed_file_name() {
        let pre = Preprocessor::new(Arc::new(RecordingTool::default()), "ffmpeg");
        assert_eq!(
            pre.output_path(Path::new("raw/host.wav")).unwrap(),
            PathBuf::from("raw/preprocessed-host.wav")
        );

        let pre = pre.with_prefix("clean-").with_prefix("");
        assert_eq!(
            pre.output_path(Path::new("guest.wav")).unwrap(),
            PathBuf::from("clean-guest.wav")
        );
    }

    #[tokio::test]
    async fn process_runs_ffmpeg_per_input() {
        let tool = Arc::new(RecordingTool::default());
        let pre = Preprocessor::new(tool.clone(), "/opt/ffmpeg").with_preset(Preset::Heavy);

        let outputs = pre
            .process(&[PathBuf::from("a.wav"), PathBuf::from("b c.wav")])
            .await
            .unwrap();

        assert_eq!(
            outputs,
            vec![
                PathBuf::from("preprocessed-a.wav"),
                PathBuf::from("preprocessed-b c.wav")
            ]
        );

        let commands = tool.commands.lock().unwrap();
        assert_eq!(commands.len(), 2);
        let words = shlex::split(&commands[1].command_line).unwrap();
        assert_eq!(words[0], "/opt/ffmpeg");
        assert_eq!(words[3], "b c.wav");
        assert_eq!(words[words.len() - 2], Preset::Heavy.filter());
        assert_eq!(words.last().unwrap(), "preprocessed-b c.wav");
    }

    #[tokio::test]
    async fn nothing_to_process_is_an_error() {
        let pre = Preprocessor::new(Arc::new(RecordingTool::default()), "ffmpeg");
        assert!(matches!(
            pre.process(&[]).await,
            Err(PreprocessError::NoInputs)
        ));
    }
}
