//! Maps a compression request onto `basisu` command lines

use crate::models::types::{
    CompressionMode, CompressionRequest, TextureType, DEFAULT_LAMBDA, DEFAULT_LEVEL,
    DEFAULT_QUALITY, DEFAULT_RDO_QUALITY,
};
use std::fmt;
use std::path::{Path, PathBuf};

/// One compressor invocation: program plus argv, never passed through a shell.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorCommand {
    program: PathBuf,
    args: Vec<String>,
    output_file: String,
}

impl CompressorCommand {
    pub fn new(program: PathBuf, args: Vec<String>, output_file: String) -> Self {
        Self {
            program,
            args,
            output_file,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// File name (relative to the working directory) the compressor is asked to write.
    pub fn output_file(&self) -> &str {
        &self.output_file
    }
}

impl fmt::Display for CompressorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// `1.0` stays `1.0` so the flag reads the same as the documented default.
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary: PathBuf,
}

impl CommandBuilder {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Mode-specific flags. Only the fields relevant to `request.mode` are read.
    pub fn mode_flags(request: &CompressionRequest) -> Vec<String> {
        let mut flags: Vec<String> = match &request.mode {
            CompressionMode::Etc1s => vec![
                "-q".into(),
                request.quality.unwrap_or(DEFAULT_QUALITY).to_string(),
            ],
            CompressionMode::Uastc => vec!["-uastc".into()],
            CompressionMode::UastcRdo => vec![
                "-uastc".into(),
                "-uastc_rdo_l".into(),
                format_decimal(request.rdo_quality.unwrap_or(DEFAULT_RDO_QUALITY)),
            ],
            CompressionMode::Hdr4x4 => vec!["-hdr".into()],
            CompressionMode::Hdr6x6 => vec![
                "-hdr_6x6".into(),
                "-lambda".into(),
                request.lambda.unwrap_or(DEFAULT_LAMBDA).to_string(),
                "-hdr_6x6_level".into(),
                request.level.unwrap_or(DEFAULT_LEVEL).to_string(),
            ],
            CompressionMode::Hdr6x6i => vec![
                "-hdr_6x6i".into(),
                "-lambda".into(),
                request.lambda.unwrap_or(DEFAULT_LAMBDA).to_string(),
                "-hdr_6x6i_level".into(),
                request.level.unwrap_or(DEFAULT_LEVEL).to_string(),
            ],
            CompressionMode::Unrecognized(_) => {
                vec!["-q".into(), DEFAULT_QUALITY.to_string()]
            }
        };

        if request.generate_mipmaps {
            flags.push("-mipmap".into());
        }
        flags
    }

    /// Command writing `{input stem}.{container}` next to `input_file`.
    pub fn build(
        &self,
        request: &CompressionRequest,
        input_file: &str,
        container: TextureType,
    ) -> CompressorCommand {
        let stem = Path::new(input_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_file.to_string());
        let output_file = format!("{}.{}", stem, container.extension());

        let mut args = Self::mode_flags(request);
        args.push(container.flag().to_string());
        args.push("-output_file".to_string());
        args.push(output_file.clone());
        args.push(input_file.to_string());

        CompressorCommand::new(self.binary.clone(), args, output_file)
    }

    /// The two invocations issued per request: `.basis` first, then `.ktx2`.
    pub fn build_pair(
        &self,
        request: &CompressionRequest,
        input_file: &str,
    ) -> [CompressorCommand; 2] {
        TextureType::ALL.map(|container| self.build(request, input_file, container))
    }
}
