//! Command-line and environment configuration

use clap::Parser;
use pdfrename_core::{DanglingReferences, PipelineOptions, ReaderOptions, RenameOptions};

/// 25 MiB of JSON, enough for a ~18 MiB PDF after base64 expansion
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Command-line arguments for the pdfrename server
#[derive(Parser, Debug, Clone)]
#[command(name = "pdfrename-api")]
#[command(about = "HTTP API for listing and renaming PDF form fields")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Ask viewers to regenerate appearance streams after a rename
    #[arg(long, env = "NEED_APPEARANCES")]
    pub need_appearances: bool,

    /// Treat references to missing objects as null instead of rejecting the PDF
    #[arg(long, env = "NULLIFY_DANGLING_REFS")]
    pub nullify_dangling_refs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn pipeline_options(&self) -> PipelineOptions {
        let dangling_references = if self.nullify_dangling_refs {
            DanglingReferences::Nullify
        } else {
            DanglingReferences::Reject
        };
        PipelineOptions {
            reader: ReaderOptions {
                dangling_references,
            },
            rename: RenameOptions {
                need_appearances: self.need_appearances,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["pdfrename-api"]);
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(args.pipeline_options(), PipelineOptions::default());
    }

    #[test]
    fn test_flags_map_to_pipeline_options() {
        let args = Args::parse_from([
            "pdfrename-api",
            "--port",
            "8080",
            "--need-appearances",
            "--nullify-dangling-refs",
        ]);
        assert_eq!(args.port, 8080);
        let options = args.pipeline_options();
        assert!(options.rename.need_appearances);
        assert_eq!(
            options.reader.dangling_references,
            DanglingReferences::Nullify
        );
    }
}
