//! CLI surface, built with `clap` derive. Seed/`--std` validation
//! lives here so `main.rs` stays a thin wire-up with small, focused entry
//! points.

use clap::{ArgAction, Parser};

use crate::error::{OorgenError, Result};
use crate::lang::LangStd;
use crate::typed_val::BitMode;

/// Tool version advertised by `-v`/`--version` and checked against the
/// `VV` prefix of a `VV_SSS`-form seed.
pub const VERSION: &str = "0.1";

#[derive(Parser, Debug)]
#[command(
    name = "oorgen",
    version = VERSION,
    about = "Deterministic random generator of valid C/C++/OpenCL test programs",
    disable_version_flag = true
)]
pub struct RawArgs {
    /// Print version and exit (`-v`/`--version`).
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Suppress non-error output.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Output directory; must already exist.
    #[arg(short = 'd', long = "out-dir")]
    pub out_dir: Option<String>,

    /// Seed, as `SSS` or `VV_SSS` (`VV` must equal the tool's plain version).
    #[arg(short = 's', long = "seed")]
    pub seed: Option<String>,

    /// `32` or `64`; selects `long`/pointer width.
    #[arg(short = 'm', long = "bit-mode", default_value_t = 64)]
    pub bit_mode: u32,

    /// Target language standard (see `LangStd`).
    #[arg(long = "std", default_value = "c99")]
    pub std: String,
}

/// Parsed and validated CLI configuration. Construction is the
/// only place `ConfigError` originates.
#[derive(Debug)]
pub struct Config {
    pub quiet: bool,
    pub out_dir: String,
    pub seed: u64,
    pub bit_mode: BitMode,
    pub std: LangStd,
}

/// Parses `SSS` or `VV_SSS`; in the latter form `VV` must equal [`VERSION`]
/// with its `.` stripped ("mismatch is fatal").
fn parse_seed(raw: &str) -> Result<u64> {
    if let Some((vv, sss)) = raw.split_once('_') {
        let expected_vv: String = VERSION.chars().filter(|c| *c != '.').collect();
        if vv != expected_vv {
            return Err(OorgenError::Config(format!(
                "seed version prefix '{}' does not match tool version '{}'",
                vv, expected_vv
            )));
        }
        sss.parse::<u64>().map_err(|e| OorgenError::Config(format!("invalid seed '{}': {}", raw, e)))
    } else {
        raw.parse::<u64>().map_err(|e| OorgenError::Config(format!("invalid seed '{}': {}", raw, e)))
    }
}

fn parse_bit_mode(raw: u32) -> Result<BitMode> {
    match raw {
        32 => Ok(BitMode::Bits32),
        64 => Ok(BitMode::Bits64),
        other => Err(OorgenError::Config(format!("unsupported bit-mode '{}': expected 32 or 64", other))),
    }
}

impl Config {
    pub fn from_args(args: RawArgs) -> Result<Config> {
        let out_dir = args.out_dir.ok_or_else(|| OorgenError::Config("--out-dir is required".to_string()))?;
        if !std::path::Path::new(&out_dir).is_dir() {
            return Err(OorgenError::Config(format!("out-dir '{}' does not exist", out_dir)));
        }
        let seed = match args.seed {
            Some(s) => parse_seed(&s)?,
            None => return Err(OorgenError::Config("--seed is required".to_string())),
        };
        let bit_mode = parse_bit_mode(args.bit_mode)?;
        let std = LangStd::parse(&args.std).ok_or_else(|| OorgenError::Config(format!("unknown --std '{}'", args.std)))?;
        Ok(Config { quiet: args.quiet, out_dir, seed, bit_mode, std })
    }
}
