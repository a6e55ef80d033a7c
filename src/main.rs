use std::process::ExitCode;

use clap::Parser;
use log::info;

use oorgen::cli::{Config, RawArgs};
use oorgen::{emit, generate};

fn run() -> Result<(), oorgen::OorgenError> {
    let args = RawArgs::parse();
    let config = Config::from_args(args)?;

    if !config.quiet {
        info!("generating with seed={} bit_mode={:?} std={}", config.seed, config.bit_mode, config.std);
    }

    let program = generate(config.seed, config.bit_mode, config.std)?;

    let checksum = emit::predetermined_checksum(&program);
    let declarations = emit::emit_declarations(&program, config.bit_mode);
    let functions = emit::emit_functions(&program, config.bit_mode);
    let main_text = emit::emit_main(&program, config.bit_mode, checksum);

    let out_dir = std::path::Path::new(&config.out_dir);
    std::fs::write(out_dir.join("oorgen_decls.c"), declarations)
        .map_err(|e| oorgen::OorgenError::Config(format!("writing declarations: {}", e)))?;
    std::fs::write(out_dir.join("oorgen_funcs.c"), functions)
        .map_err(|e| oorgen::OorgenError::Config(format!("writing functions: {}", e)))?;
    std::fs::write(out_dir.join("oorgen_main.c"), main_text)
        .map_err(|e| oorgen::OorgenError::Config(format!("writing main: {}", e)))?;

    if !config.quiet {
        info!("wrote 3 artifacts to {}", config.out_dir);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("oorgen: {}", e);
            ExitCode::from(255)
        }
    }
}
