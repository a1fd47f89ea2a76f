//! Command-line interface for writeforge.
//!
//! Provides the `generate` and `judge` commands.

mod commands;

pub use commands::{
    execute_generate, parse_cli, run, run_with_cli, Cli, Commands, EndpointArgs, GenerateArgs, GenerateOutput,
    JudgeArgs,
};
