//! # Base Engine Boundary
//!
//! The base engine owns its own arguments. The resolver only needs two things
//! from it: the flags it recognizes (to route tokens) and a way to turn its
//! share of the tokens into a validated configuration.
//!
//! [`ClapEngine`] adapts any `clap::Parser + validator::Validate` type to
//! [`BaseEngine`]; [`EngineArgs`] is the argument set shipped with the worker.

use std::marker::PhantomData;

use clap::{CommandFactory, Parser};
use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// A long flag recognized by the base engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseFlag {
    /// Name without the leading `--`.
    pub name: String,
    /// Whether the flag consumes the following token.
    pub takes_value: bool
}

/// The base engine as seen by the resolver.
pub trait BaseEngine {
    type Config;
    type Error: std::error::Error + 'static;

    /// Every long flag the engine accepts.
    fn flags(&self) -> Vec<BaseFlag>;

    /// Parse and validate the engine's share of the tokens.
    fn build(&self, tokens: &[String]) -> Result<Self::Config, Self::Error>;
}

/// Engine-side failure: either clap rejected the tokens or the parsed
/// arguments failed validation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("Invalid engine arguments: {0}")]
    Invalid(#[from] ValidationErrors)
}

/// [`BaseEngine`] backed by a clap derive type.
pub struct ClapEngine<T> {
    bin_name: &'static str,
    _args: PhantomData<fn() -> T>
}

impl<T> ClapEngine<T> {
    pub fn new(bin_name: &'static str) -> Self {
        Self {
            bin_name,
            _args: PhantomData
        }
    }
}

impl<T> Default for ClapEngine<T> {
    fn default() -> Self {
        Self::new("engine")
    }
}

impl<T> std::fmt::Debug for ClapEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClapEngine")
            .field("bin_name", &self.bin_name)
            .finish()
    }
}

impl<T: CommandFactory> ClapEngine<T> {
    /// The engine's clap command, for help rendering.
    pub fn command(&self) -> clap::Command {
        T::command().name(self.bin_name)
    }
}

impl<T: Parser + Validate> BaseEngine for ClapEngine<T> {
    type Config = T;
    type Error = EngineError;

    fn flags(&self) -> Vec<BaseFlag> {
        T::command()
            .get_arguments()
            .filter_map(|arg| {
                arg.get_long().map(|long| BaseFlag {
                    name: long.to_string(),
                    takes_value: arg.get_action().takes_values()
                })
            })
            .collect()
    }

    fn build(&self, tokens: &[String]) -> Result<T, EngineError> {
        let argv = std::iter::once(self.bin_name.to_string()).chain(tokens.iter().cloned());
        let args = T::try_parse_from(argv)?;
        args.validate()?;
        Ok(args)
    }
}

/// Base inference engine arguments.
#[derive(Debug, Clone, PartialEq, Parser, Serialize, Validate)]
#[command(
    name = "engine",
    about = "Base inference engine arguments",
    args_override_self = true
)]
pub struct EngineArgs {
    /// Name or path of the model to serve.
    #[arg(long, default_value = "facebook/opt-125m")]
    #[validate(length(min = 1))]
    pub model: String,

    /// Tokenizer name or path; the model is used when unset.
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Weight and activation data type.
    #[arg(long, default_value = "auto")]
    #[validate(custom(function = "validate_dtype"))]
    pub dtype: String,

    /// Model context length; derived from the model config when unset.
    #[arg(long)]
    #[validate(range(min = 1))]
    pub max_model_len: Option<u32>,

    /// Token block size for contiguous chunks of tokens.
    #[arg(long, default_value_t = 16)]
    #[validate(custom(function = "validate_block_size"))]
    pub block_size: u32,

    /// Fraction of GPU memory the engine may use.
    #[arg(long, default_value_t = 0.9)]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub gpu_memory_utilization: f64,

    /// Number of tensor parallel replicas.
    #[arg(long, default_value_t = 1)]
    #[validate(range(min = 1))]
    pub tensor_parallel_size: u32,

    /// Number of pipeline stages.
    #[arg(long, default_value_t = 1)]
    #[validate(range(min = 1))]
    pub pipeline_parallel_size: u32,

    /// Maximum number of sequences per iteration.
    #[arg(long, default_value_t = 256)]
    #[validate(range(min = 1))]
    pub max_num_seqs: u32,

    /// Maximum number of batched tokens per iteration.
    #[arg(long)]
    #[validate(range(min = 1))]
    pub max_num_batched_tokens: Option<u32>,

    /// Always use eager-mode execution.
    #[arg(long)]
    pub enforce_eager: bool,

    /// Enable automatic prefix caching.
    #[arg(long)]
    pub enable_prefix_caching: bool,

    /// Trust remote code from the model hub.
    #[arg(long)]
    pub trust_remote_code: bool,

    /// Random seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// KV cache transfer configuration, as a JSON object.
    #[arg(long)]
    #[validate(custom(function = "validate_json_object"))]
    pub kv_transfer_config: Option<String>
}

const DTYPES: &[&str] = &["auto", "half", "float16", "bfloat16", "float", "float32"];
const BLOCK_SIZES: &[u32] = &[8, 16, 32, 64, 128];

fn validate_dtype(value: &str) -> Result<(), ValidationError> {
    if DTYPES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("Invalid dtype"))
    }
}

fn validate_block_size(value: u32) -> Result<(), ValidationError> {
    if BLOCK_SIZES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("Invalid block size"))
    }
}

fn validate_json_object(value: &str) -> Result<(), ValidationError> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(_)) => Ok(()),
        _ => Err(ValidationError::new("Expected a JSON object"))
    }
}

/// The engine the worker ships with.
pub type ReferenceEngine = ClapEngine<EngineArgs>;
