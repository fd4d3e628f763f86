//! # Worker Extension Parameters
//!
//! The parameters a disaggregated multimodal worker adds to the base engine:
//! request routing, remote prefill thresholds, and the image/video
//! tokenization settings. [`worker_parameters`] is the declarative table;
//! [`WorkerArgs`] is the typed record built from a resolution result.

use serde::Serialize;
use strum::VariantNames;
use worker_errors::{ResolveError, SchemaError};

use crate::engine::BaseEngine;
use crate::resolver::{ArgumentResolver, ResolvedConfiguration};
use crate::schema::{Constraint, ExtensionSchema, ParameterSpec};
use crate::source::ConfigurationSource;

pub const ROUTER: &str = "router";
pub const REMOTE_PREFILL: &str = "remote-prefill";
pub const CONDITIONAL_DISAGG: &str = "conditional-disagg";
pub const MAX_LOCAL_PREFILL_LENGTH: &str = "max-local-prefill-length";
pub const MAX_PREFILL_QUEUE_SIZE: &str = "max-prefill-queue-size";
pub const IMAGE_TOKEN_ID: &str = "image-token-id";
pub const NUM_PATCHES: &str = "num-patches";
pub const PROMPT_TEMPLATE: &str = "prompt-template";
pub const NUM_SAMPLED_FRAMES: &str = "num-sampled-frames";
pub const FRAME_HEIGHT: &str = "frame-height";
pub const FRAME_WIDTH: &str = "frame-width";
pub const FRAME_CHANNELS: &str = "frame-channels";
pub const DUMMY_TOKEN_ID: &str = "dummy-token-id";
pub const VIDEO_TOKEN_ID: &str = "video-token-id";
pub const DUMMY_TOKENS_PER_FRAME: &str = "dummy-tokens-per-frame";

/// Request routing policy.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Router {
    #[default]
    Random,
    RoundRobin,
    Kv
}

/// The worker's extension table, in help order.
pub fn worker_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::string(ROUTER, "random")
            .with_constraint(Constraint::OneOf(Router::VARIANTS))
            .with_help("Router type to use for scheduling requests to workers"),
        ParameterSpec::flag(REMOTE_PREFILL).with_help("Enable remote prefill"),
        ParameterSpec::flag(CONDITIONAL_DISAGG).with_help(
            "Use disaggregated router to decide whether to prefill locally or remotely"
        ),
        ParameterSpec::int(MAX_LOCAL_PREFILL_LENGTH, 1000).with_help(
            "Maximum length for local prefill. With remote prefill enabled, longer prefills are \
             sent to a remote prefill worker"
        ),
        ParameterSpec::int(MAX_PREFILL_QUEUE_SIZE, 3).with_help(
            "Maximum queue size for remote prefill. Above it, prefill runs locally"
        ),
        ParameterSpec::int(IMAGE_TOKEN_ID, 32000)
            .with_help("Image token ID used to represent image patches in the token sequence"),
        ParameterSpec::int(NUM_PATCHES, 576)
            .with_constraint(Constraint::Positive)
            .with_help("Number of patches the input image is divided into"),
        ParameterSpec::string(PROMPT_TEMPLATE, "<prompt>")
            .with_help("Prompt template to use for the model"),
        ParameterSpec::int(NUM_SAMPLED_FRAMES, 8)
            .with_constraint(Constraint::Positive)
            .with_help("Number of frames to sample from the video"),
        ParameterSpec::int(FRAME_HEIGHT, 336)
            .with_constraint(Constraint::Positive)
            .with_help("Height of the video frames"),
        ParameterSpec::int(FRAME_WIDTH, 336)
            .with_constraint(Constraint::Positive)
            .with_help("Width of the video frames"),
        ParameterSpec::int(FRAME_CHANNELS, 3)
            .with_constraint(Constraint::Positive)
            .with_help("Number of channels in the video frames"),
        ParameterSpec::int(DUMMY_TOKEN_ID, 0).with_help("Dummy token ID"),
        ParameterSpec::int(VIDEO_TOKEN_ID, 32000).with_help("Video token ID"),
        ParameterSpec::int(DUMMY_TOKENS_PER_FRAME, 144)
            .with_constraint(Constraint::NonNegative)
            .with_help("Number of dummy tokens per frame"),
    ]
}

/// [`worker_parameters`] as a registry whose names must avoid every flag of
/// `engine`.
pub fn worker_schema<B: BaseEngine>(engine: &B) -> Result<ExtensionSchema, SchemaError> {
    let mut schema = ExtensionSchema::with_reserved(engine.flags().into_iter().map(|f| f.name));
    for spec in worker_parameters() {
        schema.register(spec)?;
    }
    Ok(schema)
}

/// Remote prefill settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisaggregationArgs {
    pub router: Router,
    pub remote_prefill: bool,
    pub conditional_disagg: bool,
    pub max_local_prefill_length: i64,
    pub max_prefill_queue_size: i64
}

/// Image tokenization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageArgs {
    pub image_token_id: i64,
    pub num_patches: i64
}

/// Video sampling and tokenization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoArgs {
    pub num_sampled_frames: i64,
    pub frame_height: i64,
    pub frame_width: i64,
    pub frame_channels: i64,
    pub dummy_token_id: i64,
    pub video_token_id: i64,
    pub dummy_tokens_per_frame: i64
}

/// Fully resolved worker configuration: the engine's arguments plus every
/// worker extension, typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerArgs<B> {
    pub engine: B,
    pub disaggregation: DisaggregationArgs,
    pub prompt_template: String,
    pub image: ImageArgs,
    pub video: VideoArgs
}

impl<B> TryFrom<ResolvedConfiguration<B>> for WorkerArgs<B> {
    type Error = SchemaError;

    fn try_from(resolved: ResolvedConfiguration<B>) -> Result<Self, SchemaError> {
        let (engine, values) = resolved.into_parts();

        let router = values.require_str(ROUTER)?;
        let router = router.parse().map_err(|_| SchemaError::FieldShape {
            name: ROUTER.to_string(),
            expected: Router::VARIANTS.join(" | "),
            found: router.to_string()
        })?;

        Ok(Self {
            disaggregation: DisaggregationArgs {
                router,
                remote_prefill: values.require_bool(REMOTE_PREFILL)?,
                conditional_disagg: values.require_bool(CONDITIONAL_DISAGG)?,
                max_local_prefill_length: values.require_int(MAX_LOCAL_PREFILL_LENGTH)?,
                max_prefill_queue_size: values.require_int(MAX_PREFILL_QUEUE_SIZE)?
            },
            prompt_template: values.require_str(PROMPT_TEMPLATE)?.to_string(),
            image: ImageArgs {
                image_token_id: values.require_int(IMAGE_TOKEN_ID)?,
                num_patches: values.require_int(NUM_PATCHES)?
            },
            video: VideoArgs {
                num_sampled_frames: values.require_int(NUM_SAMPLED_FRAMES)?,
                frame_height: values.require_int(FRAME_HEIGHT)?,
                frame_width: values.require_int(FRAME_WIDTH)?,
                frame_channels: values.require_int(FRAME_CHANNELS)?,
                dummy_token_id: values.require_int(DUMMY_TOKEN_ID)?,
                video_token_id: values.require_int(VIDEO_TOKEN_ID)?,
                dummy_tokens_per_frame: values.require_int(DUMMY_TOKENS_PER_FRAME)?
            },
            engine
        })
    }
}

/// Build the worker resolver for `engine`.
pub fn worker_resolver<B: BaseEngine>(engine: B) -> Result<ArgumentResolver<B>, SchemaError> {
    ArgumentResolver::new(worker_schema(&engine)?, engine)
}

/// Resolve a service's worker arguments from `source`.
pub fn parse_worker_args<B, S>(
    source: &S,
    service: &str,
    prefix: &str,
    engine: B
) -> Result<WorkerArgs<B::Config>, ResolveError<B::Error>>
where
    B: BaseEngine,
    S: ConfigurationSource + ?Sized
{
    let resolver = worker_resolver(engine)?;
    let resolved = resolver.resolve_from(source, service, prefix)?;
    Ok(WorkerArgs::try_from(resolved)?)
}
