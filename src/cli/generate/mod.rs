//! Generate command - prints variations for a piece of content

use clap::Args;

use crate::domain::experiment::ContentPayload;
use crate::infrastructure::services::GenerationRequest;

/// Arguments for the generate command
#[derive(Args, Clone)]
pub struct GenerateArgs {
    /// Body copy of the control
    #[arg(long)]
    pub body: String,

    /// Subject line of the control
    #[arg(long)]
    pub subject: Option<String>,

    /// Call to action of the control
    #[arg(long)]
    pub cta: Option<String>,

    /// Number of non-control variations
    #[arg(long, default_value_t = 3)]
    pub count: u16,

    /// Ask the configured content enhancer first
    #[arg(long)]
    pub ai: bool,

    /// Log level (overrides config)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Run the generate command
pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let config = super::init(args.log_level.as_deref());
    let generator = crate::create_variation_generator(&config)?;

    let mut request = GenerationRequest::new(build_payload(&args), args.count);
    if args.ai {
        request = request.with_ai_assistance();
    }

    let variations = generator.generate(&request).await;
    println!("{}", serde_json::to_string_pretty(&variations)?);

    Ok(())
}

fn build_payload(args: &GenerateArgs) -> ContentPayload {
    let mut payload = ContentPayload::new(&args.body);

    if let Some(subject) = &args.subject {
        payload = payload.with_subject(subject);
    }

    if let Some(cta) = &args.cta {
        payload = payload.with_call_to_action(cta);
    }

    payload
}
