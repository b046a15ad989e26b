use crate::context::ContextDigest;
use crate::detection::Language;

pub const SYSTEM_PROMPT: &str = "You are an observability expert.";

/// Fills the fixed advisory template with the digest and detected language
pub fn build_prompt(digest: &ContextDigest, language: Language) -> String {
    let files = digest.files();
    let file_list = if files.is_empty() {
        "(none)".to_string()
    } else {
        files.join(", ")
    };

    format!(
        r#"Review the application below. Its detected language is {language}.

Files included: {file_list}

{digest}
Answer with these sections, in order:

1. Summary: what the application does and the stack it is built on.
2. Dependencies: the libraries and external services it relies on.
3. Build and run: the most likely commands to build and start it.
4. Improvements: concrete changes that would make its traces, metrics and logs more useful once OpenTelemetry auto-instrumentation is applied.
5. Containerization: guidance for packaging it as a container image that exports telemetry to an OTLP collector.

Be specific to this code. If the excerpt is insufficient to answer a section, say so instead of guessing."#,
        language = language,
        file_list = file_list,
        digest = digest.render(),
    )
}
