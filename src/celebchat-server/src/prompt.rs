//! Persona prompt construction.

use serde::Serialize;

use crate::persona::Persona;

/// Maximum characters of a prompt part shown in diagnostic logs.
pub const PREVIEW_CHARS: usize = 1500;

/// What a persona template produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutput {
    /// A ready-to-send prompt.
    Text(String),
    /// Prompt split into named parts.
    Structured(StructuredPrompt),
}

/// Structured template output. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredPrompt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<String>,
}

/// The prompt sent to the backend plus the parts it came from.
///
/// Only `text` is sent; the other fields are kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParts {
    pub text: String,
    pub system: Option<String>,
    pub persona: Option<String>,
    pub guardrails: Option<String>,
}

impl From<TemplateOutput> for PromptParts {
    fn from(output: TemplateOutput) -> Self {
        match output {
            TemplateOutput::Text(text) => Self {
                text,
                ..Default::default()
            },
            TemplateOutput::Structured(structured) => {
                let text = match &structured.text {
                    Some(text) => text.clone(),
                    None => serde_json::to_string_pretty(&structured).unwrap_or_default(),
                };
                Self {
                    text,
                    system: structured.system,
                    persona: structured.persona,
                    guardrails: structured.guardrails,
                }
            }
        }
    }
}

/// A persona template: user message in, prompt out.
pub type PromptTemplate = fn(&str) -> TemplateOutput;

fn einstein(message: &str) -> TemplateOutput {
    TemplateOutput::Text(format!(
        "\nYou are Albert Einstein, theoretical physicist. You speak with precision, curiosity and a touch of humor.\n\
         Answer the user as you would in a letter or an interview, using scientific analogies where you can.\n\
         User: \"{message}\"\n"
    ))
}

fn frida(message: &str) -> TemplateOutput {
    TemplateOutput::Text(format!(
        "\nYou are Frida Kahlo, Mexican artist. Your voice is poetic, emotional and deeply introspective.\n\
         Answer with sensitivity, with references to your art, your pain and your love for Mexico.\n\
         User: \"{message}\"\n"
    ))
}

fn leonardo(message: &str) -> TemplateOutput {
    TemplateOutput::Text(format!(
        "\nYou are Leonardo da Vinci, Renaissance genius. You speak with wisdom, curiosity and a multidisciplinary vision.\n\
         Answer as if writing in your notebook of ideas, with metaphors and observations of the world.\n\
         User: \"{message}\"\n"
    ))
}

fn curie(message: &str) -> TemplateOutput {
    let system = "You are Marie Curie, pioneering scientist.".to_string();
    let persona = "Your tone is sober, rigorous and humble.".to_string();
    let guardrails =
        "Answer with scientific clarity, but also with humanity and respect for knowledge."
            .to_string();
    let text = format!("\n{system}\n{persona}\n{guardrails}\nUser: \"{message}\"\n");
    TemplateOutput::Structured(StructuredPrompt {
        text: Some(text),
        system: Some(system),
        persona: Some(persona),
        guardrails: Some(guardrails),
    })
}

/// Templates keyed by persona display name.
const TEMPLATES: &[(&str, PromptTemplate)] = &[
    ("Albert Einstein", einstein),
    ("Frida Kahlo", frida),
    ("Leonardo da Vinci", leonardo),
    ("Marie Curie", curie),
];

/// Template registered for a display name, if any.
pub fn template_for(display_name: &str) -> Option<PromptTemplate> {
    TEMPLATES
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, template)| *template)
}

/// Generic prompt for personas without a template.
pub fn generic_prompt(display_name: &str, message: &str) -> String {
    format!("Respond as if you were {display_name}. The user says: \"{message}\"")
}

/// Build the prompt for `persona` answering `message`.
pub fn build_prompt(persona: &Persona, message: &str) -> PromptParts {
    match template_for(persona.display_name) {
        Some(template) => template(message).into(),
        None => PromptParts {
            text: generic_prompt(persona.display_name, message),
            ..Default::default()
        },
    }
}

/// Shorten `s` to at most `max` characters for logging.
pub fn preview(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    format!("{head}\n...[{} more chars]", total - max)
}
