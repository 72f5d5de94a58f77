//! Prompt builder: checks inputs and renders the Handlebars templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use sensai_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every name listed in the definition's `input` must be present in
/// `variables` (an empty string counts as present). Both the system and the
/// user templates are rendered with the same variables.
///
/// # Example
/// ```no_run
/// use sensai_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "Qu'est-ce qu'une dérivée ?".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if let Some(missing) = definition
        .input
        .iter()
        .find(|name| !variables.contains_key(name.as_str()))
    {
        return Err(AppError::Prompt(format!(
            "Prompt {} requires variable '{}'",
            definition.id, missing
        )));
    }

    let handlebars = registry();
    let user = render_template(&handlebars, &definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(&handlebars, template, &variables))
        .transpose()?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Plain text prompts, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

fn render_template(
    handlebars: &Handlebars<'static>,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
