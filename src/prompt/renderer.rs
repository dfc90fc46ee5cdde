//! Handlebars-backed prompt rendering.
//!
//! Templates are embedded at compile time and rendered in strict mode so a
//! missing parameter is an error rather than a silently empty prompt. The
//! rendered prompt is passed through the outbound firewall before it is
//! returned to the caller.

use handlebars::Handlebars;
use serde_json::Value;

use crate::core::config::FirewallConfig;
use crate::core::errors::{OyaError, Result};
use crate::prompt::firewall::PromptFirewall;

/// Registered template names and sources.
const TEMPLATES: &[(&str, &str)] = &[
    ("file", include_str!("templates/file.hbs")),
    ("directory", include_str!("templates/directory.hbs")),
    ("synthesis", include_str!("templates/synthesis.hbs")),
    ("architecture", include_str!("templates/architecture.hbs")),
    ("overview", include_str!("templates/overview.hbs")),
    ("workflows", include_str!("templates/workflows.hbs")),
    ("qa", include_str!("templates/qa.hbs")),
];

/// A rendered prompt plus any firewall warning raised on the way out.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// Prompt text, scrubbed when the firewall intervened.
    pub text: String,
    /// Outbound firewall warning, if any.
    pub warning: Option<String>,
}

/// Renders the built-in prompt templates with named parameters.
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
    firewall: PromptFirewall,
}

impl PromptRenderer {
    /// Build a renderer bound to the given output language.
    pub fn new(language: impl Into<String>, firewall_config: FirewallConfig) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| OyaError::template(format!("template '{name}': {e}")))?;
        }

        Ok(Self {
            handlebars,
            firewall: PromptFirewall::new(language, firewall_config),
        })
    }

    /// Render `template` with `params`, applying the outbound firewall.
    ///
    /// Callers pass every parameter the template names; notes sections use
    /// an empty `corrections` string when no note exists so the section is
    /// omitted entirely.
    pub fn render(&self, template: &str, params: &Value) -> Result<RenderedPrompt> {
        let text = self.handlebars.render(template, params)?;
        let (text, warning) = self.firewall.check_outbound(&text);
        Ok(RenderedPrompt { text, warning })
    }

    /// The firewall shared with response-side checks.
    pub fn firewall(&self) -> &PromptFirewall {
        &self.firewall
    }
}
