//! Declarative per-strategy prompt transformations
//!
//! Each mutation strategy maps to a `Transformation` descriptor: an ordered
//! set of optional operations applied to a prompt template. Transformations
//! are pure text-to-text functions; the table carries no state and is built
//! once.

use prompt_optimizer_types::strategies::MutationStrategy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Text added only when a trigger pattern is present in the prompt
struct ConditionalAddition {
    trigger: Regex,
    text: String,
    /// Insert immediately after the trigger match instead of appending
    insert_after: bool,
}

/// Keyword-highlighting substitution wrapping matches in markup
struct KeywordHighlight {
    pattern: Regex,
    open: String,
    close: String,
}

/// One strategy's transformation recipe.
///
/// Operations apply in a fixed order: pattern replacements, prefix,
/// suffix, wrapper, conditional additions, keyword highlighting. The
/// result is trimmed of surrounding whitespace.
#[derive(Default)]
pub struct Transformation {
    replacements: Vec<(Regex, String)>,
    prefix: Option<String>,
    suffix: Option<String>,
    wrapper: Option<(String, String)>,
    conditions: Vec<ConditionalAddition>,
    highlight: Option<KeywordHighlight>,
}

impl Transformation {
    /// Apply the recipe to a prompt template
    pub fn apply(&self, template: &str) -> String {
        let mut text = template.to_string();

        for (pattern, replacement) in &self.replacements {
            text = pattern.replace_all(&text, replacement.as_str()).into_owned();
        }

        if let Some(prefix) = &self.prefix {
            text = format!("{prefix}{text}");
        }
        if let Some(suffix) = &self.suffix {
            text.push_str(suffix);
        }
        if let Some((open, close)) = &self.wrapper {
            text = format!("{open}{text}{close}");
        }

        for condition in &self.conditions {
            if let Some(found) = condition.trigger.find(&text) {
                if condition.insert_after {
                    text.insert_str(found.end(), &condition.text);
                } else {
                    text.push_str(&condition.text);
                }
            }
        }

        if let Some(highlight) = &self.highlight {
            text = highlight
                .pattern
                .replace_all(&text, |caps: &regex::Captures<'_>| {
                    format!("{}{}{}", highlight.open, &caps[0], highlight.close)
                })
                .into_owned();
        }

        text.trim().to_string()
    }
}

fn replacement(pattern: &str, with: &str) -> (Regex, String) {
    // table patterns are fixed literals, validated by the table test
    (Regex::new(pattern).expect("invalid transformation pattern"), with.to_string())
}

/// Replacements that strip role boilerplate and politeness
fn concise_replacements() -> Vec<(Regex, String)> {
    vec![
        replacement(r"(?i)you are an? ", ""),
        replacement(r"(?i)please ", ""),
        replacement(r"(?i)kindly ", ""),
        replacement(r"(?i)in order to", "to"),
        replacement(r" {2,}", " "),
    ]
}

static TRANSFORMATIONS: LazyLock<HashMap<MutationStrategy, Transformation>> =
    LazyLock::new(|| {
        let mut table = HashMap::new();

        table.insert(
            MutationStrategy::Concise,
            Transformation {
                replacements: concise_replacements(),
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::Detailed,
            Transformation {
                suffix: Some(
                    "\n\nBe thorough: include relevant details, context, and a short \
                     justification for each point."
                        .to_string(),
                ),
                conditions: vec![ConditionalAddition {
                    trigger: Regex::new(r"(?i)summar\w*").unwrap(),
                    text: " (do not omit key facts)".to_string(),
                    insert_after: true,
                }],
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::Structured,
            Transformation {
                wrapper: Some((
                    "Respond using the structure below.\n".to_string(),
                    "\n\nFormat the response as numbered sections with a short heading \
                     for each."
                        .to_string(),
                )),
                conditions: vec![ConditionalAddition {
                    trigger: Regex::new(r"(?i)\blist\b").unwrap(),
                    text: "\nRender lists as bullet points.".to_string(),
                    insert_after: false,
                }],
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::Instructive,
            Transformation {
                prefix: Some("Follow these instructions exactly:\n".to_string()),
                suffix: Some(
                    "\nIf any instruction is ambiguous, state your assumption first."
                        .to_string(),
                ),
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::ExampleBased,
            Transformation {
                suffix: Some(
                    "\n\nExample:\nInput: a short sample request\n\
                     Output: a response in exactly the desired shape"
                        .to_string(),
                ),
                conditions: vec![ConditionalAddition {
                    trigger: Regex::new(r"(?i)\bformat\b").unwrap(),
                    text: "\nMirror the format shown in the example.".to_string(),
                    insert_after: false,
                }],
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::ConstraintFocused,
            Transformation {
                suffix: Some(
                    "\n\nConstraints:\n- Stay strictly on topic.\n- Do not invent \
                     facts.\n- Respect any stated length limit."
                        .to_string(),
                ),
                highlight: Some(KeywordHighlight {
                    pattern: Regex::new(r"(?i)\b(must|never|always|only)\b").unwrap(),
                    open: "**".to_string(),
                    close: "**".to_string(),
                }),
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::OutputFocused,
            Transformation {
                suffix: Some(
                    "\nReturn only the final output, with no preamble.".to_string(),
                ),
                highlight: Some(KeywordHighlight {
                    pattern: Regex::new(r"(?i)\b(output|format|return)\b").unwrap(),
                    open: "**".to_string(),
                    close: "**".to_string(),
                }),
                ..Default::default()
            },
        );

        table.insert(
            MutationStrategy::Hybrid,
            Transformation {
                replacements: concise_replacements(),
                suffix: Some(
                    "\n\nFormat the response as numbered sections.".to_string(),
                ),
                ..Default::default()
            },
        );

        table
    });

/// Apply a strategy's transformation to a prompt template.
///
/// The result is trimmed of surrounding whitespace; a strategy with no
/// table entry leaves the template unchanged apart from trimming.
pub fn apply_mutation(template: &str, strategy: MutationStrategy) -> String {
    match TRANSFORMATIONS.get(&strategy) {
        Some(transformation) => transformation.apply(template),
        None => template.trim().to_string(),
    }
}

/// Apply a strategy named by string; unknown names leave the template
/// unchanged apart from trimming.
pub fn apply_mutation_named(template: &str, strategy_name: &str) -> String {
    match MutationStrategy::from_name(strategy_name) {
        Some(strategy) => apply_mutation(template, strategy),
        None => template.trim().to_string(),
    }
}
