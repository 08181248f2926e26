use tracing::error;

use super::types::{Campaign, Lead};

const FALLBACK_FIRST_NAME: &str = "there";
const FALLBACK_COMPANY: &str = "your company";
const FALLBACK_POSITION: &str = "your role";
const FALLBACK_LOCATION: &str = "your area";
const FALLBACK_INDUSTRY: &str = "your industry";
const FALLBACK_CAMPAIGN: &str = "our campaign";

/// Placeholder names the formatter recognizes; anything else in a template is
/// left alone (and flagged by sequence validation).
pub(crate) const KNOWN_PLACEHOLDERS: &[&str] = &[
    "first_name",
    "last_name",
    "full_name",
    "company",
    "company_name",
    "position",
    "title",
    "location",
    "industry",
    "campaign_name",
];

/// Substitute recognized placeholders, each with a neutral fallback for empty
/// lead attributes. If `{{first_name}}` somehow survives substitution, the
/// result is discarded for a minimal safe greeting instead of sending a
/// broken message.
pub fn render_message(template: &str, lead: &Lead, campaign: &Campaign) -> String {
    let rendered = substitute(template, lead, campaign);
    if rendered.contains("{{first_name}}") {
        error!(
            "placeholder survived rendering for lead {}, sending safe fallback",
            lead.id
        );
        return format!("Hi there, {}", strip_placeholders(template).trim());
    }
    rendered
}

fn substitute(template: &str, lead: &Lead, campaign: &Campaign) -> String {
    let full_name = {
        let joined = format!("{} {}", lead.first_name.trim(), lead.last_name.trim());
        let joined = joined.trim().to_string();
        if joined.is_empty() {
            FALLBACK_FIRST_NAME.to_string()
        } else {
            joined
        }
    };
    template
        .replace("{{first_name}}", or_default(&lead.first_name, FALLBACK_FIRST_NAME))
        .replace("{{last_name}}", lead.last_name.trim())
        .replace("{{full_name}}", &full_name)
        .replace("{{company}}", or_default(&lead.company, FALLBACK_COMPANY))
        .replace("{{company_name}}", or_default(&lead.company, FALLBACK_COMPANY))
        .replace("{{position}}", or_default(&lead.position, FALLBACK_POSITION))
        .replace("{{title}}", or_default(&lead.position, FALLBACK_POSITION))
        .replace("{{location}}", or_default(&lead.location, FALLBACK_LOCATION))
        .replace("{{industry}}", or_default(&lead.industry, FALLBACK_INDUSTRY))
        .replace("{{campaign_name}}", or_default(&campaign.name, FALLBACK_CAMPAIGN))
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

/// All `{{name}}` tokens present in a template, in order of appearance.
pub(crate) fn placeholders(template: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                found.push(after[..end].to_string());
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    found
}

fn strip_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => rest = &after[end + 2..],
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
