//! Report templates.
//!
//! A template lives at `<templates_dir>/<name>.tmpl` and is plain HTML with
//! two constructs:
//!
//! ```text
//! {{ store_id }}                 value, HTML-escaped
//! {{#players}} ... {{/players}}  repeated once per player
//! ```
//!
//! Placeholder names are checked when the template is loaded, so a typo fails
//! at startup instead of in the middle of a run.

use std::path::{Path, PathBuf};

use playerwatch_core::{Player, PlayerwatchError, Result};

/// Placeholders available anywhere in the template.
const REPORT_FIELDS: &[&str] = &[
    "from",
    "to",
    "subject",
    "store_number",
    "store_id",
    "player_count",
    "generated_at",
];

/// Placeholders available only inside `{{#players}}`.
const PLAYER_FIELDS: &[&str] = &[
    "index",
    "id",
    "number",
    "name",
    "group",
    "tags",
    "schedule",
    "timezone",
    "last_online",
    "serial",
    "mac",
    "ip",
    "type",
    "model",
    "version",
    "company",
];

/// Data for one store report.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub from: &'a str,
    pub to: &'a [String],
    pub subject: &'a str,
    pub store_number: i64,
    pub store_id: &'a str,
    pub players: &'a [Player],
}

impl ReportContext<'_> {
    fn value(&self, field: &str) -> String {
        match field {
            "from" => self.from.to_string(),
            "to" => self.to.join(", "),
            "subject" => self.subject.to_string(),
            "store_number" => self.store_number.to_string(),
            "store_id" => self.store_id.to_string(),
            "player_count" => self.players.len().to_string(),
            "generated_at" => chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            _ => String::new(),
        }
    }
}

fn player_value(index: usize, p: &Player, field: &str) -> String {
    match field {
        "index" => (index + 1).to_string(),
        "id" => p.id.to_string(),
        "number" => p.number.to_string(),
        "name" => p.player_name.clone(),
        "group" => p.group_name.clone(),
        "tags" => p.tags.join(", "),
        "schedule" => p.schedule_name.clone(),
        "timezone" => p.time_zone_diff.to_string(),
        "last_online" => p.last_online.format("%Y-%m-%d %H:%M:%S").to_string(),
        "serial" => p.serial.clone(),
        "mac" => p.mac.clone(),
        "ip" => p.ip.clone(),
        "type" => p.device_type.clone(),
        "model" => p.model.clone(),
        "version" => p.version.clone(),
        "company" => p.company_name.clone(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Field(String),
    Players(Vec<Segment>),
}

/// A parsed, validated template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template source.
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let err = |msg: String| PlayerwatchError::Template(format!("{name}: {msg}"));

        let mut stack: Vec<Vec<Segment>> = vec![Vec::new()];
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                push(&mut stack, Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| err("unclosed '{{'".into()))?;
            let tag = after[..close].trim();
            rest = &after[close + 2..];

            if let Some(section) = tag.strip_prefix('#') {
                if section.trim() != "players" {
                    return Err(err(format!("unknown section '{}'", section.trim())));
                }
                if stack.len() > 1 {
                    return Err(err("nested players section".into()));
                }
                stack.push(Vec::new());
            } else if let Some(section) = tag.strip_prefix('/') {
                if section.trim() != "players" || stack.len() != 2 {
                    return Err(err(format!("unexpected close '{}'", section.trim())));
                }
                let body = stack.pop().unwrap_or_default();
                push(&mut stack, Segment::Players(body));
            } else {
                let in_players = stack.len() > 1;
                let known = REPORT_FIELDS.contains(&tag)
                    || (in_players && PLAYER_FIELDS.contains(&tag));
                if !known {
                    return Err(err(format!("unknown placeholder '{tag}'")));
                }
                push(&mut stack, Segment::Field(tag.to_string()));
            }
        }
        if !rest.is_empty() {
            push(&mut stack, Segment::Text(rest.to_string()));
        }

        if stack.len() != 1 {
            return Err(err("unclosed players section".into()));
        }
        Ok(Self {
            name: name.to_string(),
            segments: stack.pop().unwrap_or_default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render a store report.
    pub fn render(&self, ctx: &ReportContext<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Field(f) => out.push_str(&escape_html(&ctx.value(f))),
                Segment::Players(body) => {
                    for (i, p) in ctx.players.iter().enumerate() {
                        for inner in body {
                            match inner {
                                Segment::Text(t) => out.push_str(t),
                                Segment::Field(f) if PLAYER_FIELDS.contains(&f.as_str()) => {
                                    out.push_str(&escape_html(&player_value(i, p, f)))
                                }
                                Segment::Field(f) => out.push_str(&escape_html(&ctx.value(f))),
                                Segment::Players(_) => {}
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

fn push(stack: &mut [Vec<Segment>], segment: Segment) {
    if let Some(top) = stack.last_mut() {
        top.push(segment);
    }
}

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Loads templates from one directory.
pub struct TemplateLoader {
    dir: PathBuf,
}

impl TemplateLoader {
    /// Fails if `dir` does not exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PlayerwatchError::Template(format!(
                "templates directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Load and parse `<dir>/<name>.tmpl`.
    pub fn load(&self, name: &str) -> Result<Template> {
        let path = self.dir.join(format!("{name}.tmpl"));
        if !path.is_file() {
            return Err(PlayerwatchError::Template(format!(
                "template file not found: {}",
                path.display()
            )));
        }
        let source = std::fs::read_to_string(&path)?;
        let template = Template::parse(name, &source)?;
        tracing::debug!("📄 Loaded template {}", path.display());
        Ok(template)
    }
}
