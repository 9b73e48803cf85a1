//! `{{key}}` placeholder tokenizer and substitution
//!
//! Only tokens whose key is present in the substitution map are replaced.
//! Unknown keys stay verbatim in the output and are reported as unresolved.

use std::collections::{BTreeMap, BTreeSet};

/// Placeholder key to replacement value
pub type Substitutions = BTreeMap<String, String>;

/// A lexical piece of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    /// `raw` is the full `{{key}}` span
    Placeholder { raw: &'a str, key: &'a str },
}

/// How substituted values are encoded into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    None,
    /// Values land inside JSON string literals
    Json,
}

impl Escape {
    /// Escaping rule for a destination path
    pub fn for_destination(dest: &str) -> Self {
        if dest.to_ascii_lowercase().ends_with(".json") {
            Escape::Json
        } else {
            Escape::None
        }
    }

    fn apply(&self, value: &str) -> String {
        match self {
            Escape::None => value.to_string(),
            Escape::Json => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
        }
    }
}

/// Result of rendering one template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Keys that were replaced, with the raw (unescaped) values used
    pub applied: BTreeMap<String, String>,
    /// Keys left verbatim because no value was supplied
    pub unresolved: BTreeSet<String>,
}

fn is_key(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `input` into text runs and `{{key}}` placeholders
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(rel_open) = input[cursor..].find("{{") {
        let open = cursor + rel_open;
        let Some(rel_close) = input[open + 2..].find("}}") else {
            break;
        };
        let close = open + 2 + rel_close;
        let key = &input[open + 2..close];

        if is_key(key) {
            if text_start < open {
                tokens.push(Token::Text(&input[text_start..open]));
            }
            tokens.push(Token::Placeholder {
                raw: &input[open..close + 2],
                key,
            });
            cursor = close + 2;
            text_start = cursor;
        } else {
            // Not a placeholder; rescan from the second brace so `{{{key}}}` still matches
            cursor = open + 1;
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Substitute known placeholders in `input`
pub fn render(input: &str, substitutions: &Substitutions, escape: Escape) -> Rendered {
    let mut rendered = Rendered {
        text: String::with_capacity(input.len()),
        ..Default::default()
    };

    for token in tokenize(input) {
        match token {
            Token::Text(text) => rendered.text.push_str(text),
            Token::Placeholder { raw, key } => match substitutions.get(key) {
                Some(value) => {
                    rendered.text.push_str(&escape.apply(value));
                    rendered.applied.insert(key.to_string(), value.clone());
                }
                None => {
                    rendered.text.push_str(raw);
                    rendered.unresolved.insert(key.to_string());
                }
            },
        }
    }

    rendered
}

/// Content-based binary detection: NUL bytes in the leading block or invalid UTF-8
pub fn is_binary(bytes: &[u8]) -> bool {
    const SNIFF_LEN: usize = 8000;
    bytes[..bytes.len().min(SNIFF_LEN)].contains(&0) || std::str::from_utf8(bytes).is_err()
}
