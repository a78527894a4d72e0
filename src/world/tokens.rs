//! Block id tokenization for fuzzy matching

use crate::error::{HubError, Result};
use regex::Regex;

/// Token rewrites applied before scoring
const SYNONYMS: &[(&str, &[&str])] = &[
    ("log", &["trunk"]),
    ("planks", &["planks"]),
    ("slab", &["half"]),
    ("stairs", &["stairs"]),
    ("wall", &["wall"]),
    ("fence", &["fence"]),
    ("gate", &["gate"]),
    ("leaves", &["leaves"]),
    ("glass", &["glass"]),
    ("wool", &["wool"]),
    ("sand", &["sand"]),
    ("gravel", &["gravel"]),
    ("stone", &["stone"]),
    ("cobblestone", &["stone", "cobble"]),
    ("brick", &["brick"]),
    ("bricks", &["brick"]),
    ("mossy", &["mossy"]),
];

/// Splits block ids into lower-case words
#[derive(Debug, Clone)]
pub struct Tokenizer {
    re_separator: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_separator: Regex::new(r"[_\-\s]+")
                .map_err(|e| HubError::config_with_source("Failed to compile regex", e))?,
        })
    }

    /// Split an id into lower-case words.
    ///
    /// `oak_log` → `oak, log`; `Rock_Stone_Cobble` → `rock, stone, cobble`;
    /// `HTMLParser2` → `html, parser, 2`.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for part in self.re_separator.split(text.trim()) {
            split_words(part, &mut tokens);
        }
        tokens
    }

    /// Tokenize then apply the synonym table
    pub fn normalized(&self, text: &str) -> Vec<String> {
        normalize(self.tokenize(text))
    }
}

/// Replace tokens through the synonym table
pub fn normalize(tokens: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(tokens.len());
    for token in tokens {
        match synonyms(&token) {
            Some(replacement) => expanded.extend(replacement.iter().map(|s| s.to_string())),
            None => expanded.push(token),
        }
    }
    expanded
}

fn synonyms(token: &str) -> Option<&'static [&'static str]> {
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, replacement)| *replacement)
}

/// Camel-case words, upper-case runs and digit runs; anything else separates
fn split_words(part: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = part.chars().collect();
    let run_end = |start: usize, pred: fn(&char) -> bool| {
        chars[start..]
            .iter()
            .position(|c| !pred(c))
            .map_or(chars.len(), |offset| start + offset)
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let end = if c.is_ascii_lowercase() {
            run_end(i, char::is_ascii_lowercase)
        } else if c.is_ascii_uppercase() {
            let upper_end = run_end(i, char::is_ascii_uppercase);
            let followed_by_lower = chars.get(upper_end).is_some_and(char::is_ascii_lowercase);
            if !followed_by_lower {
                upper_end
            } else if upper_end - i == 1 {
                run_end(upper_end, char::is_ascii_lowercase)
            } else {
                // Last capital starts the next word
                upper_end - 1
            }
        } else if c.is_ascii_digit() {
            run_end(i, char::is_ascii_digit)
        } else {
            i += 1;
            continue;
        };

        tokens.push(chars[i..end].iter().collect::<String>().to_ascii_lowercase());
        i = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(text: &str) -> Vec<String> {
        Tokenizer::new().unwrap().tokenize(text)
    }

    #[test]
    fn test_tokenize_snake_and_camel() {
        assert_eq!(tokenize("oak_log"), vec!["oak", "log"]);
        assert_eq!(tokenize("Rock_Stone_Cobble"), vec!["rock", "stone", "cobble"]);
        assert_eq!(tokenize("HTMLParser2"), vec!["html", "parser", "2"]);
        assert_eq!(tokenize("WoodOak-Trunk full"), vec!["wood", "oak", "trunk", "full"]);
    }

    #[test]
    fn test_tokenize_blank() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  __ ").is_empty());
    }

    #[test]
    fn test_normalize_synonyms() {
        let tokens = normalize(tokenize("mossy_cobblestone_slab"));
        assert_eq!(tokens, vec!["mossy", "stone", "cobble", "half"]);

        let tokens = Tokenizer::new().unwrap().normalized("spruce_log");
        assert_eq!(tokens, vec!["spruce", "trunk"]);
    }
}
