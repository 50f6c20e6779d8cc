//! Channel-style rendering.

use crate::pipeline::types::ChannelStyle;
use crate::safety::{is_emoji, is_emoji_modifier};

/// Emoji kept in a conversational reply.
pub const MAX_CONVERSATIONAL_EMOJI: usize = 4;

const CONTRACTIONS: &[(&str, &str)] = &[
    ("you are", "you're"),
    ("we are", "we're"),
    ("it is", "it's"),
    ("that is", "that's"),
    ("there is", "there's"),
    ("here is", "here's"),
    ("you will", "you'll"),
    ("we will", "we'll"),
    ("do not", "don't"),
    ("does not", "doesn't"),
    ("is not", "isn't"),
    ("could not", "couldn't"),
    ("cannot", "can't"),
];

/// Render `content` for a channel style.
pub fn format_for_channel(content: &str, style: ChannelStyle) -> String {
    match style {
        ChannelStyle::Structured => content.trim().to_string(),
        ChannelStyle::Conversational => {
            let plain = strip_markup(content);
            let contracted = contract(&plain);
            cap_emoji(&contracted, MAX_CONVERSATIONAL_EMOJI)
        }
    }
}

/// Remove emphasis and bullet markers. Line breaks survive.
pub fn strip_markup(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix("• ")
                .or_else(|| line.strip_prefix("- "))
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("#"))
                .unwrap_or(line);
            line.replace("**", "")
                .replace("__", "")
                .replace('`', "")
                .trim_start_matches('#')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Swap formal phrasing for contractions, word-aligned, keeping a leading
/// capital.
pub fn contract(content: &str) -> String {
    let mut out = content.to_string();
    for (long, short) in CONTRACTIONS {
        out = replace_words(&out, long, short);
        out = replace_words(&out, &capitalize(long), &capitalize(short));
    }
    out
}

fn replace_words(haystack: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.find(needle) {
        let before = rest[..pos].chars().next_back();
        let after = rest[pos + needle.len()..].chars().next();
        let bounded = !before.is_some_and(char::is_alphanumeric)
            && !after.is_some_and(|c| c.is_alphanumeric() || c == '\'');
        out.push_str(&rest[..pos]);
        out.push_str(if bounded { replacement } else { needle });
        rest = &rest[pos + needle.len()..];
    }
    out.push_str(rest);
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keep the first `max` emoji, drop the rest.
pub fn cap_emoji(content: &str, max: usize) -> String {
    let mut seen = 0;
    let mut out = String::with_capacity(content.len());
    let mut dropping = false;
    for c in content.chars() {
        if is_emoji_modifier(c) {
            if !dropping {
                out.push(c);
            }
        } else if is_emoji(c) {
            seen += 1;
            dropping = seen > max;
            if !dropping {
                out.push(c);
            }
        } else {
            dropping = false;
            out.push(c);
        }
    }
    // Dropping emoji can leave doubled spaces.
    out.split('\n')
        .map(|line| line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}
