//! Mention parsing and the canonical mention prefix for outgoing replies.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"@[\w.-]+(?:@[\w.-]+)?").expect("mention pattern must compile")
    })
}

/// Splits `@user` / `@user@domain` tokens out of `text`.
///
/// Returns the tokens in order of appearance and the text with every token
/// removed. Surrounding whitespace is left for the sanitizer to normalise.
pub fn extract_mentions(text: &str) -> (Vec<String>, String) {
    let pattern = mention_pattern();
    let mentions = pattern
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect();
    let remaining = pattern.replace_all(text, "").into_owned();
    (mentions, remaining)
}

/// Sorted, deduplicated set of fully-qualified `@user@host` mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionSet(BTreeSet<String>);

impl MentionSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, mention: &str) -> bool {
        self.0.contains(mention)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Mentions joined by single spaces.
    pub fn prefix(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }

    pub fn prepend_to(&self, reply: &str) -> String {
        if self.is_empty() {
            reply.to_string()
        } else {
            format!("{} {}", self.prefix(), reply)
        }
    }
}

impl fmt::Display for MentionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Builds the mention list a reply should start with.
///
/// Everyone mentioned in the thread plus the original author is included,
/// bare handles are qualified with `local_domain`, and the bot itself is
/// always left out. Input order does not affect the result.
pub fn build_mention_prefix<I, S>(
    thread_mentions: I,
    original_author: &str,
    bot_handle: &str,
    local_domain: &str,
) -> MentionSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let bot = qualify_handle(bot_handle, local_domain);
    let mut mentions = BTreeSet::new();
    let candidates = thread_mentions
        .into_iter()
        .map(|handle| qualify_handle(handle.as_ref(), local_domain))
        .chain(std::iter::once(qualify_handle(original_author, local_domain)));

    for candidate in candidates.flatten() {
        let is_bot = bot
            .as_deref()
            .is_some_and(|bot| bot.eq_ignore_ascii_case(&candidate));
        if !is_bot {
            mentions.insert(candidate);
        }
    }
    MentionSet(mentions)
}

pub(crate) fn qualify_handle(handle: &str, local_domain: &str) -> Option<String> {
    let handle = handle.trim().trim_start_matches('@');
    if handle.is_empty() {
        return None;
    }
    let local_domain = local_domain.trim();
    if handle.contains('@') || local_domain.is_empty() {
        Some(format!("@{handle}"))
    } else {
        Some(format!("@{handle}@{local_domain}"))
    }
}
