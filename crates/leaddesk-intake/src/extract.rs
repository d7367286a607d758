//! Deterministic feature extraction from call transcripts.
//!
//! Transcripts are split into speaker turns on `Label:` prefixes at the start
//! of a line. Agent labels (`agent`, `ai`, `assistant`, `receptionist`, `bot`)
//! and caller labels (`caller`, `user`, `customer`, `client`, `human`) are
//! recognised case-insensitively; unlabeled lines continue the previous turn.
//! A transcript with no labels at all is treated as one caller utterance.

use std::sync::LazyLock;

use leaddesk_core::{ExtractedFeatures, KeywordConfig, NameQuality, Urgency};
use regex::Regex;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 49;
const PROMPT_ANSWER_MAX_WORDS: usize = 4;
const TIMELINE_MAX_CHARS: usize = 80;

static TURN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(agent|ai|assistant|receptionist|bot|caller|user|customer|client|human)[ \t]*:",
    )
    .expect("valid turn regex")
});

static NAME_PROMPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:may|can|could)\s+i\s+(?:have|get|ask\s+for|ask)|what\s+is|what's)\s+your\s+(?:full\s+)?name\b",
    )
    .expect("valid name prompt regex")
});

static EMAIL_PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\be-?mail\b").expect("valid email prompt regex"));

/// Self-introduction phrasing. The phrase is case-insensitive; the captured
/// name must be capitalised so "I'm calling about" never matches.
static SELF_INTRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\bmy\s+name\s+is|\bthis\s+is|\bi'm|\bi\s+am)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+){0,2})",
    )
    .expect("valid self-intro regex")
});

static ANSWER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:sure|yes|yeah|okay|ok|of\s+course)\b)?[,.!\s]*(?:(?:my\s+name\s+is|my\s+name's|it's|it\s+is|this\s+is|i'm|i\s+am)\b)?\s*",
    )
    .expect("valid answer prefix regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([a-z0-9][a-z0-9._%+\-]*)\s*(?:@|\s+at\s+)\s*([a-z0-9\-]+(?:\s*(?:\.|\s+dot\s+)\s*[a-z0-9\-]+)+)",
    )
    .expect("valid email regex")
});

static EMAIL_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}$")
        .expect("valid email shape regex")
});

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?[km]\b)?(?:\s*(?:-|to)\s*\$?\s?\d[\d,]*(?:\.\d+)?(?:\s?[km]\b)?)?|\b\d[\d,]*(?:\s*(?:-|to)\s*\d[\d,]*)?\s+dollars\b",
    )
    .expect("valid budget regex")
});

static TIMELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:need(?:ed)?|want(?:ed)?|start(?:ed)?|done|finished|ready|closing)\s+(?:it\s+|this\s+|to\s+start\s+)?by|within|in\s+the\s+next)\s+[^.,;!?\n]+",
    )
    .expect("valid timeline regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    Agent,
    Caller,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Turn<'a> {
    speaker: Speaker,
    text: &'a str,
}

fn split_turns(transcript: &str) -> Vec<Turn<'_>> {
    let labels: Vec<_> = TURN_RE.captures_iter(transcript).collect();
    if labels.is_empty() {
        return vec![Turn {
            speaker: Speaker::Caller,
            text: transcript.trim(),
        }];
    }

    let mut turns = Vec::with_capacity(labels.len());
    for (i, caps) in labels.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = labels
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(transcript.len(), |m| m.start());
        let speaker = match label.as_str().to_ascii_lowercase().as_str() {
            "caller" | "user" | "customer" | "client" | "human" => Speaker::Caller,
            _ => Speaker::Agent,
        };
        turns.push(Turn {
            speaker,
            text: transcript[whole.end()..end].trim(),
        });
    }
    turns
}

/// Trim, strip trailing periods, and apply the length band.
fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches('.').trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return None;
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '\'' || c == '-' || c == '.')
    {
        return None;
    }
    Some(name.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Short free-text answers to the receptionist's name prompt.
fn name_from_prompt_answers(turns: &[Turn<'_>]) -> Option<String> {
    turns.windows(2).find_map(|pair| {
        let [question, answer] = pair else {
            return None;
        };
        if question.speaker != Speaker::Agent
            || answer.speaker != Speaker::Caller
            || !NAME_PROMPT_RE.is_match(question.text)
        {
            return None;
        }
        let stripped = ANSWER_PREFIX_RE.replace(answer.text, "");
        let stripped = stripped.trim().trim_end_matches(['.', '!']);
        if stripped.split_whitespace().count() > PROMPT_ANSWER_MAX_WORDS {
            return None;
        }
        clean_name(stripped)
    })
}

fn name_from_self_introduction(turns: &[Turn<'_>]) -> Option<String> {
    turns
        .iter()
        .filter(|t| t.speaker == Speaker::Caller)
        .flat_map(|t| SELF_INTRO_RE.captures_iter(t.text))
        .find_map(|caps| caps.get(1).and_then(|m| clean_name(m.as_str())))
}

/// Normalize a spoken address: `at` becomes `@`, `dot` becomes `.`, all
/// whitespace is removed, and the result is lowercased.
#[must_use]
pub fn clean_email(raw: &str) -> Option<String> {
    let spaced = format!(" {} ", raw.to_lowercase());
    let replaced = spaced.replace(" at ", "@").replace(" dot ", ".");
    let compact: String = replaced
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('.')
        .to_string();
    EMAIL_SHAPE_RE.is_match(&compact).then_some(compact)
}

fn email_from_turns(turns: &[Turn<'_>]) -> Option<String> {
    let find = |text: &str| {
        EMAIL_RE
            .captures_iter(text)
            .find_map(|caps| clean_email(caps.get(0).map_or("", |m| m.as_str())))
    };

    let prompted = turns.windows(2).find_map(|pair| {
        let [question, answer] = pair else {
            return None;
        };
        (question.speaker == Speaker::Agent
            && answer.speaker == Speaker::Caller
            && EMAIL_PROMPT_RE.is_match(question.text))
        .then(|| find(answer.text))
        .flatten()
    });

    prompted.or_else(|| {
        turns
            .iter()
            .filter(|t| t.speaker == Speaker::Caller)
            .find_map(|t| find(t.text))
    })
}

fn keyword_regex(keyword: &str) -> Result<Regex, regex::Error> {
    let words: Vec<String> = keyword.split_whitespace().map(regex::escape).collect();
    Regex::new(&format!(r"(?i)\b{}\b", words.join(r"\s+")))
}

/// Compiled keyword matchers plus the fixed name/budget/timeline heuristics.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pain_points: Vec<(String, Regex)>,
    urgency: Vec<Regex>,
}

impl FeatureExtractor {
    /// Compile matchers for the given vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if a keyword produces an oversized pattern.
    pub fn new(keywords: &KeywordConfig) -> Result<Self, regex::Error> {
        let pain_points = keywords
            .pain_points
            .iter()
            .map(|k| keyword_regex(k).map(|re| (k.trim().to_string(), re)))
            .collect::<Result<Vec<_>, _>>()?;
        let urgency = keywords
            .urgency
            .iter()
            .map(String::as_str)
            .map(keyword_regex)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pain_points,
            urgency,
        })
    }

    /// Extract features from one transcript. Never fails.
    ///
    /// `phone` is the normalized caller phone, used as the placeholder name.
    #[must_use]
    pub fn extract(&self, transcript: &str, phone: &str) -> ExtractedFeatures {
        let turns = split_turns(transcript);

        let (name, name_quality) = name_from_prompt_answers(&turns)
            .map(|n| (n, NameQuality::IntakeAnswer))
            .or_else(|| {
                name_from_self_introduction(&turns).map(|n| (n, NameQuality::SelfIntroduced))
            })
            .unwrap_or_else(|| (phone.to_string(), NameQuality::Placeholder));

        let mut pain_points: Vec<String> = Vec::new();
        for (keyword, re) in &self.pain_points {
            if re.is_match(transcript)
                && !pain_points.iter().any(|p| p.eq_ignore_ascii_case(keyword))
            {
                pain_points.push(keyword.clone());
            }
        }

        let urgency = if self.urgency.iter().any(|re| re.is_match(transcript)) {
            Urgency::High
        } else {
            Urgency::Medium
        };

        let budget = BUDGET_RE
            .find(transcript)
            .map(|m| m.as_str().trim().to_string());

        let timeline = TIMELINE_RE.find(transcript).map(|m| {
            m.as_str()
                .trim()
                .chars()
                .take(TIMELINE_MAX_CHARS)
                .collect::<String>()
        });

        ExtractedFeatures {
            name,
            name_quality,
            email: email_from_turns(&turns),
            pain_points,
            urgency,
            budget,
            timeline,
        }
    }
}

static DEFAULT_EXTRACTOR: LazyLock<FeatureExtractor> = LazyLock::new(|| {
    FeatureExtractor::new(&KeywordConfig::default()).expect("built-in keywords compile")
});

impl Default for FeatureExtractor {
    fn default() -> Self {
        DEFAULT_EXTRACTOR.clone()
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
