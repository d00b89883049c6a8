//! Ballot and moderator answer parsing.
//!
//! Workers answer in free text. These functions pull a candidate id out of
//! that text. Parsing is best-effort: anything that names no known
//! candidate is reported as [`ParsedVote::Unparsed`] (or `None`), and the
//! caller applies the defined fallback.
//!
//! | Function | Markers |
//! |----------|---------|
//! | [`parse_vote`] | `VOTE:` / `I vote for:`, then a standalone `abstain` |
//! | [`parse_moderator_choice`] | `WINNER:`, then any whole-word mention |
//!
//! Ids are only ever matched as whole words, so a single-letter id such as
//! `A` is not found inside "because". In free text, ids of up to
//! [`CASE_SENSITIVE_ID_LEN`] characters must also match case, which keeps
//! the article "a" from naming worker `A`.

use crate::core::worker_id::WorkerId;

const VOTE_MARKERS: [&str; 2] = ["vote:", "i vote for:"];
const WINNER_MARKER: &str = "winner:";
const ABSTAIN: &str = "abstain";

/// Ids this short only count as free-text mentions when their case matches
pub const CASE_SENSITIVE_ID_LEN: usize = 2;

/// Outcome of reading one ballot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedVote {
    Candidate(WorkerId),
    Abstain,
    Unparsed,
}

/// Parse a voting response against the candidate ids.
///
/// The first `VOTE:` or `I vote for:` line decides: its first token is
/// compared to the candidate ids (or `abstain`), and failing that the first
/// id mentioned on the rest of the line is taken. Without a marker line the
/// word `abstain` counts as an abstention and anything else is unparsed.
pub fn parse_vote(response: &str, candidates: &[WorkerId]) -> ParsedVote {
    if let Some(value) = marker_value(response, &VOTE_MARKERS) {
        if first_token(value).is_some_and(|t| t.eq_ignore_ascii_case(ABSTAIN)) {
            return ParsedVote::Abstain;
        }
        return match_candidate(value, candidates)
            .map(ParsedVote::Candidate)
            .unwrap_or(ParsedVote::Unparsed);
    }

    if find_word(&response.to_ascii_lowercase(), ABSTAIN).is_some() {
        ParsedVote::Abstain
    } else {
        ParsedVote::Unparsed
    }
}

/// Parse a moderator's answer.
///
/// A `WINNER:` line is preferred; otherwise the candidate mentioned first
/// in the text is taken.
pub fn parse_moderator_choice(response: &str, candidates: &[WorkerId]) -> Option<WorkerId> {
    if let Some(choice) =
        marker_value(response, &[WINNER_MARKER]).and_then(|v| match_candidate(v, candidates))
    {
        return Some(choice);
    }
    earliest_mention(response, candidates)
}

/// Characters that can appear inside a worker id
fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '#')
}

/// Text following the first marker found on any line
fn marker_value<'a>(response: &'a str, markers: &[&str]) -> Option<&'a str> {
    response.lines().find_map(|line| {
        let trimmed = line.trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '#');
        // ASCII lowering keeps byte offsets valid for slicing `trimmed`
        let lower = trimmed.to_ascii_lowercase();
        markers.iter().find_map(|marker| {
            let pos = lower.match_indices(marker).map(|(pos, _)| pos).find(|&pos| {
                !lower[..pos]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_alphanumeric)
            })?;
            trimmed.get(pos + marker.len()..)
        })
    })
}

/// First whitespace-separated token with surrounding punctuation removed
fn first_token(value: &str) -> Option<&str> {
    let token = value
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !is_id_char(c));
    (!token.is_empty()).then_some(token)
}

/// Candidate named by a marker's value: the first token, else the first mention
fn match_candidate(value: &str, candidates: &[WorkerId]) -> Option<WorkerId> {
    let token = first_token(value)?;
    candidates
        .iter()
        .find(|id| id.as_str().eq_ignore_ascii_case(token))
        .cloned()
        .or_else(|| earliest_mention(value, candidates))
}

/// Byte offset of the first whole-word occurrence of `needle`
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.match_indices(needle).map(|(pos, _)| pos).find(|&pos| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + needle.len()..].chars().next();
        !before.is_some_and(is_id_char) && !after.is_some_and(is_id_char)
    })
}

/// Candidate whose id appears earliest in the text (longest wins at equal position)
fn earliest_mention(text: &str, candidates: &[WorkerId]) -> Option<WorkerId> {
    let lower = text.to_ascii_lowercase();
    candidates
        .iter()
        .filter_map(|id| {
            let name = id.as_str();
            let pos = if name.chars().count() <= CASE_SENSITIVE_ID_LEN {
                find_word(text, name)
            } else {
                find_word(&lower, &name.to_ascii_lowercase())
            }?;
            Some((pos, std::cmp::Reverse(name.len()), id))
        })
        .min_by_key(|(pos, len, _)| (*pos, *len))
        .map(|(_, _, id)| id.clone())
}
