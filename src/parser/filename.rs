use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;

/// Best-effort guess recovered from a video file name and its folder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub title: String,
    pub season: i32,
    pub episode: Option<i32>,
    pub episode_title: Option<String>,
}

const DEFAULT_SEASON: i32 = 1;

/// Resolution values that show up without a `p` suffix in some release names.
const BARE_RESOLUTIONS: [i32; 5] = [480, 576, 720, 1080, 2160];

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn season_episode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(
        &RE,
        r"(?i)(?:^|[^a-z0-9])s(?P<season>\d{1,3})[\s._-]?e(?P<episode>\d{1,4})(?:v\d+)?(?:[^0-9]|$)",
    )
}

fn episode_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(
        &RE,
        r"(?i)(?:^|[\s._\-])(?:episode|ep|e)[\s._]*(?P<episode>\d{1,4})(?:v\d+)?(?:[^0-9a-z]|$)",
    )
}

fn season_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(
        &RE,
        r"(?i)(?:^|[^a-z0-9])(?:season[\s._-]*|s)(?P<season>\d{1,3})(?:[^0-9a-z]|$)",
    )
}

fn ordinal_season_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(
        &RE,
        r"(?i)(?:^|[^a-z0-9])(?P<season>\d{1,2})(?:st|nd|rd|th)[\s._-]+season(?:[^a-z]|$)",
    )
}

fn group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}|【[^】]*】")
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(
        &RE,
        r"(?i)(?:^|[\s._\-])(?P<tag>2160p|1080p|1080i|720p|576p|480p|4k|uhd|blu-?ray|bdrip|bd|web-?dl|web-?rip|web|hdtv|dvd-?rip|dvd|[hx][.]?26[45]|hevc|avc|av1|aac(?:[0-9][.][0-9])?|flac|e?ac3|dts|opus|ddp?[0-9][.][0-9]|10-?bit|8-?bit|hdr|remux|dual[\s._-]?audio|multi-?subs?)(?:[\s._\-]|$)",
    )
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"(?:^|[\s._\-])(?P<year>(?:19|20)\d{2})(?:[\s._\-]|$)")
}

/// Parses a video file name, using `path_hints` (ancestor folder names between
/// the library root and the file, innermost last) to recover a season the file
/// name does not carry.
///
/// Never fails: unrecognised input yields `episode: None` and a title derived
/// from whatever text is left.
#[must_use]
pub fn parse(filename: &str, path_hints: &[&str]) -> ParsedName {
    let mut text = blank_groups(strip_extension(filename));
    blank_all(&mut text, noise_re(), "tag");

    let mut season = None;
    let mut marker: Option<Range<usize>> = None;
    let mut episode = None;

    if let Some(caps) = season_episode_re().captures(&text) {
        season = capture_number(&caps, "season");
        episode = capture_number(&caps, "episode");
        marker = token_span(&caps, "episode");
    } else {
        if let Some(span) = find_season_token(&text) {
            season = parse_number(&text[span.clone()]);
            blank(&mut text, span);
        }

        if let Some(caps) = episode_word_re().captures(&text) {
            episode = capture_number(&caps, "episode");
            marker = token_span(&caps, "episode");
        } else if let Some(span) = first_bare_number(&text) {
            episode = parse_number(&text[span.clone()]);
            let end = span.end + version_len(&text[span.end..]);
            marker = Some(token_start(&text, span.start)..end);
        }
    }

    let season = season
        .or_else(|| season_from_hints(path_hints))
        .unwrap_or(DEFAULT_SEASON);

    let (title, episode_title) = split_titles(&text, marker, filename);

    ParsedName {
        title,
        season,
        episode,
        episode_title,
    }
}

/// Cleans a raw folder or release name into a display title using the same
/// rules the file name parser applies to titles.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    let mut text = blank_groups(raw);
    blank_all(&mut text, noise_re(), "tag");
    while let Some(span) = find_season_token(&text) {
        blank(&mut text, span);
    }
    let cleaned = tidy(&text);
    if cleaned.is_empty() {
        raw.trim().to_string()
    } else {
        cleaned
    }
}

/// Scans folder names innermost first for a season marker.
#[must_use]
pub fn season_from_hints(path_hints: &[&str]) -> Option<i32> {
    path_hints.iter().rev().find_map(|hint| {
        let text = blank_groups(hint);
        find_season_token(&text).and_then(|span| parse_number(&text[span]))
    })
}

fn split_titles(
    text: &str,
    marker: Option<Range<usize>>,
    filename: &str,
) -> (String, Option<String>) {
    let Some(marker) = marker else {
        return (non_empty_or(tidy(text), filename), None);
    };

    let before = tidy(&text[..marker.start]);
    let after = tidy(&text[marker.end..]);

    if !before.is_empty() {
        let episode_title = (!after.is_empty()).then_some(after);
        return (before, episode_title);
    }

    // Nothing precedes the episode token, e.g. "05 - Title.mkv".
    (non_empty_or(after, filename), None)
}

fn non_empty_or(title: String, filename: &str) -> String {
    if title.is_empty() {
        filename.trim().to_string()
    } else {
        title
    }
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=4).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic()) =>
        {
            stem
        }
        _ => filename,
    }
}

/// Replaces bracketed and parenthesized groups with spaces so byte offsets of
/// the remaining text stay meaningful.
fn blank_groups(input: &str) -> String {
    group_re()
        .replace_all(input, |caps: &Captures| " ".repeat(caps[0].chars().count()))
        .into_owned()
}

fn blank(text: &mut String, span: Range<usize>) {
    let width = span.len();
    text.replace_range(span, &" ".repeat(width));
}

/// Blanks every match of `group`. Adjacent tags share a separator, so a match
/// consumed by one tag can hide the next one; loop until nothing is left.
fn blank_all(text: &mut String, re: &Regex, group: &str) {
    while let Some(span) = re
        .captures(text)
        .and_then(|caps| caps.name(group).map(|m| m.range()))
    {
        blank(text, span);
    }
}

fn find_season_token(text: &str) -> Option<Range<usize>> {
    let whole = ordinal_season_re()
        .find(text)
        .or_else(|| season_word_re().find(text))?;
    Some(trim_token(text, whole.range()))
}

/// Narrows a match to the token itself, dropping the boundary characters the
/// pattern had to consume so blanking it leaves neighbours alone.
fn trim_token(text: &str, whole: Range<usize>) -> Range<usize> {
    let token = &text[whole.clone()];
    let lead = token.len() - token.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
    let tail = token.len() - token.trim_end_matches(|c: char| !c.is_alphanumeric()).len();
    whole.start + lead..whole.end - tail
}

fn first_bare_number(text: &str) -> Option<Range<usize>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"\d+");

    re.find_iter(text)
        .map(|m| m.range())
        .find(|span| qualifies_as_episode(text, span))
}

fn qualifies_as_episode(text: &str, span: &Range<usize>) -> bool {
    let digits = &text[span.clone()];
    if digits.len() > 4 {
        return false;
    }
    let Ok(value) = digits.parse::<i32>() else {
        return false;
    };
    if digits.len() == 4 && (1900..=2099).contains(&value) {
        return false;
    }
    if BARE_RESOLUTIONS.contains(&value) && !dash_delimited(text, span) {
        return false;
    }

    let before = text[..span.start].chars().next_back();
    let after_text = &text[span.end..];
    let after = after_text.chars().next();

    // Decimal parts such as "2.0" or "5.1" are never episodes.
    let before_before = text[..span.start].chars().rev().nth(1);
    if before == Some('.') && before_before.is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    if after == Some('.') && after_text.chars().nth(1).is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }

    let left_open = before.is_none_or(is_separator);
    let right_open = after.is_none_or(is_separator);
    let left_glued = before.is_some_and(char::is_alphanumeric);
    let right_glued = after.is_some_and(char::is_alphabetic) && !is_version_suffix(after_text);

    (left_open || right_open) && !left_glued && !right_glued
}

/// True when the number sits between " - " separators (or a dash and the end),
/// the usual layout for an episode number rather than a resolution.
fn dash_delimited(text: &str, span: &Range<usize>) -> bool {
    let left = text[..span.start].trim_end();
    let right = text[span.end..].trim_start();
    left.ends_with('-') && (right.is_empty() || right.starts_with('-'))
}

fn is_version_suffix(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some('v' | 'V')) && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Byte length of a "v2" style suffix at the start of `text`, or zero.
fn version_len(text: &str) -> usize {
    if is_version_suffix(text) {
        1 + text[1..].chars().take_while(char::is_ascii_digit).count()
    } else {
        0
    }
}

/// Start of the token carrying `number`, used so the title ends before any
/// prefix glued to the number.
fn token_start(text: &str, number_start: usize) -> usize {
    text[..number_start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| !is_separator(*c))
        .last()
        .map_or(number_start, |(i, _)| i)
}

fn token_span(caps: &Captures, number: &str) -> Option<Range<usize>> {
    let whole = caps.get(0)?;
    let number = caps.name(number)?;
    let token = &whole.as_str()[..number.end() - whole.start()];
    let lead = token.len() - token.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
    // Keep any "v2" style suffix inside the consumed span.
    let version = version_len(&whole.as_str()[number.end() - whole.start()..]);
    Some(whole.start() + lead..number.end() + version)
}

fn capture_number(caps: &Captures, name: &str) -> Option<i32> {
    caps.name(name).and_then(|m| parse_number(m.as_str()))
}

fn parse_number(s: &str) -> Option<i32> {
    s.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '_' | '-')
}

/// Normalizes separators, drops years and dangling punctuation, and title-cases
/// each word.
fn tidy(text: &str) -> String {
    let mut text = text.to_string();
    blank_all(&mut text, year_re(), "year");

    text.replace(['_', '.'], " ")
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
