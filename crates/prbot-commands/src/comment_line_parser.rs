//! Line classifier for the comment-command grammar.
//!
//! A comment body is read one line at a time. After trimming, a line is either
//! a command (`/NAME ARGS...`), a named argument for the previous command
//! (`+NAME[:TAG] ARGS...`), or noise. Everything after the first run of
//! whitespace is kept verbatim as the argument tail.

pub const COMMAND_SIGIL: char = '/';
pub const NAMED_ARGUMENT_SIGIL: char = '+';
pub const NAMED_ARGUMENT_TAG_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ParsedCommentLine` values.
pub enum ParsedCommentLine<'a> {
    Command {
        name: &'a str,
        args: Option<&'a str>,
    },
    NamedArguments {
        name: &'a str,
        args: Option<&'a str>,
    },
    Ignored,
}

/// Split a comment body into lines, accepting both `\n` and `\r\n` endings.
pub fn split_comment_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
}

pub fn parse_comment_line(line: &str) -> ParsedCommentLine<'_> {
    let trimmed = line.trim();
    if let Some((name, args)) = parse_command_line(trimmed) {
        return ParsedCommentLine::Command { name, args };
    }
    if let Some((name, args)) = parse_named_arguments_line(trimmed) {
        return ParsedCommentLine::NamedArguments { name, args };
    }
    ParsedCommentLine::Ignored
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch == '-'
}

fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-'
}

fn take_while_prefix(raw: &str, predicate: impl Fn(char) -> bool) -> (&str, &str) {
    let end = raw
        .char_indices()
        .find(|(_, ch)| !predicate(*ch))
        .map(|(index, _)| index)
        .unwrap_or(raw.len());
    raw.split_at(end)
}

/// Parse the optional argument tail. `None` means the line does not match.
fn parse_argument_tail(remainder: &str) -> Option<Option<&str>> {
    if remainder.is_empty() {
        return Some(None);
    }
    if !remainder.starts_with(char::is_whitespace) {
        return None;
    }
    let tail = remainder.trim_start();
    if tail.is_empty() {
        return Some(None);
    }
    Some(Some(tail))
}

fn parse_command_line(trimmed: &str) -> Option<(&str, Option<&str>)> {
    let rest = trimmed.strip_prefix(COMMAND_SIGIL)?;
    let (name, remainder) = take_while_prefix(rest, is_name_char);
    if name.is_empty() {
        return None;
    }
    let args = parse_argument_tail(remainder)?;
    Some((name, args))
}

fn parse_named_arguments_line(trimmed: &str) -> Option<(&str, Option<&str>)> {
    let rest = trimmed.strip_prefix(NAMED_ARGUMENT_SIGIL)?;
    let (base, mut remainder) = take_while_prefix(rest, is_name_char);
    if base.is_empty() {
        return None;
    }
    let mut name_len = base.len();
    if let Some(after_separator) = remainder.strip_prefix(NAMED_ARGUMENT_TAG_SEPARATOR) {
        let (tag, after_tag) = take_while_prefix(after_separator, is_tag_char);
        if tag.is_empty() {
            return None;
        }
        name_len += NAMED_ARGUMENT_TAG_SEPARATOR.len_utf8() + tag.len();
        remainder = after_tag;
    }
    let args = parse_argument_tail(remainder)?;
    Some((&rest[..name_len], args))
}
