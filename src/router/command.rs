//! Input line classification.
//!
//! Lines starting with `/` are commands: a case-insensitive verb followed by
//! whitespace-separated arguments, with the trailing argument of `/send`
//! keeping its embedded whitespace. An unknown `/` verb is an error, never
//! chat. Everything else is chat text, verbatim.

use crate::error::CommandError;

/// A classified input line. Borrows from the line it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/register <name>`, or a rename when already registered.
    Register { name: &'a str },
    /// `/unregister`
    Unregister,
    /// `/create <group>`
    GroupCreate { name: &'a str },
    /// `/join <group>`
    GroupJoin { name: &'a str },
    /// `/leave <group>`
    GroupLeave { name: &'a str },
    /// `/remove <group>`
    GroupRemove { name: &'a str },
    /// `/list`
    GroupList,
    /// `/topic create <name>`
    TopicCreate { name: &'a str },
    /// `/topic subscribe <name>`
    TopicSubscribe { name: &'a str },
    /// `/topic unsubscribe <name>`
    TopicUnsubscribe { name: &'a str },
    /// `/topic list`
    TopicList,
    /// `/send user <target> <message>`
    SendUser { target: &'a str, body: &'a str },
    /// `/send group <target> <message>`
    SendGroup { target: &'a str, body: &'a str },
    /// `/send <target> <message>`: group match first, then user.
    SendAuto { target: &'a str, body: &'a str },
    /// `/users`
    Users,
    /// `/exit`
    Exit,
    /// Any non-`/` line.
    Chat { body: &'a str },
}

const USAGE_REGISTER: &str = "/register <name>";
const USAGE_GROUP: &str = "/create|/join|/leave|/remove <group>";
const USAGE_TOPIC: &str = "/topic <create|subscribe|unsubscribe|list> [name]";
const USAGE_SEND: &str = "/send [user|group] <target> <message>";

/// Split off the first whitespace-delimited word, returning it and the
/// remainder with leading whitespace trimmed.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(pos) => (&input[..pos], input[pos..].trim_start()),
        None => (input, ""),
    }
}

/// Expect exactly one word of `args`; anything more or less is a usage error.
fn single_word<'a>(args: &'a str, usage: &'static str) -> Result<&'a str, CommandError> {
    let (word, rest) = split_word(args);
    if word.is_empty() || !rest.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok(word)
}

/// Classify one input line.
pub fn parse_line(line: &str) -> Result<Command<'_>, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat { body: line });
    };

    let (verb, args) = split_word(rest);
    match verb.to_lowercase().as_str() {
        "register" => Ok(Command::Register { name: single_word(args, USAGE_REGISTER)? }),
        "unregister" => Ok(Command::Unregister),
        "create" => Ok(Command::GroupCreate { name: single_word(args, USAGE_GROUP)? }),
        "join" => Ok(Command::GroupJoin { name: single_word(args, USAGE_GROUP)? }),
        "leave" => Ok(Command::GroupLeave { name: single_word(args, USAGE_GROUP)? }),
        "remove" => Ok(Command::GroupRemove { name: single_word(args, USAGE_GROUP)? }),
        "list" => Ok(Command::GroupList),
        "topic" => parse_topic(args),
        "send" => parse_send(args),
        "users" => Ok(Command::Users),
        "exit" => Ok(Command::Exit),
        "" => Err(CommandError::Unknown(String::new())),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_topic(args: &str) -> Result<Command<'_>, CommandError> {
    let (sub, rest) = split_word(args);
    match sub.to_lowercase().as_str() {
        "create" => Ok(Command::TopicCreate { name: single_word(rest, USAGE_TOPIC)? }),
        "subscribe" => Ok(Command::TopicSubscribe { name: single_word(rest, USAGE_TOPIC)? }),
        "unsubscribe" => Ok(Command::TopicUnsubscribe { name: single_word(rest, USAGE_TOPIC)? }),
        "list" => Ok(Command::TopicList),
        _ => Err(CommandError::Usage(USAGE_TOPIC)),
    }
}

fn parse_send(args: &str) -> Result<Command<'_>, CommandError> {
    let (first, rest) = split_word(args);
    if first.is_empty() {
        return Err(CommandError::Usage(USAGE_SEND));
    }
    if first.eq_ignore_ascii_case("user") || first.eq_ignore_ascii_case("group") {
        let (target, body) = split_word(rest);
        if target.is_empty() || body.is_empty() {
            return Err(CommandError::Usage(USAGE_SEND));
        }
        if first.eq_ignore_ascii_case("user") {
            Ok(Command::SendUser { target, body })
        } else {
            Ok(Command::SendGroup { target, body })
        }
    } else {
        // Legacy form: /send <target> <message>
        if rest.is_empty() {
            return Err(CommandError::Usage(USAGE_SEND));
        }
        Ok(Command::SendAuto { target: first, body: rest })
    }
}
