//! Line commands accepted by the terminal review loop

use std::path::PathBuf;

use crate::history::{HistoryFilter, HistorySort};
use crate::workflow::TagPath;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pass,
    Defer,
    Fail,
    OpenCode { path: TagPath, text: String },
    ToggleTag(String),
    NewTag { name: String, description: String, color: String },
    EditTag { id: String, name: String, description: String, color: String },
    DeleteTag { id: String, untag_traces: bool },
    MergeTags { source: String, target: String },
    ApplyTags,
    Cancel,
    Undo,
    Next,
    Previous,
    GoTo(usize),
    Tags,
    History { filter: HistoryFilter, sort: HistorySort },
    Stats,
    Export(Option<PathBuf>),
    Reviewer(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
p                         pass
d                         defer
f                         fail (starts open coding)
now <note>                submit open code, then tag (>= 20 chars)
later <note>              submit open code and record the failure untagged
t <tag_id>                toggle a tag on the failure being tagged
newtag <name> | <description> [| <color>]
edittag <id> | <name> | <description> [| <color>]
deltag <id> [untag]       delete a tag, optionally untagging traces
merge <source> <target>   merge one tag into another
apply                     record the failure with the selected tags
cancel                    abandon the failure being drafted
u                         undo the last decision
n / b                     next / previous trace
g <n>                     go to trace number n (1-based)
tags                      list the tag library
history [filter] [sort]   filter: all|pass|fail|defer|unreviewed  sort: original|recent|status
stats                     review statistics
export [path]             write the session as JSON
reviewer <id>             change and save the reviewer id
help                      this text
q                         quit";

fn split_fields(rest: &str) -> Vec<String> {
    rest.split('|').map(|field| field.trim().to_string()).collect()
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("Usage: {}", usage))
    } else {
        Ok(rest)
    }
}

impl Command {
    /// Parse one input line; the error is a message for the reviewer
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "p" | "pass" => Ok(Command::Pass),
            "d" | "defer" => Ok(Command::Defer),
            "f" | "fail" => Ok(Command::Fail),
            "now" => Ok(Command::OpenCode {
                path: TagPath::Now,
                text: rest.to_string(),
            }),
            "later" => Ok(Command::OpenCode {
                path: TagPath::Later,
                text: rest.to_string(),
            }),
            "t" | "tag" => Ok(Command::ToggleTag(
                required(rest, "t <tag_id>")?.to_string(),
            )),
            "newtag" => {
                let usage = "newtag <name> | <description> [| <color>]";
                let fields = split_fields(required(rest, usage)?);
                match fields.as_slice() {
                    [name, description] => Ok(Command::NewTag {
                        name: name.clone(),
                        description: description.clone(),
                        color: String::new(),
                    }),
                    [name, description, color] => Ok(Command::NewTag {
                        name: name.clone(),
                        description: description.clone(),
                        color: color.clone(),
                    }),
                    _ => Err(format!("Usage: {}", usage)),
                }
            }
            "edittag" => {
                let usage = "edittag <id> | <name> | <description> [| <color>]";
                let fields = split_fields(required(rest, usage)?);
                match fields.as_slice() {
                    [id, name, description] => Ok(Command::EditTag {
                        id: id.clone(),
                        name: name.clone(),
                        description: description.clone(),
                        color: String::new(),
                    }),
                    [id, name, description, color] => Ok(Command::EditTag {
                        id: id.clone(),
                        name: name.clone(),
                        description: description.clone(),
                        color: color.clone(),
                    }),
                    _ => Err(format!("Usage: {}", usage)),
                }
            }
            "deltag" => {
                let mut parts = required(rest, "deltag <id> [untag]")?.split_whitespace();
                let id = parts.next().unwrap_or_default().to_string();
                let untag_traces = matches!(parts.next(), Some("untag"));
                Ok(Command::DeleteTag { id, untag_traces })
            }
            "merge" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                match parts.as_slice() {
                    [source, target] => Ok(Command::MergeTags {
                        source: source.to_string(),
                        target: target.to_string(),
                    }),
                    _ => Err("Usage: merge <source> <target>".to_string()),
                }
            }
            "apply" => Ok(Command::ApplyTags),
            "cancel" => Ok(Command::Cancel),
            "u" | "undo" => Ok(Command::Undo),
            "n" | "next" => Ok(Command::Next),
            "b" | "back" | "prev" => Ok(Command::Previous),
            "g" | "goto" => {
                let number: usize = required(rest, "g <n>")?
                    .parse()
                    .map_err(|_| format!("Not a trace number: {}", rest))?;
                if number == 0 {
                    return Err("Trace numbers start at 1".to_string());
                }
                Ok(Command::GoTo(number - 1))
            }
            "tags" => Ok(Command::Tags),
            "history" | "h" => {
                let mut filter = HistoryFilter::default();
                let mut sort = HistorySort::default();
                for arg in rest.split_whitespace() {
                    if let Ok(parsed) = arg.parse::<HistoryFilter>() {
                        filter = parsed;
                    } else {
                        sort = arg.parse::<HistorySort>().map_err(|e| e.to_string())?;
                    }
                }
                Ok(Command::History { filter, sort })
            }
            "stats" => Ok(Command::Stats),
            "export" => Ok(Command::Export(
                (!rest.is_empty()).then(|| PathBuf::from(rest)),
            )),
            "reviewer" => Ok(Command::Reviewer(
                required(rest, "reviewer <id>")?.to_string(),
            )),
            "help" | "?" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "" => Err("Type 'help' for commands".to_string()),
            other => Err(format!("Unknown command '{}'; type 'help'", other)),
        }
    }
}
