//! Console command grammar.
//!
//! One command per line, verb first, path arguments separated by
//! whitespace. Anything that does not parse is reported back to the
//! console rather than acted on.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { source: PathBuf, target: PathBuf },
    Cancel { source: PathBuf },
    Status { source: PathBuf },
    Sync { source: PathBuf },
    Shutdown,
}

impl Command {
    /// Parse one console line. `None` means the line is not a valid
    /// command, including a known verb with the wrong argument count.
    pub fn parse(line: &str) -> Option<Command> {
        let mut fields = line.split_whitespace();
        let verb = fields.next()?;
        let first = fields.next();
        let second = fields.next();
        if fields.next().is_some() {
            return None;
        }

        match (verb, first, second) {
            ("add", Some(source), Some(target)) => Some(Command::Add {
                source: PathBuf::from(source),
                target: PathBuf::from(target),
            }),
            ("cancel", Some(source), None) => Some(Command::Cancel {
                source: PathBuf::from(source),
            }),
            ("status", Some(source), None) => Some(Command::Status {
                source: PathBuf::from(source),
            }),
            ("sync", Some(source), None) => Some(Command::Sync {
                source: PathBuf::from(source),
            }),
            ("shutdown", None, None) => Some(Command::Shutdown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_verb() {
        assert_eq!(
            Command::parse("add /a /b"),
            Some(Command::Add {
                source: PathBuf::from("/a"),
                target: PathBuf::from("/b"),
            })
        );
        assert_eq!(
            Command::parse("cancel /a"),
            Some(Command::Cancel {
                source: PathBuf::from("/a"),
            })
        );
        assert_eq!(
            Command::parse("status /a"),
            Some(Command::Status {
                source: PathBuf::from("/a"),
            })
        );
        assert_eq!(
            Command::parse("sync /a"),
            Some(Command::Sync {
                source: PathBuf::from("/a"),
            })
        );
        assert_eq!(Command::parse("shutdown"), Some(Command::Shutdown));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(
            Command::parse("  sync   /a  "),
            Some(Command::Sync {
                source: PathBuf::from("/a"),
            })
        );
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert_eq!(Command::parse("add /a"), None);
        assert_eq!(Command::parse("add /a /b /c"), None);
        assert_eq!(Command::parse("cancel"), None);
        assert_eq!(Command::parse("cancel /a /b"), None);
        assert_eq!(Command::parse("shutdown now"), None);
    }

    #[test]
    fn unknown_verbs_and_empty_lines_are_rejected() {
        assert_eq!(Command::parse("restart /a"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn verbs_are_case_sensitive() {
        assert_eq!(Command::parse("SYNC /a"), None);
        assert_eq!(Command::parse("Shutdown"), None);
    }
}
