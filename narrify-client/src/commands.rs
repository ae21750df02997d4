//! Shell command parsing.

use narrify_core::PostId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Register { username: String, email: String, password: String },
    Logout,
    WhoAmI,
    /// Raw search text, possibly empty.
    Search(String),
    Feed,
    More,
    Mine,
    Show(PostId),
    New,
    Edit(PostId),
    Delete(PostId),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid post id '{0}'")]
    InvalidId(String),
}

pub const HELP: &str = "\
commands:
  login <username> <password>
  register <username> <email> <password>
  logout | whoami
  search <text>      filter the feed (debounced)
  feed | more        show the feed, reveal the next page
  mine               your posts
  show <id> | new | edit <id> | delete <id>
  refresh | help | quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb {
        "login" => match args.as_slice() {
            [username, password] => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => return Err(CommandError::Usage("login <username> <password>")),
        },
        "register" => match args.as_slice() {
            [username, email, password] => Command::Register {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => return Err(CommandError::Usage("register <username> <email> <password>")),
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "search" | "/" => Command::Search(rest.to_string()),
        "feed" | "home" => Command::Feed,
        "more" => Command::More,
        "mine" | "dashboard" => Command::Mine,
        "show" => Command::Show(post_id(&args, "show <id>")?),
        "new" => Command::New,
        "edit" => Command::Edit(post_id(&args, "edit <id>")?),
        "delete" => Command::Delete(post_id(&args, "delete <id>")?),
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn post_id(args: &[&str], usage: &'static str) -> Result<PostId, CommandError> {
    match args {
        [raw] => raw
            .parse()
            .map_err(|_| CommandError::InvalidId(raw.to_string())),
        _ => Err(CommandError::Usage(usage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse("login amy x").unwrap(),
            Some(Command::Login {
                username: "amy".into(),
                password: "x".into()
            })
        );
        assert_eq!(parse("show 7").unwrap(), Some(Command::Show(PostId(7))));
        assert_eq!(parse("  search  cats and dogs ").unwrap(), Some(Command::Search("cats and dogs".into())));
        assert_eq!(parse("search").unwrap(), Some(Command::Search(String::new())));
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(parse("edit"), Err(CommandError::Usage("edit <id>")));
        assert_eq!(parse("delete abc"), Err(CommandError::InvalidId("abc".into())));
        assert_eq!(parse("fly"), Err(CommandError::Unknown("fly".into())));
        assert!(matches!(parse("login amy"), Err(CommandError::Usage(_))));
    }
}
