/// Available slash commands with descriptions for autocomplete.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/attach", "Attach an image to the next question"),
    ("/detach", "Remove the attached image"),
    ("/rate", "Rate the latest answer (1-5)"),
    ("/stats", "Show review statistics"),
    ("/clear", "Start a fresh conversation"),
    ("/help", "Show commands and keys"),
    ("/exit", "Quit"),
];

/// Return commands matching the given prefix (e.g. "/ra" → /rate).
pub fn completions(prefix: &str) -> Vec<(String, String)> {
    COMMANDS
        .iter()
        .filter(|(cmd, _)| cmd.starts_with(prefix))
        .map(|(cmd, desc)| (cmd.to_string(), desc.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stage the image at the given path.
    Attach(String),
    Detach,
    /// Open the rating dialog, preselecting a star count when given.
    Rate(Option<u8>),
    Stats,
    Clear,
    Help,
    Exit,
}

/// Parse a slash command from input. Returns None if not a command.
pub fn parse(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next()?;
    let arg = parts.next().map(|s| s.trim().to_string());
    match cmd {
        "/attach" => arg.filter(|a| !a.is_empty()).map(Command::Attach),
        "/detach" => Some(Command::Detach),
        "/rate" => Some(Command::Rate(
            arg.and_then(|a| a.parse::<u8>().ok())
                .filter(|n| (1..=5).contains(n)),
        )),
        "/stats" => Some(Command::Stats),
        "/clear" | "/new" => Some(Command::Clear),
        "/help" | "/?" => Some(Command::Help),
        "/exit" | "/quit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(
            parse("/attach ~/photos/q.png"),
            Some(Command::Attach("~/photos/q.png".to_string()))
        );
        assert_eq!(parse("/detach"), Some(Command::Detach));
        assert_eq!(parse("/rate"), Some(Command::Rate(None)));
        assert_eq!(parse("/rate 4"), Some(Command::Rate(Some(4))));
        assert_eq!(parse("/stats"), Some(Command::Stats));
        assert_eq!(parse("/clear"), Some(Command::Clear));
        assert_eq!(parse("/new"), Some(Command::Clear));
        assert_eq!(parse("/help"), Some(Command::Help));
        assert_eq!(parse("/?"), Some(Command::Help));
        assert_eq!(parse("  /exit  "), Some(Command::Exit));
        assert_eq!(parse("/quit"), Some(Command::Exit));
    }

    #[test]
    fn attach_requires_a_path() {
        assert_eq!(parse("/attach"), None);
        assert_eq!(parse("/attach   "), None);
    }

    #[test]
    fn out_of_range_ratings_open_the_dialog_unset() {
        assert_eq!(parse("/rate 0"), Some(Command::Rate(None)));
        assert_eq!(parse("/rate 9"), Some(Command::Rate(None)));
        assert_eq!(parse("/rate five"), Some(Command::Rate(None)));
    }

    #[test]
    fn non_commands_pass_through() {
        assert_eq!(parse("ما ناتج ٢ + ٢؟"), None);
        assert_eq!(parse("/unknown"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn completions_filter_by_prefix() {
        let all = completions("/");
        assert_eq!(all.len(), COMMANDS.len());

        let rate = completions("/ra");
        assert_eq!(rate.len(), 1);
        assert_eq!(rate[0].0, "/rate");

        assert!(completions("/zzz").is_empty());
    }
}
