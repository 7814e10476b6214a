//! Argument vector as a stream of classified tokens.

/// Separates options from arguments that merely look like options.
pub(crate) const TERMINATOR: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// `--long`, `-a`, or either with an inline `=value`.
    Flag { flag: String, value: Option<String> },
    Terminator,
    Positional(String),
}

pub(crate) struct Tokens {
    rargs: Vec<String>,
    after_double_dash: bool,
}

impl Tokens {
    pub(crate) fn new(mut args: Vec<String>) -> Self {
        args.reverse();
        Self { rargs: args, after_double_dash: false }
    }

    pub(crate) fn after_double_dash(&self) -> bool {
        self.after_double_dash
    }

    pub(crate) fn peek_flag(&self) -> Option<&str> {
        self.rargs.last().map(String::as_str).filter(|it| !self.after_double_dash && is_flag_shaped(it))
    }

    pub(crate) fn next(&mut self) -> Option<Token> {
        let arg = self.rargs.pop()?;
        if self.after_double_dash {
            return Some(Token::Positional(arg));
        }
        if arg == TERMINATOR {
            self.after_double_dash = true;
            return Some(Token::Terminator);
        }
        if !is_flag_shaped(&arg) {
            return Some(Token::Positional(arg));
        }
        let token = match arg.split_once('=') {
            Some((flag, value)) => Token::Flag { flag: flag.to_string(), value: Some(value.to_string()) },
            None => Token::Flag { flag: arg, value: None },
        };
        Some(token)
    }

    /// The token after a value option. Another flag is not a value.
    pub(crate) fn next_value(&mut self) -> Option<String> {
        if self.peek_flag().is_some() {
            return None;
        }
        self.rargs.pop()
    }
}

/// `-x` and `--xyz` are flags; `-`, `-12` and `-3.5` are values.
pub(crate) fn is_flag_shaped(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-') && chars.next().map_or(false, |c| !c.is_ascii_digit())
}
