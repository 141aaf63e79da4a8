use std::{env, fmt, path::PathBuf};

/// What `main` should do, decided purely from argument count: no flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Repl,
    RunFile(PathBuf),
}

#[derive(Debug, Clone)]
pub enum ArgsError {
    TooManyArguments,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyArguments => write!(f, "Usage: embers [path]"),
        }
    }
}

/// Zero args after argv[0] means REPL, one means run that path, more is a
/// usage error.
pub fn parse(mut args: impl Iterator<Item = String>) -> Result<Action, ArgsError> {
    args.next();
    let path = args.next();
    if args.next().is_some() {
        return Err(ArgsError::TooManyArguments);
    }
    Ok(match path {
        Some(path) => Action::RunFile(PathBuf::from(path)),
        None => Action::Repl,
    })
}

pub fn get_action() -> Result<Action, ArgsError> {
    parse(env::args())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_repl() {
        let args = vec!["embers".to_string()];
        assert_eq!(parse(args.into_iter()).unwrap(), Action::Repl);
    }

    #[test]
    fn one_argument_means_run_file() {
        let args = vec!["embers".to_string(), "script.em".to_string()];
        assert_eq!(parse(args.into_iter()).unwrap(), Action::RunFile(PathBuf::from("script.em")));
    }

    #[test]
    fn extra_arguments_are_a_usage_error() {
        let args = vec!["embers".to_string(), "a.em".to_string(), "b.em".to_string()];
        assert!(matches!(parse(args.into_iter()), Err(ArgsError::TooManyArguments)));
    }
}
