use crate::error::ConfigError;
use crate::layout::ViewMode;
use crate::pane::DEFAULT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub stdout_path: String,
    pub stderr_path: String,
    pub job_id: Option<String>,
    pub mode: ViewMode,
    pub capacity: usize,
    pub stacked: bool,
    pub mouse: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            stdout_path: String::new(),
            stderr_path: String::new(),
            job_id: None,
            mode: ViewMode::Both,
            capacity: DEFAULT_CAPACITY,
            stacked: false,
            mouse: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Options),
    Help,
}

fn parse_mode(value: &str) -> Result<ViewMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "both" => Ok(ViewMode::Both),
        "stdout" | "out" => Ok(ViewMode::Stdout),
        "stderr" | "err" => Ok(ViewMode::Stderr),
        _ => Err(ConfigError::InvalidMode(value.to_owned())),
    }
}

fn parse_capacity(value: &str) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidCapacity(value.to_owned())),
    }
}

pub fn parse_args<I>(args: I) -> Result<Invocation, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut stdout_set = false;
    let mut stderr_set = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if !arg.starts_with('-') || arg == "-" {
            if !stdout_set {
                options.stdout_path = arg;
                stdout_set = true;
            } else if !stderr_set {
                options.stderr_path = arg;
                stderr_set = true;
            } else {
                return Err(ConfigError::TooManyPaths);
            }
            continue;
        }

        let mut value_for = |flag: &'static str| args.next().ok_or(ConfigError::MissingValue(flag));

        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "--stdout" => {
                options.stdout_path = value_for("--stdout")?;
                stdout_set = true;
            }
            "--stderr" => {
                options.stderr_path = value_for("--stderr")?;
                stderr_set = true;
            }
            "--job" => options.job_id = Some(value_for("--job")?),
            "--mode" => options.mode = parse_mode(&value_for("--mode")?)?,
            "--lines" => options.capacity = parse_capacity(&value_for("--lines")?)?,
            "--stacked" => options.stacked = true,
            "--mouse" => options.mouse = true,
            flag => return Err(ConfigError::UnknownOption(flag.to_owned())),
        }
    }

    Ok(Invocation::Run(options))
}

pub fn usage(binary: &str) -> String {
    format!(
        "Usage: {binary} [OPTIONS] [STDOUT_PATH [STDERR_PATH]]\n\
         \n\
         Options:\n\
         \x20 --stdout PATH   job standard output log\n\
         \x20 --stderr PATH   job standard error log\n\
         \x20 --job ID        job identifier shown in the title\n\
         \x20 --mode MODE     initial view: both, stdout or stderr (default both)\n\
         \x20 --lines N       lines kept per pane (default {DEFAULT_CAPACITY})\n\
         \x20 --stacked       stack panes vertically\n\
         \x20 --mouse         enable mouse selection and wheel scrolling\n\
         \x20 -h, --help      show this help\n\
         \n\
         Example:\n\
         \x20 {binary} --job 4242 slurm-4242.out slurm-4242.err"
    )
}

#[cfg(test)]
mod tests {
    use super::{Invocation, Options, parse_args, usage};
    use crate::error::ConfigError;
    use crate::layout::ViewMode;

    fn parse(args: &[&str]) -> Result<Invocation, ConfigError> {
        parse_args(args.iter().map(|arg| (*arg).to_owned()))
    }

    fn run(args: &[&str]) -> Options {
        match parse(args) {
            Ok(Invocation::Run(options)) => options,
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn positional_paths_fill_stdout_then_stderr() {
        let options = run(&["a.out", "a.err"]);
        assert_eq!(options.stdout_path, "a.out");
        assert_eq!(options.stderr_path, "a.err");
        assert_eq!(options.mode, ViewMode::Both);
        assert_eq!(options.capacity, 5_000);
    }

    #[test]
    fn flags_override_defaults() {
        let options = run(&[
            "--stderr", "e.log", "--mode", "stderr", "--lines", "200", "--stacked", "--mouse",
            "--job", "77", "o.log",
        ]);
        assert_eq!(options.stdout_path, "o.log");
        assert_eq!(options.stderr_path, "e.log");
        assert_eq!(options.mode, ViewMode::Stderr);
        assert_eq!(options.capacity, 200);
        assert!(options.stacked);
        assert!(options.mouse);
        assert_eq!(options.job_id.as_deref(), Some("77"));
    }

    #[test]
    fn no_arguments_leaves_paths_unresolved() {
        let options = run(&[]);
        assert!(options.stdout_path.is_empty());
        assert!(options.stderr_path.is_empty());
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse(&["a", "-h"]), Ok(Invocation::Help));
        assert!(usage("jobtail").contains("--lines N"));
    }

    #[test]
    fn bad_input_is_reported() {
        assert_eq!(
            parse(&["--bogus"]),
            Err(ConfigError::UnknownOption("--bogus".to_owned()))
        );
        assert_eq!(parse(&["--lines"]), Err(ConfigError::MissingValue("--lines")));
        assert_eq!(
            parse(&["--lines", "0"]),
            Err(ConfigError::InvalidCapacity("0".to_owned()))
        );
        assert_eq!(
            parse(&["--mode", "sideways"]),
            Err(ConfigError::InvalidMode("sideways".to_owned()))
        );
        assert_eq!(parse(&["a", "b", "c"]), Err(ConfigError::TooManyPaths));
    }
}
