use std::process::{Command, ExitStatus};

use crate::error::PagerError;

const FALLBACK: [&str; 2] = ["vim", "-R"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PagerCommand {
    pub fn resolve(pager: Option<&str>, path: &str) -> Result<Self, PagerError> {
        if path.is_empty() {
            return Err(PagerError::NoPath);
        }

        let mut words: Vec<String> = pager
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        if words.is_empty() {
            words = FALLBACK.iter().map(|word| (*word).to_owned()).collect();
        }

        let program = words.remove(0);
        words.push(path.to_owned());
        Ok(Self {
            program,
            args: words,
        })
    }

    pub fn from_env(path: &str) -> Result<Self, PagerError> {
        let pager = std::env::var("PAGER").ok();
        Self::resolve(pager.as_deref(), path)
    }

    pub fn run(&self) -> Result<ExitStatus, PagerError> {
        tracing::info!(program = %self.program, args = ?self.args, "opening pager");
        Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|source| PagerError::Launch {
                program: self.program.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::PagerCommand;
    use crate::error::PagerError;

    #[test]
    fn pager_env_words_come_before_the_path() {
        let cmd = PagerCommand::resolve(Some("less -R +G"), "/logs/1.out").expect("resolve");
        assert_eq!(cmd.program, "less");
        assert_eq!(cmd.args, vec!["-R", "+G", "/logs/1.out"]);
    }

    #[test]
    fn blank_pager_falls_back_to_vim() {
        for pager in [None, Some(""), Some("   ")] {
            let cmd = PagerCommand::resolve(pager, "/logs/1.err").expect("resolve");
            assert_eq!(cmd.program, "vim");
            assert_eq!(cmd.args, vec!["-R", "/logs/1.err"]);
        }
    }

    #[test]
    fn empty_path_is_refused() {
        assert!(matches!(
            PagerCommand::resolve(Some("less"), ""),
            Err(PagerError::NoPath)
        ));
    }

    #[test]
    fn missing_program_reports_launch_failure() {
        let cmd = PagerCommand {
            program: "jobtail-no-such-pager".to_owned(),
            args: vec!["/dev/null".to_owned()],
        };
        assert!(matches!(cmd.run(), Err(PagerError::Launch { .. })));
    }
}
