//! Command-line parsing.

use moon_bridge::{EngineConfig, StdLib};

/// What to evaluate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// `moon run <file.lua>`
    File(String),
    /// `moon eval '<chunk>'`
    Inline(String),
}

/// A parsed invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub source: Source,
    pub sandbox: bool,
    pub traceback: Option<bool>,
}

impl Options {
    /// Parse the arguments after the program name.
    ///
    /// Returns `Err` with a message suitable for stderr.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let Some((command, rest)) = args.split_first() else {
            return Err("missing command".to_string());
        };

        let mut sandbox = false;
        let mut traceback = None;
        let mut operand = None;
        for arg in rest {
            match arg.as_str() {
                "--sandbox" => sandbox = true,
                "--no-traceback" => traceback = Some(false),
                "--traceback" => traceback = Some(true),
                flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
                _ if operand.is_none() => operand = Some(arg.clone()),
                extra => return Err(format!("unexpected argument '{extra}'")),
            }
        }

        let source = match (command.as_str(), operand) {
            ("run", Some(path)) => Source::File(path),
            ("eval", Some(chunk)) => Source::Inline(chunk),
            ("run", None) => return Err("missing file path".to_string()),
            ("eval", None) => return Err("missing chunk".to_string()),
            (other, _) => return Err(format!("unknown command '{other}'")),
        };

        Ok(Options {
            source,
            sandbox,
            traceback,
        })
    }

    /// Apply command-line overrides on top of the environment config.
    pub fn engine_config(&self, base: EngineConfig) -> EngineConfig {
        let mut config = base;
        if self.sandbox {
            config = config.with_stdlib(config.stdlib & StdLib::SAFE);
        }
        if let Some(traceback) = self.traceback {
            config = config.with_traceback(traceback);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_run_with_flags() {
        let options = Options::parse(&args(&["run", "main.lua", "--sandbox", "--no-traceback"]));
        assert_eq!(
            options,
            Ok(Options {
                source: Source::File("main.lua".to_string()),
                sandbox: true,
                traceback: Some(false),
            })
        );
    }

    #[test]
    fn test_eval_inline() {
        let options = Options::parse(&args(&["eval", "return 1"]));
        assert_eq!(
            options.map(|o| o.source),
            Ok(Source::Inline("return 1".to_string()))
        );
    }

    #[test]
    fn test_errors() {
        assert!(Options::parse(&[]).is_err());
        assert_eq!(
            Options::parse(&args(&["run"])),
            Err("missing file path".to_string())
        );
        assert_eq!(
            Options::parse(&args(&["fly", "x"])),
            Err("unknown command 'fly'".to_string())
        );
        assert_eq!(
            Options::parse(&args(&["eval", "x", "--fast"])),
            Err("unknown option '--fast'".to_string())
        );
        assert_eq!(
            Options::parse(&args(&["eval", "x", "y"])),
            Err("unexpected argument 'y'".to_string())
        );
    }

    #[test]
    fn test_sandbox_narrows_stdlib() {
        let options = Options::parse(&args(&["eval", "x", "--sandbox"])).unwrap_or_else(|e| panic!("{e}"));
        let config = options.engine_config(EngineConfig::default());
        assert_eq!(config.stdlib, StdLib::SAFE);
        assert!(config.traceback);

        let narrow = EngineConfig::default().with_stdlib(StdLib::BASE);
        assert_eq!(options.engine_config(narrow).stdlib, StdLib::BASE);
    }
}
