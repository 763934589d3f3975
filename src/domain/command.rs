use serde::Serialize;
use std::fmt;

/// One invocation of a host GIS command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GisCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Text piped to the command's standard input.
    pub stdin: Option<String>,
}

impl GisCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// `key=value` parameter.
    pub fn param(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.args.push(format!("{}={}", key, value.as_ref()));
        self
    }

    /// Single-letter module flag, rendered as `-k`.
    pub fn flag(mut self, flag: char) -> Self {
        self.args.push(format!("-{}", flag));
        self
    }

    pub fn flag_if(self, flag: char, enabled: bool) -> Self {
        if enabled {
            self.flag(flag)
        } else {
            self
        }
    }

    pub fn quiet(mut self) -> Self {
        self.args.push("--quiet".to_string());
        self
    }

    pub fn overwrite_if(mut self, enabled: bool) -> Self {
        if enabled {
            self.args.push("--overwrite".to_string());
        }
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Value of a `key=value` parameter, if present.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            arg.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }

    pub fn has_flag(&self, flag: char) -> bool {
        let wanted = format!("-{}", flag);
        self.args.iter().any(|arg| *arg == wanted)
    }
}

impl fmt::Display for GisCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.contains('"') {
                match arg.split_once('=') {
                    Some((key, value)) if !key.starts_with('-') => {
                        write!(f, " {}=\"{}\"", key, value.replace('"', "\\\""))?
                    }
                    _ => write!(f, " \"{}\"", arg.replace('"', "\\\""))?,
                }
            } else {
                write!(f, " {}", arg)?;
            }
        }
        if self.stdin.is_some() {
            write!(f, " < (stdin)")?;
        }
        Ok(())
    }
}
