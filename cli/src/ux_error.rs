use colored::Colorize;
use worker_errors::ArgumentErrors;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            for line in why.lines() {
                eprintln!("       {}", line.dimmed());
            }
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn invalid_arguments(service: &str, errors: &ArgumentErrors) -> UxError {
    let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
    UxError::new(format!(
        "{} invalid worker argument(s) for service '{}'",
        errors.len(),
        service
    ))
    .why(details.join("\n"))
    .fix("Correct the values in the service configuration")
    .fix("Remove arguments neither the engine nor the worker recognizes")
    .suggest("worker-args schema")
}

pub fn engine_rejected(service: &str, reason: &str) -> UxError {
    UxError::new(format!("Engine rejected the arguments for service '{}'", service))
        .why(reason.trim().to_string())
        .fix("Check the engine arguments against the engine's help")
        .suggest("worker-args help")
}

pub fn config_error(message: &str) -> UxError {
    UxError::new(format!("Configuration error: {}", message))
        .why("The service configuration could not be loaded")
        .fix("Check the file passed with --config or WORKER_SERVICE_CONFIG_FILE")
        .fix("Check that WORKER_SERVICE_CONFIG holds a JSON object of service sections")
}

pub fn invalid_schema(message: &str) -> UxError {
    UxError::new(format!("Invalid worker parameter table: {}", message))
        .why("An extension parameter is duplicated or shadows an engine argument")
        .fix("Rename the conflicting parameter")
}
