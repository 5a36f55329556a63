//! Local directive parsing.
//!
//! Anything starting with `/` is a directive. Known spellings map to a
//! variant; everything else becomes [`Directive::Unrecognized`] so the
//! orchestrator can report it instead of silently accepting it.

/// Spellings accepted by [`Directive::parse`], for help and error text.
pub const KNOWN_DIRECTIVES: &[&str] = &["/clear", "/purge", "/status", "/sim on|off", "/help"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Wipe the conversation history.
    Clear,
    /// Release cached VRAM.
    Purge,
    /// Report current telemetry to the event log.
    Status,
    /// Start or stop the telemetry simulation.
    Simulate(bool),
    /// List known directives.
    Help,
    /// `/`-prefixed input that matches nothing above.
    Unrecognized(String),
}

impl Directive {
    /// Parse `input`. Returns `None` if it is not a directive at all.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }

        let mut words = input.split_whitespace();
        let head = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let directive = match (head, args.as_slice()) {
            ("/clear", []) => Directive::Clear,
            ("/purge", []) => Directive::Purge,
            ("/status", []) => Directive::Status,
            ("/help", []) => Directive::Help,
            ("/sim", ["on"]) => Directive::Simulate(true),
            ("/sim", ["off"]) => Directive::Simulate(false),
            _ => Directive::Unrecognized(input.to_string()),
        };
        Some(directive)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Directive::Unrecognized(_))
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Clear => "clear",
            Directive::Purge => "purge",
            Directive::Status => "status",
            Directive::Simulate(_) => "sim",
            Directive::Help => "help",
            Directive::Unrecognized(_) => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_directive() {
        assert_eq!(Directive::parse("how hot is the GPU?"), None);
        assert_eq!(Directive::parse(""), None);
    }

    #[test]
    fn test_known_directives() {
        assert_eq!(Directive::parse("/clear"), Some(Directive::Clear));
        assert_eq!(Directive::parse("  /purge "), Some(Directive::Purge));
        assert_eq!(Directive::parse("/status"), Some(Directive::Status));
        assert_eq!(Directive::parse("/help"), Some(Directive::Help));
        assert_eq!(Directive::parse("/sim on"), Some(Directive::Simulate(true)));
        assert_eq!(Directive::parse("/sim   off"), Some(Directive::Simulate(false)));
    }

    #[test]
    fn test_unrecognized_keeps_raw_text() {
        let parsed = Directive::parse("/warp 9").unwrap();
        assert_eq!(parsed, Directive::Unrecognized("/warp 9".to_string()));
        assert!(!parsed.is_recognized());
    }

    #[test]
    fn test_extra_arguments_are_unrecognized() {
        assert!(!Directive::parse("/clear all").unwrap().is_recognized());
        assert!(!Directive::parse("/sim").unwrap().is_recognized());
        assert!(!Directive::parse("/sim maybe").unwrap().is_recognized());
        assert!(!Directive::parse("/CLEAR").unwrap().is_recognized());
    }

    #[test]
    fn test_names() {
        assert_eq!(Directive::Simulate(false).name(), "sim");
        assert_eq!(Directive::Unrecognized("/x".into()).name(), "unrecognized");
    }
}
