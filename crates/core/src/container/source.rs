use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Where a declaration came from, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Call site captured through `#[track_caller]`
    Location(&'static Location<'static>),
    /// Free-form description, e.g. a module name
    Described(Arc<str>),
    Unknown,
}

impl Source {
    /// Capture the caller's location
    #[track_caller]
    pub fn caller() -> Self {
        Source::Location(Location::caller())
    }

    pub fn described(description: impl Into<String>) -> Self {
        Source::Described(Arc::from(description.into()))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Source::Unknown)
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Unknown
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Location(location) => write!(f, "{}", location),
            Source::Described(description) => write!(f, "{}", description),
            Source::Unknown => write!(f, "[unknown source]"),
        }
    }
}

/// One accumulated configuration error
#[derive(Clone)]
pub struct Message {
    source: Source,
    text: String,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Message {
    pub fn new(source: Source, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            cause: None,
        }
    }

    /// Attach the error that produced this message
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("source", &self.source)
            .field("text", &self.text)
            .field("has_cause", &self.cause.is_some())
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n  at {}", self.text, self.source)
    }
}

/// Render accumulated messages as a numbered list
pub fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| format!("{}) {}", index + 1, message))
        .collect::<Vec<_>>()
        .join("\n\n")
}
