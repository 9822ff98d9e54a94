use crate::css::CssError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Input size ({size} characters) exceeds the policy maximum of {max} characters")]
    InputTooLarge { size: usize, max: usize },

    #[error("Too many nested tags (the limit is {max})")]
    TooDeep { max: usize },

    #[error("Failed to serialize the cleaned markup: {message}")]
    Serialize { message: String },

    #[error(transparent)]
    Css(#[from] CssError),
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Malformed policy document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown regular expression `{name}` referenced by attribute `{attribute}`")]
    UnknownRegex { name: String, attribute: String },

    #[error("Attribute `{name}` referenced by `{context}` is not a common attribute")]
    UnknownAttribute { name: String, context: String },

    #[error("Policy element <{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
}
