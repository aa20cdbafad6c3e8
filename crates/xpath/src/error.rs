use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("XPath parse error in '{0}': {1}")]
    Parse(String, String),

    #[error("Function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
}
