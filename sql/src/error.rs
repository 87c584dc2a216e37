use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of statement")]
    UnexpectedEof,

    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unrecognized statement keyword {0:?}")]
    UnknownStatement(String),

    #[error("invalid literal {0:?}")]
    InvalidLiteral(String),
}
