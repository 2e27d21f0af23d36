use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StanzaError {
    #[error("stanza parse failed: {0}")]
    ParseFailed(String),

    #[error("unsupported stanza <{name}/> of type {kind:?}")]
    Unsupported { name: String, kind: Option<String> },
}
