use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("malformed carrier frame: {0}")]
    MalformedFrame(String),
}
