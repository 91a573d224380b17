use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("mode `{0}` needs an input argument")]
    MissingInput(String),
}
