use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// The environment variable that supplies a settings field
///
/// Bare field names come from the provider section, which is the only one with
/// required fields.
pub fn to_env_var(field: &str) -> String {
    let path = match field {
        "provider" => "provider.type".to_string(),
        f if f.contains('.') => f.to_string(),
        f => format!("provider.{}", f),
    };
    format!("SHIELD_{}", path.replace('.', "__").to_uppercase())
}
