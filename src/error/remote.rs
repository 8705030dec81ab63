use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error during {context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Deserialization error during {context}: {source}")]
    Deserialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unknown generator '{name}'.")]
    UnknownGenerator { name: String },
    #[error("No slave endpoints configured (pass --slave host:port).")]
    NoSlaves,
    #[error("Cannot run as master and slave at the same time.")]
    RoleConflict,
    #[error("Missing role (set --master-listen or --slave-listen).")]
    RoleMissing,
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
