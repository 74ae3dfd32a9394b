pub mod config;
pub mod delivery;
pub mod domain;
pub mod email_client;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;

/// Debug output for error enums: the error itself followed by its cause chain.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", e)?;
    let mut current = e.source();

    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t({})", cause)?;
        current = cause.source();
    }

    Ok(())
}

/// Single-line rendering of an error and its causes, for storage and API bodies.
pub fn error_chain_message(e: &impl std::error::Error) -> String {
    let mut message = e.to_string();
    let mut current = e.source();

    while let Some(cause) = current {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }

    message
}
