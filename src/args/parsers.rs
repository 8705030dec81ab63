use crate::remote::SlaveEndpoint;

/// Parses a `host:port` slave endpoint; the endpoint id is the same
/// `host:port` string.
pub(super) fn parse_endpoint(value: &str) -> Result<SlaveEndpoint, String> {
    let Some((host, port)) = value.rsplit_once(':') else {
        return Err(format!("Expected host:port, got '{}'", value));
    };
    if host.is_empty() {
        return Err(format!("Missing host in '{}'", value));
    }
    let port: u16 = port
        .parse()
        .map_err(|err| format!("Invalid port in '{}': {}", value, err))?;
    Ok(SlaveEndpoint::new(host, port))
}
