//! Rendering of per-host results for the terminal.

use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use std::fmt;
use tlsplain::{CertificateDescription, FetchError};

/// Shown in place of any result when a host could not be assessed. The
/// underlying error only goes to the log.
pub const CONNECT_FAILURE: &str = "Couldn't connect to the server.";

pub struct HostReport {
    pub host: String,
    pub result: Result<CertificateDescription, FetchError>,
}

impl HostReport {
    pub fn new(host: String, result: Result<CertificateDescription, FetchError>) -> Self {
        HostReport { host, result }
    }

    pub fn is_verified(&self) -> bool {
        matches!(&self.result, Ok(description) if description.verified())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    host: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate: Option<&'a CertificateDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

pub fn render_json(reports: &[HostReport]) -> serde_json::Result<String> {
    let json: Vec<JsonReport> = reports
        .iter()
        .map(|report| match &report.result {
            Ok(description) => JsonReport {
                host: &report.host,
                certificate: Some(description),
                error: None,
            },
            Err(_) => JsonReport {
                host: &report.host,
                certificate: None,
                error: Some(CONNECT_FAILURE),
            },
        })
        .collect();
    serde_json::to_string_pretty(&json)
}

pub fn render_summary(reports: &[HostReport]) -> String {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Host",
            "Subject",
            "Verified",
            "Protocol",
            "Cipher",
            "Forward secrecy",
            "Strength",
        ]);

    for report in reports {
        match &report.result {
            Ok(d) => {
                let forward_secrecy = match d.cipher.forward_secrecy() {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "unknown",
                };
                let strength = d
                    .cipher
                    .profile
                    .map(|p| p.strength.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                table.add_row(vec![
                    d.host.clone(),
                    d.subject.to_string(),
                    d.verified().to_string(),
                    d.protocol.clone(),
                    d.negotiated_cipher.clone(),
                    forward_secrecy.to_string(),
                    strength,
                ]);
            }
            Err(_) => {
                table.add_row(vec![
                    report.host.clone(),
                    CONNECT_FAILURE.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ]);
            }
        }
    }
    table.to_string()
}

pub fn render_text(reports: &[HostReport]) -> String {
    reports.iter().map(|r| TextReport(r).to_string()).collect()
}

struct TextReport<'a>(&'a HostReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "--------------------------------------")?;
        writeln!(f, "Host: {}", report.host)?;
        let d = match &report.result {
            Ok(d) => d,
            Err(_) => return writeln!(f, "{}", CONNECT_FAILURE),
        };
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "None".to_string());
        writeln!(f, "Connected to: {}", d.host)?;
        writeln!(f, "Subject Name:")?;
        writeln!(f, "\tCommon Name: {}", field(&d.subject.common_name))?;
        writeln!(f, "\tOrganization: {}", field(&d.subject.organization))?;
        writeln!(f, "\tOrganizational Unit: {}", field(&d.subject.organizational_unit))?;
        writeln!(f, "\tLocality: {}", field(&d.subject.locality))?;
        writeln!(f, "\tState or Province: {}", field(&d.subject.state_or_province))?;
        writeln!(f, "\tCountry or Region: {}", field(&d.subject.country))?;
        if d.verified() {
            writeln!(f, "Verified: yes, the certificate chains to a trusted root.")?;
        } else {
            writeln!(f, "Verified: no, the certificate could not be verified.")?;
        }
        writeln!(f, "Protocol: {}", d.protocol)?;
        writeln!(f, "Cipher suite: {}", d.negotiated_cipher)?;
        writeln!(f, "\tKey exchange: {}", d.cipher.key_exchange_note)?;
        writeln!(f, "\tForward secrecy: {}", d.cipher.forward_secrecy_note)?;
        writeln!(f, "\tData cipher: {}", d.cipher.symmetric_cipher_note)?;
        writeln!(f, "\tStrength: {}", d.cipher.strength_note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(host: &str) -> HostReport {
        HostReport::new(
            host.to_string(),
            Err(FetchError::HandshakeFailed {
                address: format!("{}:443", host),
                details: "sslv3 alert handshake failure".to_string(),
            }),
        )
    }

    #[test]
    fn test_failure_is_not_verified() {
        assert!(!failed("example.com").is_verified());
    }

    #[test]
    fn test_failure_hides_error_details() {
        let reports = vec![failed("example.com")];

        let summary = render_summary(&reports);
        assert!(summary.contains("example.com"));
        assert!(summary.contains(CONNECT_FAILURE));
        assert!(!summary.contains("sslv3"));

        let text = render_text(&reports);
        assert!(text.contains(CONNECT_FAILURE));
        assert!(!text.contains("sslv3"));
    }

    #[test]
    fn test_json_failure_has_no_certificate() {
        let json = render_json(&[failed("example.com")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["host"], "example.com");
        assert_eq!(value[0]["error"], CONNECT_FAILURE);
        assert!(value[0].get("certificate").is_none());
    }
}
