use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::{debug, warn};

use crate::output::HostReport;

lazy_static! {
    static ref TLSPLAIN_CERTIFICATE_VERIFIED: Gauge = register_gauge!(
        "tlsplain_certificate_verified",
        "certificate chains to a trusted root"
    )
    .unwrap();
    static ref TLSPLAIN_FORWARD_SECRECY: Gauge = register_gauge!(
        "tlsplain_forward_secrecy",
        "negotiated cipher suite forward secrecy"
    )
    .unwrap();
    static ref TLSPLAIN_CIPHER_STRENGTH_BITS: Gauge = register_gauge!(
        "tlsplain_cipher_strength_bits",
        "negotiated cipher suite strength in bits"
    )
    .unwrap();
}

/// Function to push metrics to prometheus
/// # Arguments
/// * `reports` - Per-host results; hosts that could not be assessed are skipped
/// * `prometheus_address` - Push gateway address
pub fn prometheus_metrics(reports: &[HostReport], prometheus_address: &str) {
    for report in reports {
        let description = match &report.result {
            Ok(description) => description,
            Err(_) => continue,
        };

        TLSPLAIN_CERTIFICATE_VERIFIED.set(if description.verified() { 1.0 } else { 0.0 });

        // -1 = unknown suite, 0 = no, 1 = yes
        let forward_secrecy = match description.cipher.forward_secrecy() {
            Some(true) => 1.0,
            Some(false) => 0.0,
            None => -1.0,
        };
        TLSPLAIN_FORWARD_SECRECY.set(forward_secrecy);

        let bits = description
            .cipher
            .profile
            .map(|p| f64::from(p.strength.bits()))
            .unwrap_or(-1.0);
        TLSPLAIN_CIPHER_STRENGTH_BITS.set(bits);

        let metric_families = prometheus::gather();
        let pushed = prometheus::push_metrics(
            "tlsplain",
            labels! {
                "instance".to_owned() => "tlsplain".to_owned(),
                "host".to_owned() => description.host.to_owned(),
                "subject".to_owned() => description.subject.to_string(),
                "cipher".to_owned() => description.negotiated_cipher.to_owned(),
                "protocol".to_owned() => description.protocol.to_owned(),
            },
            &format!("{}/metrics/job", prometheus_address),
            metric_families,
            None,
        );

        match pushed {
            Ok(_) => debug!(host = %description.host, "pushed metrics"),
            Err(e) => warn!(host = %description.host, error = %e, "failed to push metrics to prometheus"),
        }
    }
}
