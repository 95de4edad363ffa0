// SPDX-License-Identifier: EUPL-1.2

//! Read-only inspection of PEM material in the storage tree.

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

const CSR_TAGS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

fn csr_der(pem_data: &[u8]) -> Option<Vec<u8>> {
    let pem = ::pem::parse(pem_data).ok()?;
    CSR_TAGS
        .contains(&pem.tag())
        .then(|| pem.contents().to_vec())
}

/// `true` if `pem_data` holds a parseable PKCS#10 request.
pub fn is_csr_pem(pem_data: &[u8]) -> bool {
    csr_subject(pem_data).is_some()
}

/// Subject DN of a PEM-encoded CSR, e.g. `CN=alice, O=Example`.
pub fn csr_subject(pem_data: &[u8]) -> Option<String> {
    let der = csr_der(pem_data)?;
    let (_, csr) = X509CertificationRequest::from_der(&der).ok()?;
    Some(csr.certification_request_info.subject.to_string())
}

/// `notAfter` of a PEM-encoded certificate.
pub fn cert_valid_to(pem_data: &[u8]) -> Option<DateTime<Utc>> {
    let pem = ::pem::parse(pem_data).ok()?;
    if pem.tag() != "CERTIFICATE" {
        return None;
    }
    let (_, cert) = X509Certificate::from_der(pem.contents()).ok()?;
    DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
}
