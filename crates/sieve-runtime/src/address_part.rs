//! Address-part extraction (§4.9, GLOSSARY): pulls `:localpart`/
//! `:domain`/`:user`/`:detail` out of a raw address string, per RFC 5228
//! §2.7.4 and the `+detail` separator from RFC 5233 (subaddress).

use sieve_core::primitives::AddressPart;

/// Extract `part` from `address`. `address` may be a bare mailbox
/// (`user@example.com`) or carry a display name (`"A. User"
/// <user@example.com>`); the angle-bracket form is unwrapped first.
pub fn extract(part: &AddressPart, address: &str) -> String {
    let address = unwrap_angle_addr(address);
    let local = local_part(address);
    match part {
        AddressPart::All => address.to_owned(),
        AddressPart::LocalPart => local.to_owned(),
        AddressPart::Domain => domain_part(address).to_owned(),
        AddressPart::User => user_of(local).to_owned(),
        AddressPart::Detail => detail_of(local).unwrap_or_default(),
    }
}

fn unwrap_angle_addr(address: &str) -> &str {
    let trimmed = address.trim();
    if let (Some(start), Some(end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
        if start < end {
            return trimmed[start + 1..end].trim();
        }
    }
    trimmed
}

fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

fn domain_part(address: &str) -> &str {
    address.split_once('@').map(|(_, d)| d).unwrap_or("")
}

fn user_of(local: &str) -> &str {
    local.split('+').next().unwrap_or(local)
}

fn detail_of(local: &str) -> Option<String> {
    local.split_once('+').map(|(_, detail)| detail.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_local_and_domain() {
        assert_eq!(extract(&AddressPart::LocalPart, "user+news@example.com"), "user+news");
        assert_eq!(extract(&AddressPart::Domain, "user+news@example.com"), "example.com");
    }

    #[test]
    fn splits_user_and_detail() {
        assert_eq!(extract(&AddressPart::User, "user+news@example.com"), "user");
        assert_eq!(extract(&AddressPart::Detail, "user+news@example.com"), "news");
        assert_eq!(extract(&AddressPart::Detail, "user@example.com"), "");
    }

    #[test]
    fn unwraps_display_name_form() {
        assert_eq!(
            extract(&AddressPart::All, "\"A. User\" <user@example.com>"),
            "user@example.com"
        );
    }
}
