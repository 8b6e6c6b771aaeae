use serde::Serialize;

/// Canonical dialable form of a phone number. French national numbers
/// (`0X XX XX XX XX`) become `+33X...`; `00` prefixes become `+`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '.' | '-' | '(' | ')'));
    if !allowed || digits.len() < 3 {
        return None;
    }

    if international {
        Some(format!("+{}", digits))
    } else if let Some(rest) = digits.strip_prefix("00") {
        Some(format!("+{}", rest))
    } else if digits.len() == 10 && digits.starts_with('0') {
        Some(format!("+33{}", &digits[1..]))
    } else {
        Some(digits)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLinks {
    pub phone: String,
    pub tel: String,
    pub sms: String,
    pub whatsapp: String,
}

/// `tel:`, `sms:` and `wa.me` links for a phone number, with an optional prefilled message.
pub fn contact_links(raw_phone: &str, message: Option<&str>) -> Option<ContactLinks> {
    let phone = normalize_phone(raw_phone)?;
    let wa_number = phone.trim_start_matches('+');
    let message = message.map(str::trim).filter(|m| !m.is_empty());

    let (sms, whatsapp) = match message {
        Some(text) => {
            let encoded = urlencoding::encode(text);
            (
                format!("sms:{}?body={}", phone, encoded),
                format!("https://wa.me/{}?text={}", wa_number, encoded),
            )
        }
        None => (format!("sms:{}", phone), format!("https://wa.me/{}", wa_number)),
    };

    Some(ContactLinks {
        tel: format!("tel:{}", phone),
        sms,
        whatsapp,
        phone,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_numbers_gain_country_code() {
        assert_eq!(normalize_phone("06 12 34 56 78").as_deref(), Some("+33612345678"));
        assert_eq!(normalize_phone("01.23.45.67.89").as_deref(), Some("+33123456789"));
        assert_eq!(normalize_phone("+33 6 12 34 56 78").as_deref(), Some("+33612345678"));
        assert_eq!(normalize_phone("0032 470 12 34 56").as_deref(), Some("+32470123456"));
    }

    #[test]
    fn short_or_garbage_numbers_are_rejected() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("12"), None);
        assert_eq!(normalize_phone("06 12 AB 56 78"), None);
        assert_eq!(normalize_phone("3615").as_deref(), Some("3615"));
    }

    #[test]
    fn links_encode_the_message() {
        let links = contact_links("06 12 34 56 78", Some("Bonjour, à demain ?")).unwrap();
        assert_eq!(links.tel, "tel:+33612345678");
        assert_eq!(
            links.sms,
            "sms:+33612345678?body=Bonjour%2C%20%C3%A0%20demain%20%3F"
        );
        assert_eq!(
            links.whatsapp,
            "https://wa.me/33612345678?text=Bonjour%2C%20%C3%A0%20demain%20%3F"
        );

        let bare = contact_links("+33612345678", Some("  ")).unwrap();
        assert_eq!(bare.sms, "sms:+33612345678");
        assert_eq!(bare.whatsapp, "https://wa.me/33612345678");
    }
}
