use url::Url;

/// Strip exactly one leading "www." label. Idempotent for real-world
/// hostnames, which carry the prefix at most once.
pub fn normalize_domain(domain: &str) -> String {
    domain.strip_prefix("www.").unwrap_or(domain).to_string()
}

/// Extract the normalized domain from a URL. Malformed URLs yield
/// `None`; callers treat that as "matches no service" rather than an
/// error.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(normalize_domain(host))
}

/// Derive a display name from a domain: first label, separators to
/// spaces, words title-cased ("anime-stream.tv" -> "Anime Stream").
pub fn derive_service_name(domain: &str) -> String {
    let normalized = normalize_domain(domain);
    let label = normalized.split('.').next().unwrap_or("");

    label
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 32-bit string hash rendered base-36. Collision-tolerant: watch
/// entry ids also embed a timestamp.
pub fn hash_title(text: &str) -> String {
    let mut hash: i32 = 0;
    for c in text.chars() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as i32);
    }
    to_base36(hash.unsigned_abs() as u64)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(char::from(DIGITS[(value % 36) as usize]));
        value /= 36;
    }
    out.iter().rev().collect()
}
