//! URL canonicalization and base-identity extraction.

use url::Url;

/// Query keys dropped during normalization.
pub const TRACKING_PARAMS: [&str; 6] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "ref",
    "source",
    "page",
];

/// Path tokens whose following segment identifies an account.
const ACCOUNT_TOKENS: [&str; 2] = ["user", "profile"];

/// Canonicalizes `raw` so cosmetic variants compare equal.
///
/// Lower-cases scheme and host, strips leading `www.`, drops
/// [`TRACKING_PARAMS`] while keeping the remaining pairs in order, removes
/// the fragment and trailing slashes. Input that does not parse as an
/// absolute URL with a host is returned unchanged.
///
/// # Examples
///
/// ```
/// use launcher_core::routing::normalize;
///
/// assert_eq!(
///     normalize("https://WWW.Example.com/a/?utm_source=x&b=1"),
///     normalize("https://example.com/a?b=1"),
/// );
/// assert_eq!(normalize("not a url"), "not a url");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return raw.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return raw.to_string();
    };

    let host = strip_www(&host.to_ascii_lowercase()).to_string();
    let mut normalized = format!("{}://", parsed.scheme().to_ascii_lowercase());

    if !parsed.username().is_empty() {
        normalized.push_str(parsed.username());
        if let Some(password) = parsed.password() {
            normalized.push(':');
            normalized.push_str(password);
        }
        normalized.push('@');
    }
    normalized.push_str(&host);
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }

    normalized
}

/// Returns the affinity key for `raw`: its host, or `host/user/<account>`
/// when a path segment `user` or `profile` is followed by another segment.
///
/// # Examples
///
/// ```
/// use launcher_core::routing::extract_base_identity;
///
/// assert_eq!(
///     extract_base_identity("https://site.com/user/alice/post/1"),
///     "site.com/user/alice",
/// );
/// assert_eq!(extract_base_identity("https://www.site.com/gallery/9"), "site.com");
/// ```
#[must_use]
pub fn extract_base_identity(raw: &str) -> String {
    let normalized = normalize(raw);
    let Ok(parsed) = Url::parse(&normalized) else {
        return normalized;
    };
    let Some(host) = parsed.host_str() else {
        return normalized;
    };
    let host = strip_www(&host.to_ascii_lowercase()).to_string();

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();

    let account = segments
        .windows(2)
        .find(|pair| ACCOUNT_TOKENS.contains(&pair[0].to_ascii_lowercase().as_str()))
        .map(|pair| pair[1]);

    match account {
        Some(account) => format!("{host}/user/{account}"),
        None => host,
    }
}

/// Host of `raw` lower-cased with leading `www.` removed, if it parses.
#[must_use]
pub fn comparable_host(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(strip_www(&host).to_string())
}

fn strip_www(host: &str) -> &str {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cosmetic_variants_compare_equal() {
        assert_eq!(
            normalize("https://WWW.Example.com/a/?utm_source=x&b=1"),
            normalize("https://example.com/a?b=1")
        );
        assert_eq!(normalize("https://example.com/a?b=1"), "https://example.com/a?b=1");
    }

    #[test]
    fn test_normalize_drops_every_tracking_param_and_keeps_order() {
        let url = "https://a.com/p?z=1&utm_medium=m&ref=r&y=2&page=3&source=s&utm_campaign=c";
        assert_eq!(normalize(url), "https://a.com/p?z=1&y=2");
    }

    #[test]
    fn test_normalize_strips_fragment_and_root_slash() {
        assert_eq!(normalize("https://a.com/#top"), "https://a.com");
        assert_eq!(normalize("HTTP://A.com/x/#frag"), "http://a.com/x");
    }

    #[test]
    fn test_normalize_keeps_path_case_and_port() {
        assert_eq!(
            normalize("https://A.com:8443/Gallery/ID"),
            "https://a.com:8443/Gallery/ID"
        );
    }

    #[test]
    fn test_normalize_unparseable_is_identity() {
        assert_eq!(normalize("just text"), "just text");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "https://WWW.Example.com/a/?utm_source=x&b=1",
            "https://www.www.a.com//",
            "http://a.com/p?q=hello world&ref=x#f",
            "https://user:pw@Host.example:8080/x/y/?a=1&a=2",
            "https://a.com/path%20with%20space/",
            "https://a.com/?page=1",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample}");
        }
    }

    #[test]
    fn test_base_identity_groups_user_catalog() {
        assert_eq!(
            extract_base_identity("https://site.com/user/alice/post/1"),
            extract_base_identity("https://site.com/user/alice/post/2")
        );
        assert_eq!(
            extract_base_identity("https://www.Site.com/profile/bob?page=2"),
            "site.com/user/bob"
        );
    }

    #[test]
    fn test_base_identity_defaults_to_host() {
        assert_eq!(extract_base_identity("https://a.com/gallery/1"), "a.com");
        assert_eq!(extract_base_identity("https://a.com/user/"), "a.com");
        assert_eq!(extract_base_identity("not a url"), "not a url");
    }

    #[test]
    fn test_comparable_host() {
        assert_eq!(comparable_host("https://WWW.A.com/x"), Some("a.com".to_string()));
        assert_eq!(comparable_host("nope"), None);
    }
}
