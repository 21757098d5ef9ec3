//! Post-login redirect construction.

use portcullis_core::Object;
use url::Url;

/// Query parameter carrying the original target URL.
pub const QUERY_RD: &str = "rd";

/// Query parameter carrying the original HTTP method.
pub const QUERY_RM: &str = "rm";

/// Builds the portal URL a caller is sent to for authentication.
///
/// Returns `None` without a portal. The portal URL is copied, its existing
/// query parameters are kept (except previous `rd`/`rm` values, which are
/// replaced), and the target URL plus the method (when known) are appended.
pub fn redirection_url(object: &Object, portal_url: Option<&Url>) -> Option<Url> {
    let mut url = portal_url?.clone();

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != QUERY_RD && key != QUERY_RM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);

    {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(retained);
        query.append_pair(QUERY_RD, object.url().as_str());
        if !object.method().is_empty() {
            query.append_pair(QUERY_RM, object.method());
        }
    }

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_no_portal_no_redirect() {
        let object = Object::parse("https://app.example.com/secret", "GET").unwrap();
        assert!(redirection_url(&object, None).is_none());
    }

    #[test]
    fn test_target_is_percent_encoded() {
        let object = Object::parse("https://app.example.com/secret", "").unwrap();
        let url = redirection_url(&object, Some(&portal("https://auth.example.com"))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example.com/?rd=https%3A%2F%2Fapp.example.com%2Fsecret"
        );
    }

    #[test]
    fn test_method_is_appended_when_known() {
        let object = Object::parse("https://app.example.com/", "post").unwrap();
        let url = redirection_url(&object, Some(&portal("https://auth.example.com/login"))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example.com/login?rd=https%3A%2F%2Fapp.example.com%2F&rm=POST"
        );
    }

    #[test]
    fn test_existing_query_is_preserved() {
        let object = Object::parse("https://app.example.com/a?b=c&d=e", "GET").unwrap();
        let portal_url = portal("https://auth.example.com/?theme=dark&rd=stale&lang=en");
        let url = redirection_url(&object, Some(&portal_url)).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("theme".to_string(), "dark".to_string()),
                ("lang".to_string(), "en".to_string()),
                ("rd".to_string(), "https://app.example.com/a?b=c&d=e".to_string()),
                ("rm".to_string(), "GET".to_string()),
            ]
        );
    }

    #[test]
    fn test_portal_is_not_mutated() {
        let object = Object::parse("https://app.example.com/", "GET").unwrap();
        let portal_url = portal("https://auth.example.com/?x=1");
        let _ = redirection_url(&object, Some(&portal_url));
        assert_eq!(portal_url.as_str(), "https://auth.example.com/?x=1");
    }

    #[test]
    fn test_target_round_trips() {
        let target = "https://app.example.com/p%20q/ü?x=a+b&y=%2F#frag";
        let object = Object::parse(target, "").unwrap();
        let url = redirection_url(&object, Some(&portal("https://auth.example.com"))).unwrap();

        let rd = url
            .query_pairs()
            .find(|(k, _)| k == QUERY_RD)
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(rd, object.url().as_str());
    }
}
