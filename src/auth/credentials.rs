//! Credential detection over request headers, query parameters and cookies.
//!
//! Everything here is pure: the functions only inspect the maps they are
//! given and never touch the identity store.

use std::collections::HashMap;

use http::{HeaderMap, Uri, header};

/// Name of the cookie carrying the login session token.
pub const SESSION_COOKIE_NAME: &str = "seneca-login";

/// Header or query parameter carrying a department API key.
pub const API_KEY_PARAM: &str = "apiKey";

/// Header or query parameter carrying a personnel (agency) API key.
pub const PERSONNEL_API_KEY_PARAM: &str = "personnelApiKey";

/// Query parameter a tenant-less user can use to pick a department.
pub const DEPARTMENT_ID_PARAM: &str = "departmentId";

/// String-keyed request values (headers, query parameters or cookies).
pub type ValueMap = HashMap<String, String>;

/// The parts of an inbound request that can carry credentials.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    headers: ValueMap,
    query: ValueMap,
    cookies: ValueMap,
}

impl RequestCredentials {
    /// Create an empty set of credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect headers, query parameters and cookies from an HTTP request.
    ///
    /// Header values that are not valid UTF-8 are skipped. When a name repeats,
    /// the first occurrence wins.
    pub fn from_http(headers: &HeaderMap, uri: &Uri) -> Self {
        let mut header_values = ValueMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                header_values
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| value.to_string());
            }
        }

        let mut query = ValueMap::new();
        if let Some(raw) = uri.query() {
            for (name, value) in url::form_urlencoded::parse(raw.as_bytes()).into_owned() {
                query.entry(name).or_insert(value);
            }
        }

        let mut cookies = ValueMap::new();
        for value in headers.get_all(header::COOKIE) {
            if let Ok(raw) = value.to_str() {
                parse_cookie_header(raw, &mut cookies);
            }
        }

        Self {
            headers: header_values,
            query,
            cookies,
        }
    }

    /// Add a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn headers(&self) -> &ValueMap {
        &self.headers
    }

    pub fn query(&self) -> &ValueMap {
        &self.query
    }

    pub fn cookies(&self) -> &ValueMap {
        &self.cookies
    }

    /// API key from headers, then query.
    pub fn api_key(&self) -> String {
        detect_api_key(Some(&self.headers), Some(&self.query))
    }

    /// Personnel API key from headers, then query.
    pub fn personnel_api_key(&self) -> String {
        detect_personnel_api_key(Some(&self.headers), Some(&self.query))
    }

    /// Session token from the session cookie.
    pub fn session_token(&self) -> String {
        detect_cookie_session(Some(&self.cookies))
    }

    /// Department selected through the query string.
    pub fn department_id(&self) -> String {
        detect_department_id(Some(&self.query))
    }
}

/// Parse a `Cookie` header (`a=1; b="2"`) into `cookies`.
fn parse_cookie_header(raw: &str, cookies: &mut ValueMap) {
    for pair in raw.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
}

/// Lookup of a non-empty value under `name` in any casing.
///
/// The canonical spelling is tried first, then the all-lowercase one, then
/// any other casing in key order, so the result never depends on map order.
fn lookup<'a>(map: Option<&'a ValueMap>, name: &str) -> Option<&'a str> {
    let map = map?;
    let non_empty = |value: &'a String| (!value.is_empty()).then_some(value.as_str());

    map.get(name)
        .and_then(non_empty)
        .or_else(|| map.get(&name.to_ascii_lowercase()).and_then(non_empty))
        .or_else(|| {
            map.iter()
                .filter(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_empty())
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, value)| value.as_str())
        })
}

/// Look `name` up in the headers first, then in the query.
fn detect_in_headers_then_query(
    headers: Option<&ValueMap>,
    query: Option<&ValueMap>,
    name: &str,
) -> String {
    lookup(headers, name)
        .or_else(|| lookup(query, name))
        .unwrap_or_default()
        .to_string()
}

/// Detect a department API key (`apiKey`, any casing).
///
/// Headers win over the query string. Returns an empty string when absent.
pub fn detect_api_key(headers: Option<&ValueMap>, query: Option<&ValueMap>) -> String {
    detect_in_headers_then_query(headers, query, API_KEY_PARAM)
}

/// Detect a personnel API key (`personnelApiKey`, any casing).
pub fn detect_personnel_api_key(headers: Option<&ValueMap>, query: Option<&ValueMap>) -> String {
    detect_in_headers_then_query(headers, query, PERSONNEL_API_KEY_PARAM)
}

/// Detect the login session token.
///
/// Cookie names are matched exactly.
pub fn detect_cookie_session(cookies: Option<&ValueMap>) -> String {
    cookies
        .and_then(|cookies| cookies.get(SESSION_COOKIE_NAME))
        .cloned()
        .unwrap_or_default()
}

/// Detect a department selection from the query string (`departmentId`, any casing).
pub fn detect_department_id(query: Option<&ValueMap>) -> String {
    lookup(query, DEPARTMENT_ID_PARAM)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_api_key_from_headers() {
        let lower = map(&[("apikey", "k-1")]);
        let camel = map(&[("apiKey", "k-1")]);
        assert_eq!(detect_api_key(Some(&lower), None), "k-1");
        assert_eq!(detect_api_key(Some(&camel), None), "k-1");
    }

    #[test]
    fn test_api_key_from_query() {
        let lower = map(&[("apikey", "k-1")]);
        let camel = map(&[("apiKey", "k-1")]);
        assert_eq!(detect_api_key(None, Some(&lower)), "k-1");
        assert_eq!(detect_api_key(None, Some(&camel)), "k-1");
    }

    #[test]
    fn test_api_key_absent() {
        assert_eq!(detect_api_key(None, None), "");
        assert_eq!(detect_api_key(Some(&ValueMap::new()), Some(&ValueMap::new())), "");
        assert_eq!(detect_api_key(Some(&map(&[("other", "x")])), None), "");
    }

    #[test]
    fn test_header_wins_over_query() {
        let headers = map(&[("apikey", "from-header")]);
        let query = map(&[("apiKey", "from-query")]);
        assert_eq!(detect_api_key(Some(&headers), Some(&query)), "from-header");
    }

    #[test]
    fn test_empty_header_falls_through_to_query() {
        let headers = map(&[("apikey", "")]);
        let query = map(&[("apikey", "from-query")]);
        assert_eq!(detect_api_key(Some(&headers), Some(&query)), "from-query");
    }

    #[test]
    fn test_canonical_casing_wins_when_both_present() {
        let both = map(&[("apikey", "lower"), ("apiKey", "camel")]);
        assert_eq!(detect_api_key(Some(&both), None), "camel");
        assert_eq!(detect_api_key(None, Some(&both)), "camel");

        let odd = map(&[("APIKEY", "upper"), ("apikey", "lower")]);
        assert_eq!(detect_api_key(None, Some(&odd)), "lower");

        let only_odd = map(&[("ApiKEY", "b"), ("APIKEY", "a")]);
        assert_eq!(detect_api_key(None, Some(&only_odd)), "a");
    }

    #[test]
    fn test_from_http_is_stable_across_requests() {
        let uri = Uri::from_static("/?apiKey=camel&apikey=lower");
        for _ in 0..200 {
            let creds = RequestCredentials::from_http(&HeaderMap::new(), &uri);
            assert_eq!(creds.api_key(), "camel");
        }

        let uri = Uri::from_static("/?departmentid=lower&departmentId=camel");
        for _ in 0..200 {
            let creds = RequestCredentials::from_http(&HeaderMap::new(), &uri);
            assert_eq!(creds.department_id(), "camel");
        }
    }

    #[test]
    fn test_personnel_api_key_casings() {
        for name in ["personnelapikey", "personnelApiKey", "PERSONNELAPIKEY"] {
            let m = map(&[(name, "p-1")]);
            assert_eq!(detect_personnel_api_key(Some(&m), None), "p-1");
            assert_eq!(detect_personnel_api_key(None, Some(&m)), "p-1");
        }
    }

    #[test]
    fn test_personnel_key_does_not_leak_into_api_key() {
        let headers = map(&[("personnelApiKey", "p-1")]);
        assert_eq!(detect_api_key(Some(&headers), None), "");
    }

    #[test]
    fn test_cookie_session() {
        assert_eq!(detect_cookie_session(Some(&ValueMap::new())), "");
        assert_eq!(detect_cookie_session(None), "");

        let cookies = map(&[(SESSION_COOKIE_NAME, "helloworld")]);
        assert_eq!(detect_cookie_session(Some(&cookies)), "helloworld");
    }

    #[test]
    fn test_department_id_from_query() {
        let query = map(&[("departmentid", "d-7")]);
        assert_eq!(detect_department_id(Some(&query)), "d-7");
        assert_eq!(detect_department_id(None), "");
    }

    #[test]
    fn test_from_http_collects_all_sources() {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", "k-1".parse().unwrap());
        headers.insert(
            header::COOKIE,
            "theme=dark; seneca-login=\"tok-1\"; broken".parse().unwrap(),
        );
        let uri: Uri = "/whoami?departmentId=d%2D7&personnelApiKey=p-1"
            .parse()
            .unwrap();

        let creds = RequestCredentials::from_http(&headers, &uri);

        assert_eq!(creds.api_key(), "k-1");
        assert_eq!(creds.personnel_api_key(), "p-1");
        assert_eq!(creds.department_id(), "d-7");
        assert_eq!(creds.session_token(), "tok-1");
        assert_eq!(creds.cookies().get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_from_http_without_query_or_cookies() {
        let creds = RequestCredentials::from_http(&HeaderMap::new(), &Uri::from_static("/"));
        assert!(creds.query().is_empty());
        assert!(creds.cookies().is_empty());
        assert_eq!(creds.session_token(), "");
    }

    #[test]
    fn test_builder() {
        let creds = RequestCredentials::new()
            .with_header("apiKey", "k-1")
            .with_query("departmentId", "d-1")
            .with_cookie(SESSION_COOKIE_NAME, "tok");

        assert_eq!(creds.api_key(), "k-1");
        assert_eq!(creds.department_id(), "d-1");
        assert_eq!(creds.session_token(), "tok");
    }
}
