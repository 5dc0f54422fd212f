//! Browser session carried in two cookies after the provider's OAuth redirect.

use url::Url;

pub const TOKEN_COOKIE: &str = "auth_token";
pub const ACCOUNT_COOKIE: &str = "account_id";
/// Seven days.
pub const SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub authorization_server: String,
    pub client_id: String,
    pub redirect_uri: String,
}

impl Session {
    /// Both values must be usable verbatim as cookie values and URL path segments.
    pub fn new(token: impl Into<String>, account_id: impl Into<String>) -> Option<Self> {
        let session = Self {
            token: token.into(),
            account_id: account_id.into(),
        };
        if is_cookie_safe(&session.token) && is_valid_account_id(&session.account_id) {
            Some(session)
        } else {
            None
        }
    }

    pub fn dashboard_path(&self) -> String {
        format!("/{}/dashboard", self.account_id)
    }
}

/// `Set-Cookie` values establishing the session.
pub fn session_cookies(session: &Session) -> [String; 2] {
    [
        set_cookie(TOKEN_COOKIE, &session.token, SESSION_MAX_AGE_SECS),
        set_cookie(ACCOUNT_COOKIE, &session.account_id, SESSION_MAX_AGE_SECS),
    ]
}

/// `Set-Cookie` values removing the session.
pub fn expired_cookies() -> [String; 2] {
    [set_cookie(TOKEN_COOKIE, "", 0), set_cookie(ACCOUNT_COOKIE, "", 0)]
}

/// Restores a session from a `Cookie` request header; both cookies are required.
pub fn session_from_cookie_header(header: &str) -> Option<Session> {
    let mut token = None;
    let mut account_id = None;
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match name.trim() {
            TOKEN_COOKIE => token = Some(value.trim().to_string()),
            ACCOUNT_COOKIE => account_id = Some(value.trim().to_string()),
            _ => {}
        }
    }
    Session::new(token.filter(|t| !t.is_empty())?, account_id?)
}

/// Authorization-code request URL at the signing provider.
pub fn login_url(settings: &AuthSettings) -> Result<Url, url::ParseError> {
    let base = settings.authorization_server.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/oauth/auth"))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("scope", "signature extended");
    Ok(url)
}

pub fn is_valid_account_id(account_id: &str) -> bool {
    !account_id.is_empty()
        && account_id.len() <= 128
        && account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_cookie_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, ';' | ',' | '"' | '\\'))
}

fn set_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Max-Age={max_age}; Path=/; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_carry_seven_day_lax_attributes() {
        let session = Session::new("tok.abc-123", "acct-1").unwrap();
        let [token, account] = session_cookies(&session);

        assert_eq!(
            token,
            "auth_token=tok.abc-123; Max-Age=604800; Path=/; SameSite=Lax"
        );
        assert_eq!(
            account,
            "account_id=acct-1; Max-Age=604800; Path=/; SameSite=Lax"
        );
        assert_eq!(session.dashboard_path(), "/acct-1/dashboard");
    }

    #[test]
    fn expired_cookies_zero_max_age() {
        for cookie in expired_cookies() {
            assert!(cookie.contains("Max-Age=0"));
        }
    }

    #[test]
    fn restores_session_only_when_both_cookies_present() {
        let session = session_from_cookie_header("theme=dark; auth_token=t1; account_id=a1");
        assert_eq!(session, Session::new("t1", "a1"));

        assert_eq!(session_from_cookie_header("auth_token=t1"), None);
        assert_eq!(session_from_cookie_header("account_id=a1; auth_token="), None);
    }

    #[test]
    fn rejects_unsafe_values() {
        assert!(Session::new("tok;en", "a1").is_none());
        assert!(Session::new("token", "../etc").is_none());
        assert!(Session::new("token", "").is_none());
    }

    #[test]
    fn login_url_encodes_parameters() {
        let url = login_url(&AuthSettings {
            authorization_server: "https://account-d.example.com/".to_string(),
            client_id: "client 1".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
        })
        .unwrap();

        assert_eq!(url.path(), "/oauth/auth");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "client 1".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "signature extended".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:3000/callback".to_string()
        )));
    }
}
