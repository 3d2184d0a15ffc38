use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth;

pub const SUPPORTED_LOCALES: [&str; 3] = ["en", "zh", "ja"];
pub const DEFAULT_LOCALE: &str = "en";

const PROTECTED_PREFIXES: [&str; 3] = ["/generate", "/dashboard", "/account"];
const AUTH_PAGES: [&str; 2] = ["/auth/sign-in", "/auth/sign-up"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    PassThrough,
    /// Protected page hit without a session.
    RedirectToSignIn { redirect: String },
    /// Auth page hit while already signed in.
    RedirectToTarget { target: String },
}

/// Splits a leading locale segment off the path: `/zh/generate` becomes
/// `("/generate", Some("zh"))`. Paths without a known locale prefix pass
/// through untouched.
pub fn strip_locale_prefix(path: &str) -> (&str, Option<&str>) {
    let Some(rest) = path.strip_prefix('/') else {
        return (path, None);
    };

    let (first_segment, remainder) = match rest.split_once('/') {
        Some((first, remainder)) => (first, remainder),
        None => (rest, ""),
    };

    if !SUPPORTED_LOCALES.contains(&first_segment) {
        return (path, None);
    }

    let locale_len = 1 + first_segment.len();
    if remainder.is_empty() {
        ("/", Some(&path[1..locale_len]))
    } else {
        (&path[locale_len..], Some(&path[1..locale_len]))
    }
}

/// Locale precedence: explicit path prefix, then the locale cookie, then the
/// first supported tag in Accept-Language, then the default.
pub fn negotiate_locale(
    path_locale: Option<&str>,
    cookie_locale: Option<&str>,
    accept_language: Option<&str>,
) -> String {
    if let Some(locale) = path_locale {
        if SUPPORTED_LOCALES.contains(&locale) {
            return locale.to_string();
        }
    }

    if let Some(locale) = cookie_locale {
        if SUPPORTED_LOCALES.contains(&locale) {
            return locale.to_string();
        }
    }

    if let Some(header_value) = accept_language {
        for entry in header_value.split(',') {
            let tag = entry.split(';').next().unwrap_or("").trim();
            let primary = tag.split('-').next().unwrap_or("");
            if SUPPORTED_LOCALES.contains(&primary) {
                return primary.to_string();
            }
        }
    }

    DEFAULT_LOCALE.to_string()
}

/// Pure request classifier; the middleware below only gathers its inputs.
pub fn classify(path: &str, has_session: bool, redirect_param: Option<&str>) -> RouteAction {
    let (page_path, _locale) = strip_locale_prefix(path);

    let is_protected = PROTECTED_PREFIXES
        .iter()
        .any(|prefix| page_path == *prefix || page_path.starts_with(&format!("{}/", prefix)));
    let is_auth_page = AUTH_PAGES.contains(&page_path);

    if is_protected && !has_session {
        return RouteAction::RedirectToSignIn {
            redirect: path.to_string(),
        };
    }

    if is_auth_page && has_session {
        // Only relative targets; anything else falls back to the app home.
        let target = redirect_param
            .filter(|target| target.starts_with('/') && !target.starts_with("//"))
            .unwrap_or("/generate")
            .to_string();
        return RouteAction::RedirectToTarget { target };
    }

    RouteAction::PassThrough
}

fn redirect_param_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name == "redirect" {
            urlencoding::decode(value).ok().map(|value| value.into_owned())
        } else {
            None
        }
    })
}

fn sign_in_redirect(original_path: &str) -> String {
    format!(
        "/auth/sign-in?redirect={}",
        urlencoding::encode(original_path)
    )
}

pub async fn gate(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let redirect_param = redirect_param_from_query(request.uri().query());

    let has_session = auth::extract_bearer_token(request.headers()).is_some();
    let cookie_header = header_str(&request, header::COOKIE);
    let accept_language = header_str(&request, header::ACCEPT_LANGUAGE);
    let locale = locale_for_request(&path, cookie_header.as_deref(), accept_language.as_deref());

    match classify(&path, has_session, redirect_param.as_deref()) {
        RouteAction::PassThrough => {
            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(&locale) {
                response
                    .headers_mut()
                    .insert(header::CONTENT_LANGUAGE, value);
            }
            response
        }
        RouteAction::RedirectToSignIn { redirect } => {
            Redirect::temporary(&sign_in_redirect(&redirect)).into_response()
        }
        RouteAction::RedirectToTarget { target } => Redirect::temporary(&target).into_response(),
    }
}

fn header_str(request: &Request, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn locale_for_request(path: &str, cookie_header: Option<&str>, accept_language: Option<&str>) -> String {
    let (_page, path_locale) = strip_locale_prefix(path);
    let cookie_locale = cookie_header.and_then(|header| {
        header.split(';').map(str::trim).find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            if name == "locale" { Some(value.to_string()) } else { None }
        })
    });

    negotiate_locale(
        path_locale,
        cookie_locale.as_deref(),
        accept_language,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_page_without_session_redirects_to_sign_in() {
        let action = classify("/generate", false, None);
        assert_eq!(
            action,
            RouteAction::RedirectToSignIn {
                redirect: "/generate".to_string()
            }
        );
    }

    #[test]
    fn protected_page_with_session_passes_through() {
        assert_eq!(classify("/generate", true, None), RouteAction::PassThrough);
        assert_eq!(classify("/dashboard/history", true, None), RouteAction::PassThrough);
    }

    #[test]
    fn localized_protected_page_is_still_protected() {
        let action = classify("/zh/dashboard", false, None);
        assert_eq!(
            action,
            RouteAction::RedirectToSignIn {
                redirect: "/zh/dashboard".to_string()
            }
        );
    }

    #[test]
    fn auth_page_with_session_redirects_home_by_default() {
        let action = classify("/auth/sign-in", true, None);
        assert_eq!(
            action,
            RouteAction::RedirectToTarget {
                target: "/generate".to_string()
            }
        );
    }

    #[test]
    fn auth_page_with_session_honors_redirect_param() {
        let action = classify("/auth/sign-in", true, Some("/dashboard"));
        assert_eq!(
            action,
            RouteAction::RedirectToTarget {
                target: "/dashboard".to_string()
            }
        );
    }

    #[test]
    fn auth_page_redirect_param_must_be_relative() {
        let action = classify("/auth/sign-in", true, Some("https://evil.example.com"));
        assert_eq!(
            action,
            RouteAction::RedirectToTarget {
                target: "/generate".to_string()
            }
        );

        let action = classify("/auth/sign-in", true, Some("//evil.example.com"));
        assert_eq!(
            action,
            RouteAction::RedirectToTarget {
                target: "/generate".to_string()
            }
        );
    }

    #[test]
    fn auth_page_without_session_passes_through() {
        assert_eq!(classify("/auth/sign-in", false, None), RouteAction::PassThrough);
    }

    #[test]
    fn public_page_passes_through_regardless_of_session() {
        assert_eq!(classify("/", false, None), RouteAction::PassThrough);
        assert_eq!(classify("/pricing", true, None), RouteAction::PassThrough);
    }

    #[test]
    fn strips_known_locale_prefixes_only() {
        assert_eq!(strip_locale_prefix("/zh/generate"), ("/generate", Some("zh")));
        assert_eq!(strip_locale_prefix("/ja"), ("/", Some("ja")));
        assert_eq!(strip_locale_prefix("/generate"), ("/generate", None));
        assert_eq!(strip_locale_prefix("/fr/generate"), ("/fr/generate", None));
    }

    #[test]
    fn locale_precedence_path_over_cookie_over_header() {
        assert_eq!(negotiate_locale(Some("ja"), Some("zh"), Some("en")), "ja");
        assert_eq!(negotiate_locale(None, Some("zh"), Some("en")), "zh");
        assert_eq!(negotiate_locale(None, None, Some("ja,en;q=0.8")), "ja");
        assert_eq!(negotiate_locale(None, None, Some("fr-FR,zh-CN;q=0.8")), "zh");
        assert_eq!(negotiate_locale(None, None, None), "en");
    }

    #[test]
    fn redirect_param_round_trips_through_percent_encoding() {
        let location = sign_in_redirect("/zh/generate?tab=video&mode=hq");
        assert_eq!(
            location,
            "/auth/sign-in?redirect=%2Fzh%2Fgenerate%3Ftab%3Dvideo%26mode%3Dhq"
        );

        let query = location.split_once('?').map(|(_, query)| query);
        assert_eq!(
            redirect_param_from_query(query),
            Some("/zh/generate?tab=video&mode=hq".to_string())
        );
    }

    #[test]
    fn plain_redirect_param_is_passed_through() {
        assert_eq!(
            redirect_param_from_query(Some("redirect=/dashboard")),
            Some("/dashboard".to_string())
        );
        assert_eq!(redirect_param_from_query(Some("other=1")), None);
        assert_eq!(redirect_param_from_query(None), None);
    }

    #[test]
    fn locale_for_request_reads_cookie() {
        assert_eq!(
            locale_for_request("/pricing", Some("theme=dark; locale=ja"), Some("zh")),
            "ja"
        );
        assert_eq!(locale_for_request("/zh/pricing", None, None), "zh");
    }
}
