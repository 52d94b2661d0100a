use crate::get_db_pool;
use crate::global::get_webfinger_domain;
use crate::refs;
use crate::user::find_user_by_username;
use actix_web::{error, get, web, Error, HttpResponse, Responder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ACCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^acct:([^@]+)@(.+)$").expect("invalid acct regex"));

/// Splits an `acct:user@domain` resource into its parts.
pub fn parse_acct(resource: &str) -> Option<(String, String)> {
    let caps = ACCT_RE.captures(resource)?;
    Some((caps[1].to_owned(), caps[2].to_owned()))
}

#[derive(Deserialize)]
pub struct WebFingerQuery {
    pub resource: String,
}

#[derive(Serialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub href: String,
}

#[derive(Serialize)]
pub struct WebFingerJson {
    pub subject: String,
    pub links: Vec<WebFingerLink>,
}

#[get("/.well-known/webfinger")]
pub async fn view_webfinger(query: web::Query<WebFingerQuery>) -> Result<impl Responder, Error> {
    let (username, domain) = parse_acct(&query.resource)
        .ok_or_else(|| error::ErrorBadRequest("Malformed acct resource."))?;
    if domain != get_webfinger_domain() {
        return Err(error::ErrorNotFound("Unknown domain."));
    }

    let db = get_db_pool();
    let user = find_user_by_username(db, &username)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("No such user."))?;

    let body = WebFingerJson {
        subject: query.resource.to_owned(),
        links: vec![WebFingerLink {
            rel: "self".to_owned(),
            kind: "application/json".to_owned(),
            href: format!("https://{}/api/{}", domain, refs::user_ref(&user.id)),
        }],
    };
    Ok(HttpResponse::Ok()
        .content_type("application/jrd+json")
        .json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_acct() {
        let (user, domain) = parse_acct("acct:plum@gffft.app").unwrap();
        assert_eq!(user, "plum");
        assert_eq!(domain, "gffft.app");
    }

    #[test]
    fn test_parse_acct_rejects_malformed() {
        assert!(parse_acct("plum@gffft.app").is_none());
        assert!(parse_acct("acct:plum").is_none());
        assert!(parse_acct("acct:@gffft.app").is_none());
    }
}
