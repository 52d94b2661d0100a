use once_cell::sync::OnceCell;

static IDENTITY_PROJECT_ID: OnceCell<String> = OnceCell::new();
static AUTH_EMULATOR_HOST: OnceCell<Option<String>> = OnceCell::new();
static IDENTITY_JWT_PUBKEY: OnceCell<Option<String>> = OnceCell::new();
static WEBFINGER_DOMAIN: OnceCell<String> = OnceCell::new();

#[inline(always)]
pub fn get_identity_project_id() -> &'static str {
    unsafe { IDENTITY_PROJECT_ID.get_unchecked() }
}

/// When set, identity tokens are decoded without signature verification.
#[inline(always)]
pub fn get_auth_emulator_host() -> &'static Option<String> {
    unsafe { AUTH_EMULATOR_HOST.get_unchecked() }
}

#[inline(always)]
pub fn get_identity_jwt_pubkey() -> &'static Option<String> {
    unsafe { IDENTITY_JWT_PUBKEY.get_unchecked() }
}

#[inline(always)]
pub fn get_webfinger_domain() -> &'static str {
    unsafe { WEBFINGER_DOMAIN.get_unchecked() }
}

pub fn init() {
    let project_id = std::env::var("IDENTITY_PROJECT_ID")
        .expect("IDENTITY_PROJECT_ID missing from .env (hint: your auth project id)");
    IDENTITY_PROJECT_ID
        .set(project_id)
        .expect("failed to set IDENTITY_PROJECT_ID");

    AUTH_EMULATOR_HOST
        .set(std::env::var("AUTH_EMULATOR_HOST").ok())
        .expect("failed to set AUTH_EMULATOR_HOST");

    IDENTITY_JWT_PUBKEY
        .set(std::env::var("IDENTITY_JWT_PUBKEY").ok())
        .expect("failed to set IDENTITY_JWT_PUBKEY");

    let domain = std::env::var("WEBFINGER_DOMAIN").unwrap_or_else(|_| "gffft.app".to_owned());
    WEBFINGER_DOMAIN
        .set(domain)
        .expect("failed to set WEBFINGER_DOMAIN");
}
