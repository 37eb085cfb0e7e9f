//! Directory attributes derived from a source profile.

use roster_core::{Attributes, SourceUserProfile};

pub const DEFAULT_GIVEN_NAME: &str = "Unknown";
pub const DEFAULT_SURNAME: &str = "User";
pub const FALLBACK_MAIL_DOMAIN: &str = "fallback.com";

/// Characters of the user id kept in a fallback address.
const FALLBACK_ID_CHARS: usize = 8;

/// Full attribute set for a managed entry, `objectClass` excluded.
///
/// `telephoneNumber` is present with an empty value list when the profile has
/// no phone, so a modify-replace clears a stale number.
pub fn derive(profile: &SourceUserProfile) -> Attributes {
    let given = non_blank(profile.first_name.as_deref()).unwrap_or(DEFAULT_GIVEN_NAME);
    let surname = non_blank(profile.last_name.as_deref()).unwrap_or(DEFAULT_SURNAME);

    let mut attrs = Attributes::new();
    attrs.insert("uid".to_owned(), vec![profile.id.0.clone()]);
    attrs.insert("givenName".to_owned(), vec![given.to_owned()]);
    attrs.insert("sn".to_owned(), vec![surname.to_owned()]);
    attrs.insert("cn".to_owned(), vec![common_name(given, surname)]);
    attrs.insert("mail".to_owned(), vec![mail(profile)]);
    attrs.insert(
        "telephoneNumber".to_owned(),
        telephone(profile).into_iter().collect(),
    );
    attrs
}

/// `"<given> <surname>"` with surrounding whitespace removed.
pub fn common_name(given: &str, surname: &str) -> String {
    format!("{given} {surname}").trim().to_owned()
}

/// The profile's email, or `user_<first 8 chars of id>@fallback.com`.
pub fn mail(profile: &SourceUserProfile) -> String {
    match non_blank(profile.email.as_deref()) {
        Some(email) => email.to_owned(),
        None => {
            let prefix: String = profile.id.as_str().chars().take(FALLBACK_ID_CHARS).collect();
            format!("user_{prefix}@{FALLBACK_MAIL_DOMAIN}")
        }
    }
}

/// Non-blank area code and number joined; `None` when both are blank.
pub fn telephone(profile: &SourceUserProfile) -> Option<String> {
    let joined: String = [&profile.phone.area_code, &profile.phone.mobile_number]
        .into_iter()
        .filter_map(|part| non_blank(part.as_deref()))
        .collect();
    (!joined.is_empty()).then_some(joined)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
