//! Per-recipient rendering of a campaign's HTML.
//!
//! Placeholders are matched literally and every occurrence is replaced.
//! Unknown `{{...}}` sequences are left untouched.

pub const FIRST_NAME_PLACEHOLDER: &str = "{{firstName}}";
pub const LAST_NAME_PLACEHOLDER: &str = "{{lastName}}";
pub const EMAIL_PLACEHOLDER: &str = "{{email}}";
pub const UNSUBSCRIBE_URL_PLACEHOLDER: &str = "{{unsubscribeUrl}}";

const CLOSING_BODY_TAG: &str = "</body";

/// Values substituted into a template for one recipient.
#[derive(Debug, Clone, Copy)]
pub struct Personalization<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: &'a str,
    pub unsubscribe_url: &'a str,
}

/// Replaces every placeholder in a single left-to-right pass, so substituted
/// values are never scanned again.
pub fn personalize(template: &str, values: &Personalization<'_>) -> String {
    let placeholders = [
        (FIRST_NAME_PLACEHOLDER, values.first_name.unwrap_or("")),
        (LAST_NAME_PLACEHOLDER, values.last_name.unwrap_or("")),
        (EMAIL_PLACEHOLDER, values.email),
        (UNSUBSCRIBE_URL_PLACEHOLDER, values.unsubscribe_url),
    ];
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let candidate = &rest[start..];

        match placeholders
            .iter()
            .find(|(placeholder, _)| candidate.starts_with(placeholder))
        {
            Some((placeholder, value)) => {
                rendered.push_str(value);
                rest = &candidate[placeholder.len()..];
            }
            None => {
                rendered.push('{');
                rest = &candidate[1..];
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

pub fn beacon_tag(beacon_url: &str) -> String {
    format!(
        r#"<img src="{}" width="0" height="0" alt="" style="border:0;display:block;" />"#,
        beacon_url
    )
}

/// Puts the beacon right before the last closing body tag, or at the end of
/// the document when there is none.
pub fn inject_beacon(html: &str, beacon: &str) -> String {
    match closing_body_position(html) {
        Some(position) => {
            let mut injected = String::with_capacity(html.len() + beacon.len());
            injected.push_str(&html[..position]);
            injected.push_str(beacon);
            injected.push_str(&html[position..]);
            injected
        }
        None => format!("{}{}", html, beacon),
    }
}

// ASCII lowercasing keeps byte offsets, so positions in `lowered` are valid in `html`
fn closing_body_position(html: &str) -> Option<usize> {
    let lowered = html.to_ascii_lowercase();

    lowered
        .rmatch_indices(CLOSING_BODY_TAG)
        .find(|(position, tag)| {
            lowered[position + tag.len()..]
                .chars()
                .next()
                .map_or(false, |next| next == '>' || next.is_ascii_whitespace())
        })
        .map(|(position, _)| position)
}

pub fn render(template: &str, values: &Personalization<'_>, beacon_url: &str) -> String {
    inject_beacon(&personalize(template, values), &beacon_tag(beacon_url))
}
