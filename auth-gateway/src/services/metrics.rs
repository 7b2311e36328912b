//! Gateway-specific counters. Rendered with the HTTP metrics on `/metrics`.

use metrics::counter;

/// Outcome of one credential resolution.
pub fn record_resolution(source: &'static str, outcome: &'static str) {
    counter!("auth_resolutions_total", "source" => source, "outcome" => outcome).increment(1);
}

pub fn record_login(outcome: &'static str) {
    counter!("auth_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_invite(event: &'static str) {
    counter!("auth_invites_total", "event" => event).increment(1);
}

pub fn record_password_reset(event: &'static str) {
    counter!("auth_password_resets_total", "event" => event).increment(1);
}
