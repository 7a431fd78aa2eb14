// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Save-path placeholders.
//
//   $(n)     1-based number of the save call
//   $(yyyy)  4-digit year      $(yy)  2-digit year
//   $(MM)    month             $(dd)  day
//   $(hh)    hour (24h)        $(mm)  minute       $(ss)  second
//
// Date and time come from the wall clock at the moment of the save call.

use chrono::{DateTime, Local, TimeZone};

/// Substitute every placeholder in `template` for save call `index`
/// (0-based) at time `now`.
pub fn substitute<Tz: TimeZone>(template: &str, index: usize, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let replacements = [
        ("$(n)", (index + 1).to_string()),
        ("$(yyyy)", now.format("%Y").to_string()),
        ("$(yy)", now.format("%y").to_string()),
        ("$(MM)", now.format("%m").to_string()),
        ("$(dd)", now.format("%d").to_string()),
        ("$(hh)", now.format("%H").to_string()),
        ("$(mm)", now.format("%M").to_string()),
        ("$(ss)", now.format("%S").to_string()),
    ];

    replacements
        .iter()
        .fold(template.to_string(), |path, (placeholder, value)| {
            path.replace(placeholder, value)
        })
}

/// [`substitute`] with the current local time.
pub fn substitute_now(template: &str, index: usize) -> String {
    substitute(template, index, &Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn every_placeholder_is_replaced() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).single().expect("valid date");
        let out = substitute(
            "/scans/$(yyyy)-$(MM)-$(dd)/$(yy)_$(hh)$(mm)$(ss)_$(n).pdf",
            0,
            &now,
        );
        assert_eq!(out, "/scans/2026-03-07/26_140509_1.pdf");
    }

    #[test]
    fn sequence_number_is_one_based() {
        let now = Utc::now();
        assert_eq!(substitute("out_$(n).jpg", 2, &now), "out_3.jpg");
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        assert_eq!(substitute_now("/tmp/plain.pdf", 5), "/tmp/plain.pdf");
    }

    #[test]
    fn repeated_placeholders_are_all_replaced() {
        let now = Utc::now();
        assert_eq!(substitute("$(n)/$(n).png", 0, &now), "1/1.png");
    }
}
