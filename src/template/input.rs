use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::serde_types::SiteConfig;

pub const INPUT_TOKEN: &str = "$input$";

/// Replace `$input$`, then the date keywords, in `template`.
///
/// This is plain string replacement; `$...$` expressions are left alone.
pub fn substitute_input<Tz: TimeZone>(template: &str, input: &str, now: &DateTime<Tz>) -> String {
    if !template.contains('$') {
        return template.to_string();
    }

    let keywords = [
        ("$Y$", format!("{:04}", now.year())),
        ("$M$", format!("{:02}", now.month())),
        ("$D$", format!("{:02}", now.day())),
        ("$h$", format!("{:02}", now.hour())),
        ("$m$", format!("{:02}", now.minute())),
        ("$s$", format!("{:02}", now.second())),
        ("$n$", now.nanosecond().to_string()),
    ];

    let mut out = template.replace(INPUT_TOKEN, input);
    for (keyword, value) in keywords.iter() {
        out = out.replace(keyword, value);
    }
    out
}

/// Apply input substitution to a working copy of `site`: every argument
/// value and the request URL.
pub fn substitute_site<Tz: TimeZone>(site: &SiteConfig, input: &str, now: &DateTime<Tz>) -> SiteConfig {
    let mut site = site.clone();
    for value in site.arguments.values_mut() {
        *value = substitute_input(value, input, now);
    }
    site.request_url = substitute_input(&site.request_url, input, now);
    site
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_nano_opt(4, 5, 6, 789)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_input_token() {
        assert_eq!(
            substitute_input("name=$input$&again=$input$", "a.png", &now()),
            "name=a.png&again=a.png"
        );
    }

    #[test]
    fn test_date_keywords() {
        assert_eq!(
            substitute_input("$Y$-$M$-$D$_$h$:$m$:$s$.$n$", "", &now()),
            "2024-03-07_04:05:06.789"
        );
    }

    #[test]
    fn test_identity_without_tokens() {
        let templates = ["", "https://example.com/upload", "$1,1$", "$json:data.link$", "$$"];
        for template in templates {
            assert_eq!(substitute_input(template, "input", &now()), template);
        }
    }

    #[test]
    fn test_substitute_site_keeps_original() {
        let mut site = SiteConfig {
            request_url: "https://x/$Y$/$input$".to_string(),
            ..Default::default()
        };
        site.arguments.insert("name".to_string(), "$input$".to_string());
        site.arguments.insert("fixed".to_string(), "value".to_string());

        let working = substitute_site(&site, "a.txt", &now());
        assert_eq!(working.request_url, "https://x/2024/a.txt");
        assert_eq!(working.arguments["name"], "a.txt");
        assert_eq!(working.arguments["fixed"], "value");
        assert_eq!(site.arguments["name"], "$input$");
    }
}
