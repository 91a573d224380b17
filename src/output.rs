//! Terminal and notification text.

use crate::{dispatch::UploadResult, history::HistoryRecord};

pub fn format_result(result: &UploadResult) -> String {
    let mut out = format!("URL: {}", result.url);
    if !result.thumbnail_url.is_empty() {
        out.push_str(&format!("\nThumbnail URL: {}", result.thumbnail_url));
    }
    if !result.deletion_url.is_empty() {
        out.push_str(&format!("\nDeletion URL: {}", result.deletion_url));
    }
    out
}

/// Grep-able history listing, one blank-line separated entry per upload.
pub fn format_history_listing(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "Empty!".to_string();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "* {} - URL: {} Thumbnail URL: {} Deletion URL: {}\n",
                r.filename, r.url, r.thumbnail_url, r.deletion_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Notification markup linking to `url`.
pub fn success_notification(url: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        html_escape::encode_double_quoted_attribute(url),
        html_escape::encode_text(url)
    )
}

pub fn error_notification(error: &str) -> String {
    html_escape::encode_text(error).into_owned()
}
