//! The upload pipeline: mode and site resolution, payload acquisition,
//! request, URL extraction, validation and history.

use std::{str::FromStr, sync::LazyLock};

use chrono::Local;
use regex::Regex;
use thiserror::Error;

use crate::{
    collaborators::{ClipboardContent, CollaboratorError, Collaborators, NotificationId},
    executor::{Executor, ExecutorError, ExecutorResponse},
    history::{HistoryError, HistoryLedger, HistoryRecord},
    paths::{PathsError, Storage},
    payload::{archive_png, archive_text, parse_uri_list, Payload},
    serde_types::{Config, ResponseType, SiteConfig},
    sniff::{is_image, sniff_mime_type},
    template::{evaluate, substitute_site, RegexMatchSet, ResponseContext},
};

pub const DEFAULT_SITE: &str = "default";
pub const UNRECOGNIZED_RESPONSE_TYPE: &str = "Unrecognized ResponseType";

/// A scheme, `://` and no whitespace or quotes. Trailing sentence
/// punctuation is not part of the URL.
static STRICT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z][A-Za-z0-9+.\-]*://[^\s<>"'`]*[^\s<>"'`.,:;!?]"#).expect("strict url pattern")
});

const BRACKETS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("mode `{0}` is not implemented")]
    NotImplemented(String),
    #[error("site not found: `{0}`")]
    SiteNotFound(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("request failed: `{0}`")]
    RequestFailed(#[from] ExecutorError),
    #[error("Request failed: {0}")]
    ValidationFailed(String),
    #[error("history error: `{0}`")]
    History(#[from] HistoryError),
    #[error("storage error: `{0}`")]
    Paths(#[from] PathsError),
    #[error("desktop integration error: `{0}`")]
    Desktop(#[from] CollaboratorError),
    #[error("image error: `{0}`")]
    Image(#[from] image::ImageError),
    #[error("io error: `{0}`")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    File,
    Fullscreen,
    Clipboard,
    Url,
}

impl FromStr for Mode {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f" | "file" => Ok(Mode::File),
            "fs" | "fullscreen" => Ok(Mode::Fullscreen),
            "c" | "clipboard" => Ok(Mode::Clipboard),
            "u" | "url" => Ok(Mode::Url),
            other => Err(DispatchError::NotImplemented(other.to_string())),
        }
    }
}

impl Mode {
    /// Whether this mode needs an input argument.
    pub fn needs_input(&self) -> bool {
        matches!(self, Mode::File | Mode::Url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
    pub thumbnail_url: String,
    pub deletion_url: String,
    pub filename: String,
}

impl From<UploadResult> for HistoryRecord {
    fn from(result: UploadResult) -> Self {
        HistoryRecord {
            url: result.url,
            thumbnail_url: result.thumbnail_url,
            deletion_url: result.deletion_url,
            filename: result.filename,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Show a progress notification while uploading, when the sites
    /// document enables it.
    pub notify: bool,
    pub open: bool,
    pub copy_url: bool,
}

/// Whether `url` is exactly one strict URL and nothing else.
pub fn is_strict_url(url: &str) -> bool {
    let mut matches = STRICT_URL.find_iter(url);
    match (matches.next(), matches.next()) {
        (Some(m), None) => {
            m.start() == 0
                && m.end() == url.len()
                && !ends_with_unbalanced_bracket(url)
                && url::Url::parse(url).is_ok()
        }
        _ => false,
    }
}

/// `http://x/a)` closes a bracket it never opened, `http://x/a_(b)` does not.
fn ends_with_unbalanced_bracket(url: &str) -> bool {
    BRACKETS.iter().any(|&(open, close)| {
        url.ends_with(close) && url.matches(close).count() > url.matches(open).count()
    })
}

/// Trim one trailing newline and require a lone strict URL.
pub fn validate_url(url: &str) -> Result<String, DispatchError> {
    let url = url.strip_suffix('\n').unwrap_or(url);
    if is_strict_url(url) {
        Ok(url.to_string())
    } else {
        Err(DispatchError::ValidationFailed(url.to_string()))
    }
}

/// Pull the URL triple out of a response.
pub fn extract_urls(
    site: &SiteConfig,
    response: &ExecutorResponse,
) -> Result<(String, String, String), DispatchError> {
    match &site.response_type {
        ResponseType::RedirectionUrl => {
            let url = match response.final_url() {
                Some(url) => url.to_string(),
                None => String::from_utf8_lossy(response.body()).into_owned(),
            };
            Ok((url, String::new(), String::new()))
        }
        ResponseType::Text => {
            let body = String::from_utf8_lossy(response.body());
            let matches = RegexMatchSet::build(&body, &site.regex_list)
                .map_err(|e| DispatchError::InvalidPayload(format!("malformed regex list: {}", e)))?;
            let ctx = ResponseContext {
                body: response.body(),
                matches: &matches,
            };
            let mut url = evaluate(&site.url, &ctx);
            if url.is_empty() {
                url = body.into_owned();
            }
            Ok((
                url,
                evaluate(&site.thumbnail_url, &ctx),
                evaluate(&site.deletion_url, &ctx),
            ))
        }
        ResponseType::Other(kind) => {
            warn!("Unrecognized response type `{}` for {}", kind, site.name);
            Ok((
                UNRECOGNIZED_RESPONSE_TYPE.to_string(),
                String::new(),
                String::new(),
            ))
        }
    }
}

/// Drives one upload from mode to history.
pub struct Dispatcher {
    config: Config,
    executor: Executor,
    storage: Storage,
    history: HistoryLedger,
    collaborators: Collaborators,
}

impl Dispatcher {
    pub fn new(config: Config, executor: Executor, storage: Storage, collaborators: Collaborators) -> Self {
        let history = HistoryLedger::new(storage.history_file());
        Self {
            config,
            executor,
            storage,
            history,
            collaborators,
        }
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    fn lookup(&self, name: &str) -> Result<&SiteConfig, DispatchError> {
        self.config
            .get_site(name)
            .ok_or_else(|| DispatchError::SiteNotFound(name.to_string()))
    }

    /// The site named `name`, or the mode's default site for `default`.
    pub fn resolve_site(&self, mode: Mode, name: &str) -> Result<&SiteConfig, DispatchError> {
        if name != DEFAULT_SITE {
            return self.lookup(name);
        }
        let default = match mode {
            Mode::File | Mode::Clipboard => &self.config.default_file_uploader,
            Mode::Fullscreen => &self.config.default_image_uploader,
            Mode::Url => &self.config.default_url_shortener,
        };
        self.lookup(default)
    }

    /// Switch between the default image and file uploaders by MIME type.
    /// Sites that are not one of the defaults are kept.
    pub fn reroute_for_file<'a>(
        &'a self,
        site: &'a SiteConfig,
        mime_type: &str,
    ) -> Result<&'a SiteConfig, DispatchError> {
        if !self.config.is_default_site(&site.name) {
            return Ok(site);
        }
        let target = if is_image(mime_type) {
            &self.config.default_image_uploader
        } else {
            &self.config.default_file_uploader
        };
        if target.is_empty() || *target == site.name {
            return Ok(site);
        }
        debug!("Rerouting {} upload from {} to {}", mime_type, site.name, target);
        self.lookup(target)
    }

    async fn acquire<'a>(
        &'a self,
        mode: Mode,
        site: &'a SiteConfig,
        input: Option<&str>,
    ) -> Result<(Payload, &'a SiteConfig), DispatchError> {
        match mode {
            Mode::File => {
                let path = input.ok_or_else(|| DispatchError::InvalidPayload("no file provided".to_string()))?;
                Ok((Payload::File(path.into()), site))
            }
            Mode::Url => {
                let url = input.ok_or_else(|| DispatchError::InvalidPayload("no url provided".to_string()))?;
                Ok((Payload::Url(url.to_string()), site))
            }
            Mode::Fullscreen => {
                info!("Taking screenshot...");
                let screen = self.collaborators.capture.capture().await?;
                let image = screen.crop_to_head(self.config.xinerama_head);
                Ok((Payload::File(archive_png(&self.storage, &image).await?), site))
            }
            Mode::Clipboard => self.acquire_clipboard(site).await,
        }
    }

    async fn acquire_clipboard<'a>(
        &'a self,
        site: &'a SiteConfig,
    ) -> Result<(Payload, &'a SiteConfig), DispatchError> {
        match self.collaborators.clipboard.contents().await? {
            ClipboardContent::Text(text) => {
                if let Some(path) = parse_uri_list(&text).into_iter().next() {
                    debug!("Clipboard holds copied file {}", path.display());
                    return Ok((Payload::File(path), site));
                }
                let trimmed = text.trim();
                if is_strict_url(trimmed) {
                    debug!("Clipboard holds a url");
                    let site = if site.name == self.config.default_file_uploader {
                        self.lookup(&self.config.default_url_shortener)?
                    } else {
                        site
                    };
                    return Ok((Payload::Url(trimmed.to_string()), site));
                }
                debug!("Clipboard holds plain text");
                Ok((Payload::File(archive_text(&self.storage, &text).await?), site))
            }
            ClipboardContent::Image(image) => {
                debug!("Clipboard holds a {}x{} image", image.width(), image.height());
                Ok((Payload::File(archive_png(&self.storage, &image).await?), site))
            }
            ClipboardContent::Empty => Err(DispatchError::InvalidPayload(
                "could not find any supported data in the clipboard".to_string(),
            )),
        }
    }

    async fn upload(
        &self,
        mode: Mode,
        site_name: &str,
        input: Option<&str>,
        options: &DispatchOptions,
    ) -> Result<UploadResult, DispatchError> {
        let site = self.resolve_site(mode, site_name)?;
        debug!("Site resolved: {}", site.name);

        let (payload, mut site) = self.acquire(mode, site, input).await?;
        if let Payload::File(path) = &payload {
            let mime_type = sniff_mime_type(path)
                .await
                .map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;
            site = self.reroute_for_file(site, &mime_type)?;
        }

        let working = substitute_site(site, &payload.input(), &Local::now());
        debug!(
            "Request built: {} {} with {} arguments",
            working.request_type,
            working.request_url,
            working.arguments.len()
        );

        let progress = if options.notify && self.config.notify_uploading {
            let notifier = self.collaborators.notifier.clone();
            let message = match &payload {
                Payload::File(path) => format!("Uploading {} to {}...", path.display(), working.name),
                Payload::Url(url) => format!("Shortening {} with {}...", url, working.name),
            };
            let expire = self.config.notification_duration();
            Some(tokio::spawn(async move {
                match notifier.show_progress(&message, expire).await {
                    Ok(id) => id,
                    Err(e) => {
                        debug!("Progress notification failed: {}", e);
                        None
                    }
                }
            }))
        } else {
            None
        };

        info!("Uploading to {}", working.name);
        let response = self.executor.execute(&working, payload.path()).await;
        if let Some(progress) = progress {
            match progress.await {
                Ok(Some(id)) => self.close_progress(id).await,
                Ok(None) => {}
                Err(e) => debug!("Progress notification task failed: {}", e),
            }
        }
        let response = response?;
        debug!("Response received: {} bytes", response.body().len());

        let (url, thumbnail_url, deletion_url) = extract_urls(&working, &response)?;
        debug!("Url extracted: {}", url);

        let url = validate_url(&url)?;
        debug!("Validated: {}", url);

        let result = UploadResult {
            url,
            thumbnail_url,
            deletion_url,
            filename: payload.input(),
        };
        self.history.append(result.clone().into()).await?;
        debug!("Recorded in {}", self.history.path().display());
        Ok(result)
    }

    /// Run one upload.
    ///
    /// The URL is copied to the clipboard when requested even if it failed
    /// validation. It is only opened in the browser on success, and a browser
    /// that fails to start does not fail the upload.
    pub async fn dispatch(
        &self,
        mode: Mode,
        site_name: &str,
        input: Option<&str>,
        options: &DispatchOptions,
    ) -> Result<UploadResult, DispatchError> {
        debug!("Mode resolved: {:?}", mode);
        let result = self.upload(mode, site_name, input, options).await;
        if let Err(e) = &result {
            debug!("Failed: {}", e);
        }

        if options.copy_url {
            let url = match &result {
                Ok(result) => Some(result.url.as_str()),
                Err(DispatchError::ValidationFailed(url)) => Some(url.as_str()),
                Err(_) => None,
            };
            if let Some(url) = url {
                debug!("Copying url to clipboard...");
                let hold = self.config.clipboard_duration();
                if let Err(e) = self.collaborators.clipboard.set_text(url, hold).await {
                    warn!("Failed to copy url to clipboard: {}", e);
                }
            }
        }

        if let (true, Ok(result)) = (options.open, &result) {
            if let Err(e) = self.collaborators.browser.open(&result.url).await {
                warn!("Failed to open url in browser: {}", e);
            }
        }

        result
    }

    async fn close_progress(&self, id: NotificationId) {
        debug!("Closing progress notification {}", id.0);
        if let Err(e) = self.collaborators.notifier.close(id).await {
            debug!("Failed to close progress notification: {}", e);
        }
    }

    /// Show `message` for the configured notification time.
    pub async fn notify(&self, message: &str) -> Result<(), DispatchError> {
        self.collaborators
            .notifier
            .notify(message, self.config.notification_duration())
            .await?;
        Ok(())
    }
}
