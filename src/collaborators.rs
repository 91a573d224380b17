//! Desktop integration: screen capture, clipboard, notifications and the
//! browser.
//!
//! Each concern is a trait so the dispatcher can run against fakes. The
//! default implementations shell out to the usual desktop tools or use
//! `arboard` for the clipboard.

use std::{
    process::Stdio,
    sync::{Arc, LazyLock},
    time::Duration,
};

use async_trait::async_trait;
use image::{imageops, ImageFormat, RgbaImage};
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("failed to run `{program}`: `{source}`")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
    },
    #[error("no screen capture tool succeeded")]
    NoCaptureTool,
    #[error("image error: `{0}`")]
    Image(#[from] image::ImageError),
    #[error("clipboard error: `{0}`")]
    Clipboard(#[from] arboard::Error),
    #[error("background task failed: `{0}`")]
    Join(#[from] tokio::task::JoinError),
}

/// One monitor's area within the captured screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Screen {
    pub image: RgbaImage,
    pub monitors: Vec<MonitorRect>,
}

impl Screen {
    /// The image of monitor `head`, or the whole screen when its geometry
    /// is unknown.
    pub fn crop_to_head(self, head: u32) -> RgbaImage {
        let Some(rect) = self.monitors.get(head as usize) else {
            debug!("No geometry for monitor {}, keeping the whole screen", head);
            return self.image;
        };
        let x = rect.x.max(0) as u32;
        let y = rect.y.max(0) as u32;
        if x >= self.image.width() || y >= self.image.height() {
            warn!("Monitor {} lies outside the captured screen", head);
            return self.image;
        }
        let width = rect.width.min(self.image.width() - x);
        let height = rect.height.min(self.image.height() - y);
        imageops::crop_imm(&self.image, x, y, width, height).to_image()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardContent {
    Text(String),
    Image(RgbaImage),
    Empty,
}

#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> Result<Screen, CollaboratorError>;
}

#[async_trait]
pub trait ClipboardProvider: Send + Sync {
    async fn contents(&self) -> Result<ClipboardContent, CollaboratorError>;
    /// Store `text`, keeping ownership of the selection for `hold`.
    async fn set_text(&self, text: &str, hold: Duration) -> Result<(), CollaboratorError>;
}

/// Server-side id of a shown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationId(pub u32);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, expire: Duration) -> Result<(), CollaboratorError>;

    /// Show a notification that can be closed before it expires. Returns
    /// `None` when the notifier has no way to close it.
    async fn show_progress(
        &self,
        message: &str,
        expire: Duration,
    ) -> Result<Option<NotificationId>, CollaboratorError> {
        self.notify(message, expire).await?;
        Ok(None)
    }

    async fn close(&self, _id: NotificationId) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), CollaboratorError>;
}

/// Everything the dispatcher needs from the desktop.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn ScreenCapture>,
    pub clipboard: Arc<dyn ClipboardProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub browser: Arc<dyn BrowserOpener>,
}

impl Collaborators {
    pub fn with_notify_command(notify_command: Option<String>) -> Self {
        Self {
            notifier: Arc::new(DefaultNotifier { notify_command }),
            ..Default::default()
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            capture: Arc::new(DefaultScreenCapture),
            clipboard: Arc::new(DefaultClipboard),
            notifier: Arc::new(DefaultNotifier::default()),
            browser: Arc::new(DefaultBrowserOpener),
        }
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<Vec<u8>, CollaboratorError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CollaboratorError::Command {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(CollaboratorError::CommandFailed {
            program: program.to_string(),
            status: output.status,
        });
    }
    Ok(output.stdout)
}

static MONITOR_GEOMETRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)/\d+x(\d+)/\d+\+(-?\d+)\+(-?\d+)").expect("monitor geometry pattern")
});

/// Parse `xrandr --listmonitors` output.
pub fn parse_monitors(output: &str) -> Vec<MonitorRect> {
    output
        .lines()
        .filter_map(|line| {
            let caps = MONITOR_GEOMETRY.captures(line)?;
            Some(MonitorRect {
                width: caps[1].parse().ok()?,
                height: caps[2].parse().ok()?,
                x: caps[3].parse().ok()?,
                y: caps[4].parse().ok()?,
            })
        })
        .collect()
}

struct DefaultScreenCapture;

const CAPTURE_TOOLS: [(&str, &[&str]); 2] = [
    ("grim", &["-"]),
    ("import", &["-window", "root", "png:-"]),
];

#[async_trait]
impl ScreenCapture for DefaultScreenCapture {
    async fn capture(&self) -> Result<Screen, CollaboratorError> {
        let mut png = None;
        for (program, args) in CAPTURE_TOOLS {
            match run_command(program, args).await {
                Ok(data) if !data.is_empty() => {
                    debug!("Captured screen with {}", program);
                    png = Some(data);
                    break;
                }
                Ok(_) => debug!("{} produced no image", program),
                Err(e) => debug!("Screen capture via {} failed: {}", program, e),
            }
        }
        let png = png.ok_or(CollaboratorError::NoCaptureTool)?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?.to_rgba8();

        let monitors = match run_command("xrandr", &["--listmonitors"]).await {
            Ok(output) => parse_monitors(&String::from_utf8_lossy(&output)),
            Err(e) => {
                debug!("Monitor geometry unavailable: {}", e);
                Vec::new()
            }
        };

        Ok(Screen { image, monitors })
    }
}

struct DefaultClipboard;

#[async_trait]
impl ClipboardProvider for DefaultClipboard {
    async fn contents(&self) -> Result<ClipboardContent, CollaboratorError> {
        let content = tokio::task::spawn_blocking(|| -> Result<_, CollaboratorError> {
            let mut clipboard = arboard::Clipboard::new()?;
            if let Ok(text) = clipboard.get_text() {
                if !text.is_empty() {
                    return Ok(ClipboardContent::Text(text));
                }
            }
            let image = clipboard.get_image().ok().and_then(|data| {
                RgbaImage::from_raw(
                    data.width as u32,
                    data.height as u32,
                    data.bytes.into_owned(),
                )
            });
            Ok(image.map_or(ClipboardContent::Empty, ClipboardContent::Image))
        })
        .await??;
        Ok(content)
    }

    async fn set_text(&self, text: &str, hold: Duration) -> Result<(), CollaboratorError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CollaboratorError> {
            let mut clipboard = arboard::Clipboard::new()?;
            clipboard.set_text(text)?;
            // X11 selections die with their owner.
            std::thread::sleep(hold);
            Ok(())
        })
        .await??;
        Ok(())
    }
}

pub const MESSAGE_PLACEHOLDER: &str = "{message}";

/// Split a notify command into argv, substituting the message. The message
/// is appended when the command has no placeholder.
pub fn notify_command_args(command: &str, message: &str) -> Vec<String> {
    let mut args: Vec<String> = command
        .split_whitespace()
        .map(|token| token.replace(MESSAGE_PLACEHOLDER, message))
        .collect();
    if !command.contains(MESSAGE_PLACEHOLDER) {
        args.push(message.to_string());
    }
    args
}

/// The id `notify-send --print-id` writes to stdout.
pub fn parse_notification_id(output: &[u8]) -> Option<NotificationId> {
    String::from_utf8_lossy(output)
        .trim()
        .parse()
        .ok()
        .map(NotificationId)
}

#[derive(Default)]
struct DefaultNotifier {
    notify_command: Option<String>,
}

impl DefaultNotifier {
    fn custom_command(&self) -> Option<&str> {
        self.notify_command.as_deref().filter(|c| !c.trim().is_empty())
    }

    async fn notify_send(
        &self,
        message: &str,
        expire: Duration,
        print_id: bool,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let expire = expire.as_millis().to_string();
        let mut args = vec!["-t", expire.as_str()];
        if print_id {
            args.push("-p");
        }
        args.extend(["sharenix", message]);
        run_command("notify-send", &args).await
    }
}

#[async_trait]
impl Notifier for DefaultNotifier {
    async fn notify(&self, message: &str, expire: Duration) -> Result<(), CollaboratorError> {
        let Some(command) = self.custom_command() else {
            self.notify_send(message, expire, false).await?;
            return Ok(());
        };
        let args = notify_command_args(command, message);
        let Some((program, rest)) = args.split_first() else {
            return Ok(());
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        run_command(program, &rest).await?;
        Ok(())
    }

    async fn show_progress(
        &self,
        message: &str,
        expire: Duration,
    ) -> Result<Option<NotificationId>, CollaboratorError> {
        if self.custom_command().is_some() {
            self.notify(message, expire).await?;
            return Ok(None);
        }
        let output = self.notify_send(message, expire, true).await?;
        Ok(parse_notification_id(&output))
    }

    async fn close(&self, id: NotificationId) -> Result<(), CollaboratorError> {
        let id = id.0.to_string();
        run_command(
            "gdbus",
            &[
                "call",
                "--session",
                "--dest",
                "org.freedesktop.Notifications",
                "--object-path",
                "/org/freedesktop/Notifications",
                "--method",
                "org.freedesktop.Notifications.CloseNotification",
                &id,
            ],
        )
        .await?;
        Ok(())
    }
}

struct DefaultBrowserOpener;

#[async_trait]
impl BrowserOpener for DefaultBrowserOpener {
    async fn open(&self, url: &str) -> Result<(), CollaboratorError> {
        run_command("xdg-open", &[url]).await?;
        Ok(())
    }
}
