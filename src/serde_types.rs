//! Sites document: ShareX-style custom uploader definitions plus defaults.

use std::{collections::HashMap, fmt, path::Path, time::Duration};

use indexmap::IndexMap;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use thiserror::Error;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Get,
    #[default]
    Post,
    Put,
    Plugin,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Plugin => "PLUGIN",
        };
        f.write_str(name)
    }
}

/// How the result URL is taken from a response.
///
/// Unknown names are kept so that dispatch can report them instead of
/// failing to load the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Text,
    RedirectionUrl,
    Other(String),
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ResponseTypeVisitor;

        impl<'de> Visitor<'de> for ResponseTypeVisitor {
            type Value = ResponseType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a response type name")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(match value {
                    "Text" => ResponseType::Text,
                    "RedirectionURL" => ResponseType::RedirectionUrl,
                    other => ResponseType::Other(other.to_string()),
                })
            }
        }

        deserializer.deserialize_str(ResponseTypeVisitor)
    }
}

impl Serialize for ResponseType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text => serializer.serialize_str("Text"),
            Self::RedirectionUrl => serializer.serialize_str("RedirectionURL"),
            Self::Other(name) => serializer.serialize_str(name),
        }
    }
}

/// A single upload destination.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SiteConfig {
    pub name: String,
    #[serde(default)]
    pub request_type: RequestType,
    #[serde(default, rename = "RequestURL")]
    pub request_url: String,
    #[serde(default)]
    pub file_form_name: Option<String>,
    #[serde(default)]
    pub arguments: IndexMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub regex_list: Vec<String>,
    #[serde(default, rename = "URL")]
    pub url: String,
    #[serde(default, rename = "ThumbnailURL")]
    pub thumbnail_url: String,
    #[serde(default, rename = "DeletionURL")]
    pub deletion_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl SiteConfig {
    /// Multipart field name, if the site takes a file.
    pub fn file_form_name(&self) -> Option<&str> {
        self.file_form_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Basic auth credentials, if a username is set.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => {
                Some((username, self.password.as_deref().unwrap_or_default()))
            }
            _ => None,
        }
    }
}

const fn default_notification_time() -> f64 {
    30.0
}

const fn default_clipboard_time() -> f64 {
    5.0
}

fn default_save_folder() -> String {
    "sharenix".to_string()
}

/// Every configured site plus the defaults used when no site is named.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(default)]
    pub default_file_uploader: String,
    #[serde(default)]
    pub default_image_uploader: String,
    #[serde(default)]
    pub default_url_shortener: String,
    #[serde(default)]
    pub xinerama_head: u32,
    #[serde(default = "default_notification_time")]
    pub notification_time: f64,
    #[serde(default)]
    pub notify_uploading: bool,
    #[serde(default)]
    pub notify_command: Option<String>,
    #[serde(default = "default_clipboard_time")]
    pub clipboard_time: f64,
    #[serde(default = "default_save_folder")]
    pub save_folder: String,
    #[serde(default)]
    pub organized_folders: bool,
    #[serde(default)]
    pub services: Vec<SiteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_file_uploader: String::new(),
            default_image_uploader: String::new(),
            default_url_shortener: String::new(),
            xinerama_head: 0,
            notification_time: default_notification_time(),
            notify_uploading: false,
            notify_command: None,
            clipboard_time: default_clipboard_time(),
            save_folder: default_save_folder(),
            organized_folders: false,
            services: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SitesError {
    #[error("io error: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("serialization error: `{0}`")]
    Serialization(#[from] serde_json::Error),
    #[error("duplicate site name: `{0}`")]
    DuplicateSite(String),
}

impl Config {
    pub fn from_json(data: &str) -> Result<Self, SitesError> {
        let config: Config = serde_json::from_str(data)?;
        config.check_unique_names()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SitesError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    fn check_unique_names(&self) -> Result<(), SitesError> {
        let mut seen = std::collections::HashSet::new();
        for site in &self.services {
            if !seen.insert(site.name.as_str()) {
                return Err(SitesError::DuplicateSite(site.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get_site(&self, name: &str) -> Option<&SiteConfig> {
        self.services.iter().find(|site| site.name == name)
    }

    /// Whether `name` is one of the three default sites.
    pub fn is_default_site(&self, name: &str) -> bool {
        [
            &self.default_file_uploader,
            &self.default_image_uploader,
            &self.default_url_shortener,
        ]
        .iter()
        .any(|default| !default.is_empty() && default.as_str() == name)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs_f64(self.notification_time.max(0.0))
    }

    pub fn clipboard_duration(&self) -> Duration {
        Duration::from_secs_f64(self.clipboard_time.max(0.0))
    }
}
