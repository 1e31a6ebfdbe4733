//! Configuration management for the OCR gateway
//!
//! Values come from process environment variables (after `.env` is loaded by
//! `main`), each falling back to its default when unset. A variable that is
//! set but malformed is an error rather than silently replaced.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_CAPACITY, DEFAULT_TTL_SECS};
use crate::intake::ValidationLimits;
use crate::normalize::{NormalizeConfig, DEFAULT_CONTRAST_FACTOR, DEFAULT_JPEG_QUALITY};
use crate::ocr::{DEFAULT_TIMEOUT, DEFAULT_WORKERS};
use crate::rate_limit::RateSpec;

/// Default images per batch request
pub const DEFAULT_MAX_BATCH_FILES: usize = 10;

/// Multipart framing allowance added to the request body limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Error loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when OCR_PROVIDER=google-vision")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub cache: CacheSettings,
    pub image: ImageConfig,
    pub ocr: OcrConfig,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_file_size: usize,
    pub max_gif_size: usize,
    pub max_gif_frames: usize,
    pub max_batch_files: usize,
    pub batch_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_size: usize,
    pub cache_empty_results: bool,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub contrast_factor: f32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrProviderKind {
    Tesseract,
    GoogleVision,
}

impl FromStr for OcrProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "google-vision" | "google_vision" | "vision" => Ok(Self::GoogleVision),
            other => Err(format!("unknown provider {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub provider: OcrProviderKind,
    pub language: String,
    pub google_api_key: Option<String>,
    pub google_endpoint: Option<String>,
    pub workers: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub single: RateSpec,
    pub batch: RateSpec,
    pub global: RateSpec,
}

impl Default for Config {
    fn default() -> Self {
        let limits = ValidationLimits::default();
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            limits: LimitsConfig {
                max_file_size: limits.max_file_size,
                max_gif_size: limits.max_gif_size,
                max_gif_frames: limits.max_gif_frames,
                max_batch_files: DEFAULT_MAX_BATCH_FILES,
                batch_concurrency: 1,
            },
            cache: CacheSettings {
                ttl_secs: DEFAULT_TTL_SECS,
                max_size: DEFAULT_CAPACITY,
                cache_empty_results: true,
            },
            image: ImageConfig {
                contrast_factor: DEFAULT_CONTRAST_FACTOR,
                jpeg_quality: DEFAULT_JPEG_QUALITY,
            },
            ocr: OcrConfig {
                provider: OcrProviderKind::Tesseract,
                language: "eng".to_string(),
                google_api_key: None,
                google_endpoint: None,
                workers: DEFAULT_WORKERS,
                timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            },
            rate_limit: RateLimitSettings {
                single: RateSpec::per_minute(100),
                batch: RateSpec::per_minute(20),
                global: RateSpec::per_minute(200),
            },
        }
    }
}

/// Reads one typed variable through a lookup function
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: &str) -> String {
        (self.lookup)(name).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match (self.lookup)(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match (self.lookup)(name) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name,
                    value,
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = Config::default();

        let max_file_size = vars.parse("MAX_FILE_SIZE", defaults.limits.max_file_size)?;
        let requested_gif_size = vars.parse("MAX_GIF_SIZE", defaults.limits.max_gif_size)?;
        let max_gif_size = requested_gif_size.min(max_file_size);
        if max_gif_size < requested_gif_size {
            tracing::warn!(
                requested = requested_gif_size,
                applied = max_gif_size,
                "MAX_GIF_SIZE exceeds MAX_FILE_SIZE, clamping"
            );
        }

        let provider = vars.parse("OCR_PROVIDER", defaults.ocr.provider)?;
        let google_api_key = vars.optional("GOOGLE_VISION_API_KEY");
        if provider == OcrProviderKind::GoogleVision && google_api_key.is_none() {
            return Err(ConfigError::Missing("GOOGLE_VISION_API_KEY"));
        }

        Ok(Config {
            server: ServerConfig {
                host: vars.string("SERVER_HOST", &defaults.server.host),
                port: vars.parse("SERVER_PORT", defaults.server.port)?,
            },
            limits: LimitsConfig {
                max_file_size,
                max_gif_size,
                max_gif_frames: vars.parse("MAX_GIF_FRAMES", defaults.limits.max_gif_frames)?,
                max_batch_files: vars.parse("MAX_BATCH_FILES", defaults.limits.max_batch_files)?,
                batch_concurrency: vars
                    .parse("BATCH_CONCURRENCY", defaults.limits.batch_concurrency)?,
            },
            cache: CacheSettings {
                ttl_secs: vars.parse("CACHE_TTL", defaults.cache.ttl_secs)?,
                max_size: vars.parse("CACHE_MAXSIZE", defaults.cache.max_size)?,
                cache_empty_results: vars
                    .flag("CACHE_EMPTY_RESULTS", defaults.cache.cache_empty_results)?,
            },
            image: ImageConfig {
                contrast_factor: vars
                    .parse("CONTRAST_ENHANCE_FACTOR", defaults.image.contrast_factor)?,
                jpeg_quality: vars
                    .parse::<u8>("JPEG_QUALITY", defaults.image.jpeg_quality)?
                    .clamp(1, 100),
            },
            ocr: OcrConfig {
                provider,
                language: vars.string("OCR_LANGUAGE", &defaults.ocr.language),
                google_api_key,
                google_endpoint: vars.optional("GOOGLE_VISION_ENDPOINT"),
                workers: vars.parse("OCR_WORKERS", defaults.ocr.workers)?,
                timeout_secs: vars.parse("OCR_TIMEOUT_SECS", defaults.ocr.timeout_secs)?,
            },
            rate_limit: RateLimitSettings {
                single: vars.parse("RATE_LIMIT_SINGLE", defaults.rate_limit.single)?,
                batch: vars.parse("RATE_LIMIT_BATCH", defaults.rate_limit.batch)?,
                global: vars.parse("RATE_LIMIT_GLOBAL", defaults.rate_limit.global)?,
            },
        })
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_file_size: self.limits.max_file_size,
            max_gif_size: self.limits.max_gif_size,
            max_gif_frames: self.limits.max_gif_frames,
        }
    }

    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            contrast_factor: self.image.contrast_factor,
            jpeg_quality: self.image.jpeg_quality,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            capacity: self.cache.max_size,
            cache_empty_results: self.cache.cache_empty_results,
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr.timeout_secs)
    }

    /// Largest request body accepted: a full batch plus multipart framing
    pub fn body_limit(&self) -> usize {
        self.limits
            .max_file_size
            .saturating_mul(self.limits.max_batch_files.max(1))
            .saturating_add(MULTIPART_OVERHEAD)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_gif_frames, 50);
        assert_eq!(config.limits.max_batch_files, 10);
        assert_eq!(config.cache.ttl_secs, 7200);
        assert_eq!(config.cache.max_size, 500);
        assert!(config.cache.cache_empty_results);
        assert_eq!(config.image.jpeg_quality, 90);
        assert_eq!(config.ocr.provider, OcrProviderKind::Tesseract);
        assert_eq!(config.ocr.timeout_secs, 60);
        assert_eq!(config.rate_limit.batch, RateSpec::per_minute(20));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SERVER_PORT", "9000"),
            ("MAX_FILE_SIZE", "1048576"),
            ("MAX_GIF_SIZE", "524288"),
            ("CACHE_EMPTY_RESULTS", "off"),
            ("CONTRAST_ENHANCE_FACTOR", "1.5"),
            ("RATE_LIMIT_SINGLE", "5/second"),
            ("OCR_PROVIDER", "google-vision"),
            ("GOOGLE_VISION_API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.limits.max_gif_size, 524288);
        assert!(!config.cache.cache_empty_results);
        assert_eq!(config.image.contrast_factor, 1.5);
        assert_eq!(config.rate_limit.single, RateSpec::per_second(5));
        assert_eq!(config.ocr.provider, OcrProviderKind::GoogleVision);
        assert_eq!(config.ocr.google_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_gif_ceiling_clamped_to_global() {
        let config = load(&[("MAX_FILE_SIZE", "1000"), ("MAX_GIF_SIZE", "5000")]).unwrap();
        assert_eq!(config.limits.max_gif_size, 1000);
        assert_eq!(config.validation_limits().max_gif_size, 1000);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let err = load(&[("MAX_FILE_SIZE", "ten megabytes")]).unwrap_err();
        assert!(err.to_string().contains("MAX_FILE_SIZE"));

        assert!(load(&[("CACHE_EMPTY_RESULTS", "maybe")]).is_err());
        assert!(load(&[("RATE_LIMIT_BATCH", "20 per minute")]).is_err());
        assert!(load(&[("OCR_PROVIDER", "abbyy")]).is_err());
    }

    #[test]
    fn test_vision_requires_key() {
        let err = load(&[("OCR_PROVIDER", "google-vision")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_VISION_API_KEY")));
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        let config = load(&[("JPEG_QUALITY", "0")]).unwrap();
        assert_eq!(config.image.jpeg_quality, 1);
    }

    #[test]
    fn test_body_limit_covers_full_batch() {
        let config = load(&[("MAX_FILE_SIZE", "1000"), ("MAX_BATCH_FILES", "3")]).unwrap();
        assert_eq!(config.body_limit(), 3000 + 1024 * 1024);
    }
}
