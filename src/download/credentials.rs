//! Credential fallback policy for engine calls

use crate::engine::CookieMaterial;
use crate::error::ReelError;
use base64::Engine as _;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Where the loaded credential material came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    CookieFile,
    EncodedJar,
    Header,
}

/// Authentication material loaded once at startup
#[derive(Debug)]
pub struct Credentials {
    material: CookieMaterial,
    source: CredentialSource,
    /// Keeps a materialized cookie jar alive for the process lifetime
    _jar: Option<NamedTempFile>,
}

impl Credentials {
    /// Load credentials from the first available source.
    ///
    /// Sources are tried in priority order: cookie jar path, base64 cookie
    /// jar content, raw header string. Only the first one present is used.
    pub fn load(
        cookie_file: Option<&Path>,
        encoded_jar: Option<&str>,
        header: Option<&str>,
    ) -> Result<Option<Self>, ReelError> {
        if let Some(path) = cookie_file {
            if path.is_file() {
                info!("Using cookie jar at {:?}", path);
                return Ok(Some(Self {
                    material: CookieMaterial::File(path.to_path_buf()),
                    source: CredentialSource::CookieFile,
                    _jar: None,
                }));
            }
            warn!("Cookie jar {:?} not found, trying next source", path);
        }

        if let Some(encoded) = encoded_jar.map(str::trim).filter(|e| !e.is_empty()) {
            let jar = materialize_jar(encoded)?;
            info!("Using base64 cookie jar materialized at {:?}", jar.path());
            return Ok(Some(Self {
                material: CookieMaterial::File(jar.path().to_path_buf()),
                source: CredentialSource::EncodedJar,
                _jar: Some(jar),
            }));
        }

        if let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) {
            info!("Using raw cookie header");
            return Ok(Some(Self {
                material: CookieMaterial::Header(header.to_string()),
                source: CredentialSource::Header,
                _jar: None,
            }));
        }

        Ok(None)
    }

    /// Credentials from already-prepared material
    pub fn from_material(material: CookieMaterial) -> Self {
        let source = match material {
            CookieMaterial::File(_) => CredentialSource::CookieFile,
            CookieMaterial::Header(_) => CredentialSource::Header,
        };
        Self {
            material,
            source,
            _jar: None,
        }
    }

    pub fn material(&self) -> &CookieMaterial {
        &self.material
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Path of the cookie jar, when the material is a file
    pub fn jar_path(&self) -> Option<&PathBuf> {
        match &self.material {
            CookieMaterial::File(path) => Some(path),
            CookieMaterial::Header(_) => None,
        }
    }
}

fn materialize_jar(encoded: &str) -> Result<NamedTempFile, ReelError> {
    let content = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ReelError::Credentials(format!("invalid base64 cookie jar: {}", e)))?;
    let mut jar = tempfile::Builder::new()
        .prefix("reelbot_cookies_")
        .suffix(".txt")
        .tempfile()?;
    jar.write_all(&content)?;
    jar.flush()?;
    Ok(jar)
}

/// Credential policy switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CredentialPolicyConfig {
    /// Attach credentials at all
    pub enabled: bool,
    /// Run unauthenticated first and fall back to credentials once on failure
    pub apply_on_failure_only: bool,
}

/// Two-branch policy deciding when engine calls carry credentials
pub struct CredentialPolicy {
    config: CredentialPolicyConfig,
    credentials: Option<Credentials>,
}

impl CredentialPolicy {
    /// Create a policy; a disabled policy never attaches credentials
    pub fn new(config: CredentialPolicyConfig, credentials: Option<Credentials>) -> Self {
        if config.enabled && credentials.is_none() {
            warn!("Credentials enabled but none loaded, engine calls run unauthenticated");
        }
        Self {
            config,
            credentials,
        }
    }

    /// Policy that never attaches credentials
    pub fn disabled() -> Self {
        Self {
            config: CredentialPolicyConfig::default(),
            credentials: None,
        }
    }

    fn material(&self) -> Option<CookieMaterial> {
        if !self.config.enabled {
            return None;
        }
        self.credentials.as_ref().map(|c| c.material().clone())
    }

    /// Whether every call carries credentials from the first attempt
    pub fn uses_credentials_always(&self) -> bool {
        self.material().is_some() && !self.config.apply_on_failure_only
    }

    /// Whether a failed call gets one authenticated retry
    pub fn falls_back_on_failure(&self) -> bool {
        self.material().is_some() && self.config.apply_on_failure_only
    }

    /// Run an engine call under the policy.
    ///
    /// `call` receives the cookie material to attach, if any. With fallback
    /// enabled any failure of the unauthenticated attempt is retried exactly
    /// once with credentials, and the retry's outcome is returned.
    pub async fn execute<F, Fut, T>(&self, mut call: F) -> Result<T, ReelError>
    where
        F: FnMut(Option<CookieMaterial>) -> Fut,
        Fut: Future<Output = Result<T, ReelError>>,
    {
        let material = self.material();

        if self.uses_credentials_always() {
            return call(material).await;
        }

        match call(None).await {
            Ok(value) => Ok(value),
            Err(error) if material.is_some() => {
                warn!(cause = %error, "Engine call failed, retrying once with credentials");
                let retried = call(material).await;
                if let Err(ref second) = retried {
                    debug!(cause = %second, "Authenticated retry failed as well");
                }
                retried
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn header_credentials() -> Credentials {
        Credentials::from_material(CookieMaterial::Header("SID=abc".to_string()))
    }

    fn fallback_policy() -> CredentialPolicy {
        CredentialPolicy::new(
            CredentialPolicyConfig {
                enabled: true,
                apply_on_failure_only: true,
            },
            Some(header_credentials()),
        )
    }

    #[tokio::test]
    async fn test_fallback_retries_once_with_credentials() {
        let policy = fallback_policy();
        let seen = Mutex::new(Vec::new());

        let result = policy
            .execute(|cookies| {
                let attempt = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(cookies.clone());
                    seen.len()
                };
                async move {
                    if attempt == 1 {
                        Err(ReelError::EngineFailure("HTTP Error 403".to_string()))
                    } else {
                        Ok("metadata")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "metadata");
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], None);
        assert_eq!(seen[1], Some(CookieMaterial::Header("SID=abc".to_string())));
    }

    #[tokio::test]
    async fn test_fallback_propagates_second_failure() {
        let policy = fallback_policy();
        let attempts = AtomicU32::new(0);

        let result: Result<(), ReelError> = policy
            .execute(|_| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(ReelError::EngineFailure(format!("attempt {}", attempt))) }
            })
            .await;

        match result {
            Err(ReelError::EngineFailure(message)) => assert_eq!(message, "attempt 2"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_always_mode_runs_once_with_credentials() {
        let policy = CredentialPolicy::new(
            CredentialPolicyConfig {
                enabled: true,
                apply_on_failure_only: false,
            },
            Some(header_credentials()),
        );
        assert!(policy.uses_credentials_always());
        let seen = Mutex::new(Vec::new());

        let result: Result<(), ReelError> = policy
            .execute(|cookies| {
                seen.lock().unwrap().push(cookies);
                async { Err(ReelError::EngineFailure("denied".to_string())) }
            })
            .await;

        assert!(result.is_err());
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_some());
    }

    #[tokio::test]
    async fn test_disabled_policy_never_attaches_credentials() {
        let policy = CredentialPolicy::new(
            CredentialPolicyConfig {
                enabled: false,
                apply_on_failure_only: true,
            },
            Some(header_credentials()),
        );
        let seen = Mutex::new(Vec::new());

        let result: Result<(), ReelError> = policy
            .execute(|cookies| {
                seen.lock().unwrap().push(cookies);
                async { Err(ReelError::EngineFailure("denied".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(seen.into_inner().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_fallback_retries_any_error_kind() {
        let policy = fallback_policy();
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute(|cookies| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt == 1 {
                        Err(ReelError::IoError(std::io::Error::new(
                            std::io::ErrorKind::PermissionDenied,
                            "cannot spawn engine",
                        )))
                    } else {
                        assert!(cookies.is_some());
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_without_credentials() {
        let policy = CredentialPolicy::new(
            CredentialPolicyConfig {
                enabled: true,
                apply_on_failure_only: true,
            },
            None,
        );
        let attempts = AtomicU32::new(0);

        let result: Result<(), ReelError> = policy
            .execute(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ReelError::DownloadFailed {
                        cause: "no output".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_prefers_cookie_file() {
        let jar = NamedTempFile::new().unwrap();
        let credentials = Credentials::load(Some(jar.path()), Some("aGVsbG8="), Some("SID=1"))
            .unwrap()
            .unwrap();
        assert_eq!(credentials.source(), CredentialSource::CookieFile);
        assert_eq!(credentials.jar_path().unwrap(), jar.path());
    }

    #[test]
    fn test_load_materializes_encoded_jar() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("# Netscape HTTP Cookie File\n");
        let credentials = Credentials::load(
            Some(Path::new("/nonexistent/cookies.txt")),
            Some(&encoded),
            Some("SID=1"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(credentials.source(), CredentialSource::EncodedJar);
        let content = std::fs::read_to_string(credentials.jar_path().unwrap()).unwrap();
        assert_eq!(content, "# Netscape HTTP Cookie File\n");
    }

    #[test]
    fn test_load_header_and_nothing() {
        let credentials = Credentials::load(None, None, Some(" SID=1 ")).unwrap().unwrap();
        assert_eq!(credentials.material(), &CookieMaterial::Header("SID=1".to_string()));

        assert!(Credentials::load(None, Some("  "), None).unwrap().is_none());
        assert!(matches!(
            Credentials::load(None, Some("not base64!"), None),
            Err(ReelError::Credentials(_))
        ));
    }
}
