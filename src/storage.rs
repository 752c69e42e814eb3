use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::crypto::{digest, is_valid_pin, PinDigest};
use crate::error::LockError;
use crate::models::{CredentialKind, CredentialRecord, Note, NoteBook};

pub const APP_DIR: &str = ".pinveil";
pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const NOTES_FILE: &str = "notes.json";
pub const INBOX_FILE: &str = "inbox.txt";
pub const LOG_FILE: &str = "pinveil.log";
pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_INACTIVITY_SECS: u64 = 5 * 60;
pub const DEFAULT_REAL_LENGTH: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    #[serde(default = "default_inactivity_secs")]
    pub inactivity_secs: u64,
}

fn default_inactivity_secs() -> u64 {
    DEFAULT_INACTIVITY_SECS
}

pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(default_base_dir()?.join(CONFIG_FILE))
}

pub fn load_config() -> Result<Option<Config>> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let cfg: Config = serde_json::from_str(&raw)?;
    Ok(Some(cfg))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    ensure_dir(&default_base_dir()?)?;
    let path = config_path()?;
    let data = serde_json::to_string_pretty(cfg)?;
    atomic_write(path.as_path(), data.as_bytes())?;
    restrict_file(path.as_path())?;
    Ok(())
}

/// Resolved runtime settings: config file values with defaults filled in.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub inactivity_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        match load_config()? {
            Some(cfg) => Ok(Self {
                data_dir: validate_data_dir(Path::new(&cfg.data_dir), &home)?,
                inactivity_secs: cfg.inactivity_secs.max(1),
            }),
            None => Ok(Self {
                data_dir: default_base_dir()?,
                inactivity_secs: DEFAULT_INACTIVITY_SECS,
            }),
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIALS_FILE)
    }

    pub fn notes_path(&self) -> PathBuf {
        self.data_dir.join(NOTES_FILE)
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.data_dir.join(INBOX_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    restrict_dir(dir)?;
    Ok(())
}

/// A configured data dir must stay inside `home`, without `..` and without
/// symlinks escaping it.
pub fn validate_data_dir(raw: &Path, home: &Path) -> Result<PathBuf> {
    let candidate = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        home.join(raw)
    };

    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(anyhow!(
            "Configured data path is invalid: parent traversal is not allowed"
        ));
    }
    if !candidate.starts_with(home) {
        return Err(anyhow!(
            "Configured data path must be inside home directory ({})",
            home.display()
        ));
    }

    let home_real = fs::canonicalize(home).unwrap_or_else(|_| home.to_path_buf());
    if candidate.exists() {
        let real = fs::canonicalize(&candidate)?;
        if !real.starts_with(&home_real) {
            return Err(anyhow!(
                "Configured data path resolves outside home directory ({})",
                home.display()
            ));
        }
    } else if let Some(parent) = candidate.parent() {
        if parent.exists() {
            let real_parent = fs::canonicalize(parent)?;
            if !real_parent.starts_with(&home_real) {
                return Err(anyhow!(
                    "Configured data parent resolves outside home directory ({})",
                    home.display()
                ));
            }
        }
    }

    Ok(candidate)
}

#[derive(Debug, Clone, Copy)]
pub struct StoredCredential {
    pub digest: PinDigest,
    pub length: usize,
}

/// Point-in-time view of the persisted credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSnapshot {
    pub real: Option<StoredCredential>,
    pub dummy: Option<StoredCredential>,
}

impl CredentialSnapshot {
    fn from_record(rec: &CredentialRecord) -> crate::error::Result<Self> {
        let real = parse_credential(rec.real_digest.as_deref(), rec.real_length)?;
        // A dummy without a real credential is meaningless.
        let dummy = match real {
            Some(_) => parse_credential(rec.dummy_digest.as_deref(), rec.dummy_length)?,
            None => None,
        };
        Ok(Self { real, dummy })
    }

    pub fn has_real(&self) -> bool {
        self.real.is_some()
    }

    pub fn has_dummy(&self) -> bool {
        self.dummy.is_some()
    }

    pub fn real_length(&self) -> usize {
        self.real.map(|c| c.length).unwrap_or(DEFAULT_REAL_LENGTH)
    }

    pub fn dummy_length(&self) -> usize {
        self.dummy.map(|c| c.length).unwrap_or(0)
    }

    pub fn verify(&self, kind: CredentialKind, candidate: &str) -> bool {
        let stored = match kind {
            CredentialKind::Real => self.real,
            CredentialKind::Dummy => self.dummy,
        };
        match stored {
            Some(cred) => digest(candidate).ct_matches(&cred.digest),
            None => false,
        }
    }
}

fn parse_credential(
    encoded: Option<&str>,
    length: Option<usize>,
) -> crate::error::Result<Option<StoredCredential>> {
    match (encoded, length) {
        (Some(encoded), Some(length)) if (4..=8).contains(&length) => Ok(Some(StoredCredential {
            digest: PinDigest::from_base64(encoded)?,
            length,
        })),
        (None, None) => Ok(None),
        _ => Err(LockError::StorageUnavailable(
            "Credential file is inconsistent".into(),
        )),
    }
}

/// Hashed PIN credentials persisted as one JSON document.
///
/// Every read goes to disk and every mutation is a single atomic write, so a
/// digest and its length are never observed apart.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_record(&self) -> crate::error::Result<CredentialRecord> {
        match read_if_present(&self.path)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CredentialRecord::default()),
        }
    }

    fn save_record(&self, rec: &CredentialRecord) -> crate::error::Result<()> {
        let data = serde_json::to_string_pretty(rec)?;
        atomic_write(&self.path, data.as_bytes())?;
        restrict_file(&self.path)?;
        Ok(())
    }

    pub fn snapshot(&self) -> crate::error::Result<CredentialSnapshot> {
        CredentialSnapshot::from_record(&self.load_record()?)
    }

    pub fn has_real(&self) -> crate::error::Result<bool> {
        Ok(self.snapshot()?.has_real())
    }

    pub fn has_dummy(&self) -> crate::error::Result<bool> {
        Ok(self.snapshot()?.has_dummy())
    }

    pub fn real_length(&self) -> crate::error::Result<usize> {
        Ok(self.snapshot()?.real_length())
    }

    pub fn dummy_length(&self) -> crate::error::Result<usize> {
        Ok(self.snapshot()?.dummy_length())
    }

    pub fn verify_real(&self, candidate: &str) -> crate::error::Result<bool> {
        Ok(self.snapshot()?.verify(CredentialKind::Real, candidate))
    }

    pub fn verify_dummy(&self, candidate: &str) -> crate::error::Result<bool> {
        Ok(self.snapshot()?.verify(CredentialKind::Dummy, candidate))
    }

    pub fn set_real(&self, pin: &str) -> crate::error::Result<()> {
        if !is_valid_pin(pin) {
            return Err(LockError::InvalidFormat);
        }
        let snapshot = self.snapshot()?;
        let new_digest = digest(pin);
        if let Some(dummy) = snapshot.dummy {
            if dummy.digest.ct_matches(&new_digest) {
                return Err(LockError::DuplicateCredential);
            }
        }
        let mut rec = self.load_record()?;
        rec.real_digest = Some(new_digest.to_base64());
        rec.real_length = Some(pin.len());
        self.save_record(&rec)?;
        info!(kind = "pin", "credential stored");
        Ok(())
    }

    pub fn set_dummy(&self, pin: &str) -> crate::error::Result<()> {
        if !is_valid_pin(pin) {
            return Err(LockError::InvalidFormat);
        }
        let snapshot = self.snapshot()?;
        let real = snapshot.real.ok_or(LockError::MissingRealCredential)?;
        let new_digest = digest(pin);
        if real.digest.ct_matches(&new_digest) {
            return Err(LockError::DuplicateCredential);
        }
        let mut rec = self.load_record()?;
        rec.dummy_digest = Some(new_digest.to_base64());
        rec.dummy_length = Some(pin.len());
        self.save_record(&rec)?;
        info!(kind = "pin", "credential stored");
        Ok(())
    }

    /// Sets the main PIN and either sets or clears the dummy PIN in one write.
    pub fn set_credentials(&self, real: &str, dummy: Option<&str>) -> crate::error::Result<()> {
        if !is_valid_pin(real) {
            return Err(LockError::InvalidFormat);
        }
        let real_digest = digest(real);
        let dummy_cred = match dummy {
            Some(pin) => {
                if !is_valid_pin(pin) {
                    return Err(LockError::InvalidFormat);
                }
                let d = digest(pin);
                if d.ct_matches(&real_digest) {
                    return Err(LockError::DuplicateCredential);
                }
                Some((d, pin.len()))
            }
            None => None,
        };
        let rec = CredentialRecord {
            real_digest: Some(real_digest.to_base64()),
            real_length: Some(real.len()),
            dummy_digest: dummy_cred.map(|(d, _)| d.to_base64()),
            dummy_length: dummy_cred.map(|(_, len)| len),
        };
        self.save_record(&rec)?;
        info!(kind = "pin", "credential stored");
        Ok(())
    }

    pub fn clear_dummy(&self) -> crate::error::Result<()> {
        let mut rec = self.load_record()?;
        rec.dummy_digest = None;
        rec.dummy_length = None;
        self.save_record(&rec)
    }

    pub fn clear_all(&self) -> crate::error::Result<()> {
        self.save_record(&CredentialRecord::default())?;
        info!("credentials removed");
        Ok(())
    }
}

pub fn load_notes(path: &Path) -> Result<NoteBook> {
    let Some(raw) = read_if_present(path)? else {
        return Ok(NoteBook::default());
    };
    match serde_json::from_str(&raw) {
        Ok(book) => Ok(book),
        Err(e) => {
            warn!(error = %e, "notes file unreadable, starting empty");
            Ok(NoteBook::default())
        }
    }
}

pub fn save_notes(path: &Path, book: &NoteBook) -> Result<()> {
    let data = serde_json::to_string_pretty(book)?;
    atomic_write(path, data.as_bytes())?;
    restrict_file(path)?;
    Ok(())
}

/// Ensures the decoy has something to show on first open.
pub fn seed_notes_if_empty(book: &mut NoteBook) -> bool {
    if !book.notes.is_empty() {
        return false;
    }
    book.notes.push(Note {
        id: crate::models::new_uuid(),
        title: "Weekly Assignments".to_string(),
        content: "DUE NEXT WEDNESDAY: ".to_string(),
        updated_at: unix_now(),
    });
    true
}

pub fn load_inbox(path: &Path) -> Result<Vec<String>> {
    let Some(mut raw) = read_if_present(path)? else {
        return Ok(Vec::new());
    };
    let lines = raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    raw.zeroize();
    Ok(lines)
}

/// Only a missing file reads as "nothing stored"; any other failure is an error.
fn read_if_present(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid target path"))?;
    if !parent.exists() {
        fs::create_dir_all(parent)?;
        restrict_dir(parent)?;
    }

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn restrict_file(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
    }
    // On non-Unix platforms we skip explicit chmod; rely on platform defaults.
    Ok(())
}

fn restrict_dir(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(path, perms)?;
        }
    }
    Ok(())
}
