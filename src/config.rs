use std::{fs, io, path::Path};

use compact_str::CompactString;

use crate::error::{Error, Result};

/// Login identity for the capture flow, read from the env file.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub fn get_key(path: &Path, key: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    for item in dotenv::from_path_iter(path)? {
        let (k, v) = item?;
        if k == key {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

pub fn credentials(path: &Path) -> Result<Credentials> {
    let username = get_key(path, "USERNAME")?
        .filter(|s| !s.is_empty())
        .ok_or(Error::CredentialMissing("USERNAME"))?;
    let password = get_key(path, "PASSWORD")?
        .filter(|s| !s.is_empty())
        .ok_or(Error::CredentialMissing("PASSWORD"))?;
    Ok(Credentials { username, password })
}

pub fn bearer_token(path: &Path) -> Result<CompactString> {
    get_key(path, "BEARER_TOKEN")?
        .filter(|s| !s.is_empty())
        .map(CompactString::from)
        .ok_or(Error::CredentialMissing("BEARER_TOKEN"))
}

/// Rewrite `key` in place, appending it if absent. Other keys and their
/// order survive the rewrite. Creates the file when it does not exist.
pub fn set_key(path: &Path, key: &str, value: &str) -> io::Result<()> {
    let mut lines: Vec<String> = match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_owned).collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };

    let prefix = format!("{key}=");
    let entry = format!("{key}={value}");
    if let Some(line) = lines
        .iter_mut()
        .find(|l| l.trim_start().starts_with(&prefix))
    {
        *line = entry;
    } else {
        lines.push(entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_key_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        set_key(&path, "BEARER_TOKEN", "first").unwrap();
        assert_eq!(get_key(&path, "BEARER_TOKEN").unwrap().as_deref(), Some("first"));

        set_key(&path, "BEARER_TOKEN", "second").unwrap();
        assert_eq!(get_key(&path, "BEARER_TOKEN").unwrap().as_deref(), Some("second"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "BEARER_TOKEN=second\n");
    }

    #[test]
    fn set_key_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "USERNAME=me@example.com\nPASSWORD=hunter2\n").unwrap();

        set_key(&path, "BEARER_TOKEN", "tok").unwrap();

        let creds = credentials(&path).unwrap();
        assert_eq!(creds.username, "me@example.com");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(bearer_token(&path).unwrap(), "tok");
    }

    #[test]
    fn missing_keys_are_credential_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "USERNAME=me@example.com\n").unwrap();

        assert!(matches!(credentials(&path), Err(Error::CredentialMissing("PASSWORD"))));
        assert!(matches!(bearer_token(&path), Err(Error::CredentialMissing("BEARER_TOKEN"))));
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "BEARER_TOKEN=\n").unwrap();

        assert!(matches!(bearer_token(&path), Err(Error::CredentialMissing("BEARER_TOKEN"))));
    }
}
