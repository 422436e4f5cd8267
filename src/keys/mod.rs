//! Temporary SSH key material for the key-based communicator path.
//!
//! A build either loads an operator-supplied key pair or generates a
//! throwaway ed25519 pair with `ssh-keygen` in a unique scratch directory.
//! Generated material is removed again during cleanup; operator-supplied
//! files are never touched.

use std::env;
use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::client::SshKeyId;
use crate::comms::runner::{CommandError, CommandRunner};

const KEY_FILE_NAME: &str = "id_ed25519";

/// Errors raised while preparing key material.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyError {
    /// Raised when a configured key path is not valid UTF-8 or has no
    /// parent directory.
    #[error("unusable key path: {message}")]
    Path {
        /// Description of the path problem.
        message: String,
    },
    /// Raised when the public half of a configured key cannot be read.
    #[error("failed to read public key `{path}`: {message}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when a public key file is empty or only whitespace.
    #[error("public key `{path}` is empty")]
    EmptyPublicKey {
        /// Offending path.
        path: String,
    },
    /// Raised when `ssh-keygen` exits unsuccessfully.
    #[error("ssh-keygen failed with status {status_text}: {stderr}")]
    Keygen {
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from `ssh-keygen`.
        stderr: String,
    },
    /// Raised when `ssh-keygen` cannot be started.
    #[error(transparent)]
    Spawn(#[from] CommandError),
    /// Raised when the scratch directory cannot be created.
    #[error("failed to create key scratch directory `{path}`: {message}")]
    Scratch {
        /// Directory that could not be created.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Local key pair used to authenticate the build's SSH connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyMaterial {
    /// Path to the private key handed to the communicator.
    pub private_key_path: Utf8PathBuf,
    /// OpenSSH-format public key line registered with the provider.
    pub public_key: String,
    scratch_dir: Option<Utf8PathBuf>,
}

impl KeyMaterial {
    /// Loads an operator-supplied key pair.
    ///
    /// Only the public half is read; the private key stays on disk and is
    /// referenced by path. The public half must sit beside the private key
    /// with a `.pub` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Read`] when the public key cannot be read and
    /// [`KeyError::EmptyPublicKey`] when it holds no content.
    pub fn load(private_key_file: &Utf8Path) -> Result<Self, KeyError> {
        let public_path = Utf8PathBuf::from(format!("{private_key_file}.pub"));
        let public_key = read_trimmed(&public_path)?;
        Ok(Self {
            private_key_path: private_key_file.to_owned(),
            public_key,
            scratch_dir: None,
        })
    }

    /// Generates a fresh ed25519 pair in a unique scratch directory.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the scratch directory cannot be created,
    /// `ssh-keygen` fails, or the generated public key cannot be read back.
    pub fn generate(runner: &dyn CommandRunner) -> Result<Self, KeyError> {
        let scratch = scratch_dir_path()?;
        std::fs::create_dir_all(scratch.as_std_path()).map_err(|err| KeyError::Scratch {
            path: scratch.clone().into_string(),
            message: err.to_string(),
        })?;

        let key_path = scratch.join(KEY_FILE_NAME);
        let output = runner.run("ssh-keygen", &keygen_args(&key_path))?;
        if !output.is_success() {
            let status_text = output
                .code
                .map_or_else(|| String::from("unknown"), |code| code.to_string());
            return Err(KeyError::Keygen {
                status_text,
                stderr: output.stderr,
            });
        }

        let public_path = Utf8PathBuf::from(format!("{key_path}.pub"));
        let public_key = read_trimmed(&public_path)?;
        Ok(Self {
            private_key_path: key_path,
            public_key,
            scratch_dir: Some(scratch),
        })
    }

    /// Returns `true` when the material was generated by this build.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.scratch_dir.is_some()
    }

    /// Removes generated material from disk. Operator-supplied keys are
    /// left untouched. Failures are logged, never escalated.
    pub fn remove_generated(&self) {
        let Some(scratch) = &self.scratch_dir else {
            return;
        };
        if let Err(err) = std::fs::remove_dir_all(scratch.as_std_path()) {
            warn!(path = %scratch, error = %err, "failed to remove generated key material");
        }
    }
}

/// Key material plus the provider-side registration it belongs to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TemporaryKey {
    /// Identifier the provider assigned to the registered public key.
    pub provider_id: SshKeyId,
    /// Local key pair backing the registration.
    pub material: KeyMaterial,
}

/// Builds the `ssh-keygen` argument list for a new ed25519 pair.
#[must_use]
pub fn keygen_args(key_path: &Utf8Path) -> Vec<OsString> {
    [
        "-q",
        "-t",
        "ed25519",
        "-N",
        "",
        "-C",
        "kiln-temporary-key",
        "-f",
        key_path.as_str(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

fn scratch_dir_path() -> Result<Utf8PathBuf, KeyError> {
    let base = Utf8PathBuf::from_path_buf(env::temp_dir()).map_err(|path| KeyError::Path {
        message: format!("temp directory is not UTF-8: {}", path.display()),
    })?;
    Ok(base.join(format!("kiln-key-{}", Uuid::new_v4().simple())))
}

fn read_trimmed(path: &Utf8Path) -> Result<String, KeyError> {
    let (dir_path, file_name) = split_for_ambient(path)?;
    let dir = Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| {
        KeyError::Read {
            path: path.to_owned().into_string(),
            message: err.to_string(),
        }
    })?;
    let content = dir.read_to_string(file_name).map_err(|err| KeyError::Read {
        path: path.to_owned().into_string(),
        message: err.to_string(),
    })?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(KeyError::EmptyPublicKey {
            path: path.to_owned().into_string(),
        });
    }
    Ok(trimmed.to_owned())
}

fn split_for_ambient(path: &Utf8Path) -> Result<(&Utf8Path, &Utf8Path), KeyError> {
    if path.is_absolute() {
        let parent = path.parent().ok_or_else(|| KeyError::Path {
            message: format!("path has no parent directory: {path}"),
        })?;
        let file_name = path.file_name().ok_or_else(|| KeyError::Path {
            message: format!("path has no file name: {path}"),
        })?;
        Ok((parent, Utf8Path::new(file_name)))
    } else {
        Ok((Utf8Path::new("."), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_args_request_ed25519_without_passphrase() {
        let args = keygen_args(Utf8Path::new("/tmp/scratch/id_ed25519"));
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "-q",
                "-t",
                "ed25519",
                "-N",
                "",
                "-C",
                "kiln-temporary-key",
                "-f",
                "/tmp/scratch/id_ed25519",
            ]
        );
    }

    #[test]
    fn load_reads_public_half_beside_private_key() {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
        let private_path = base.join("id_ed25519");
        std::fs::write(private_path.as_std_path(), "private")
            .unwrap_or_else(|err| panic!("write private: {err}"));
        std::fs::write(
            format!("{private_path}.pub"),
            "ssh-ed25519 AAAA kiln-temporary-key\n",
        )
        .unwrap_or_else(|err| panic!("write public: {err}"));

        let material =
            KeyMaterial::load(&private_path).unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(material.public_key, "ssh-ed25519 AAAA kiln-temporary-key");
        assert_eq!(material.private_key_path, private_path);
        assert!(!material.is_generated());
    }

    #[test]
    fn load_rejects_missing_public_half() {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
        let private_path = base.join("id_ed25519");

        let err = KeyMaterial::load(&private_path).expect_err("missing public key should fail");
        assert!(matches!(err, KeyError::Read { .. }), "unexpected: {err}");
    }

    #[test]
    fn load_rejects_empty_public_half() {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
        let private_path = base.join("id_ed25519");
        std::fs::write(format!("{private_path}.pub"), "   \n")
            .unwrap_or_else(|err| panic!("write public: {err}"));

        let err = KeyMaterial::load(&private_path).expect_err("empty public key should fail");
        assert!(
            matches!(err, KeyError::EmptyPublicKey { .. }),
            "unexpected: {err}"
        );
    }
}
